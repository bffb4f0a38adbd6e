//! Built-in population initializers.
//!
//! All initializers require a positive `chrom_length` parameter and return
//! exactly `population_size` individuals of that length.

use super::{InitializationOperator, OperatorContext, OperatorResult};
use crate::error::OperatorFailure;
use crate::ga::types::{Gene, Population};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};

/// Uniform random bit strings (genes are `0.0` or `1.0`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBinary;

impl InitializationOperator for RandomBinary {
    fn initialize(
        &self,
        population_size: usize,
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Population> {
        let len = chrom_length(ctx)?;
        Ok(generate(population_size, len, || {
            if rng.random_bool(0.5) {
                1.0
            } else {
                0.0
            }
        }))
    }
}

/// Genes drawn uniformly from `[low, high)`.
///
/// Parameters `low` (default −5.12), `high` (default 5.12), the usual
/// Rastrigin domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl InitializationOperator for Uniform {
    fn initialize(
        &self,
        population_size: usize,
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Population> {
        let len = chrom_length(ctx)?;
        let (low, high) = bounds(ctx)?;
        Ok(generate(population_size, len, || uniform_gene(low, high, &mut *rng)))
    }
}

/// Genes drawn from `N(mean, std)`.
///
/// Parameters `mean` (default 0), `std` (default 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct Gaussian;

impl InitializationOperator for Gaussian {
    fn initialize(
        &self,
        population_size: usize,
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Population> {
        let len = chrom_length(ctx)?;
        let mean = ctx.params.f64_or("mean", 0.0)?;
        let std = ctx.params.f64_or("std", 1.0)?;
        let dist = Normal::new(mean, std)
            .map_err(|e| OperatorFailure::new(format!("invalid normal parameters: {e}")))?;
        Ok(generate(population_size, len, || dist.sample(&mut *rng)))
    }
}

/// Seeds the population with caller-provided solutions, filling the rest
/// uniformly from `[low, high)`.
///
/// Parameter `known_solutions`: rows of numbers (see
/// [`OperatorParams::matrix`](crate::ga::OperatorParams::matrix)). Each row
/// must have `chrom_length` genes; rows beyond `population_size` are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownSolutions;

impl InitializationOperator for KnownSolutions {
    fn initialize(
        &self,
        population_size: usize,
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Population> {
        let len = chrom_length(ctx)?;
        let (low, high) = bounds(ctx)?;
        let known = ctx.params.matrix("known_solutions")?.unwrap_or_default();
        if let Some(row) = known.iter().find(|row| row.len() != len) {
            return Err(OperatorFailure::new(format!(
                "known solution has {} genes, expected {len}",
                row.len()
            )));
        }

        let mut population: Population = known.into_iter().take(population_size).collect();
        let remaining = population_size - population.len();
        population.extend(generate(remaining, len, || uniform_gene(low, high, &mut *rng)));
        Ok(population)
    }
}

fn chrom_length(ctx: &OperatorContext<'_>) -> OperatorResult<usize> {
    match ctx.params.require_usize("chrom_length")? {
        0 => Err(OperatorFailure::new("chrom_length must be positive")),
        len => Ok(len),
    }
}

fn bounds(ctx: &OperatorContext<'_>) -> OperatorResult<(f64, f64)> {
    let low = ctx.params.f64_or("low", -5.12)?;
    let high = ctx.params.f64_or("high", 5.12)?;
    if !(low < high) || !low.is_finite() || !high.is_finite() {
        return Err(OperatorFailure::new(format!(
            "low must be below high, got [{low}, {high})"
        )));
    }
    if !(high - low).is_finite() {
        return Err(OperatorFailure::new(format!(
            "range [{low}, {high}) is too wide to sample"
        )));
    }
    Ok((low, high))
}

fn uniform_gene(low: f64, high: f64, rng: &mut dyn RngCore) -> Gene {
    rng.random_range(low..high)
}

fn generate(count: usize, len: usize, mut gene: impl FnMut() -> Gene) -> Population {
    (0..count)
        .map(|_| (0..len).map(|_| gene()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::operators::testing::ctx;
    use crate::ga::params::OperatorParams;
    use crate::random::create_rng;

    #[test]
    fn test_random_binary_shape_and_values() {
        let params = OperatorParams::new().with("chrom_length", 8);
        let mut rng = create_rng(42);
        let pop = RandomBinary.initialize(5, &ctx(&params), &mut rng).unwrap();
        assert_eq!(pop.len(), 5);
        assert!(pop.iter().all(|ind| ind.len() == 8));
        assert!(pop.iter().flatten().all(|&g| g == 0.0 || g == 1.0));
    }

    #[test]
    fn test_uniform_bounds() {
        let params = OperatorParams::new()
            .with("chrom_length", 4)
            .with("low", -1.0)
            .with("high", 2.0);
        let mut rng = create_rng(42);
        let pop = Uniform.initialize(50, &ctx(&params), &mut rng).unwrap();
        assert!(pop.iter().flatten().all(|g| (-1.0..2.0).contains(g)));
    }

    #[test]
    fn test_uniform_rejects_overflowing_range() {
        let params = OperatorParams::new()
            .with("chrom_length", 2)
            .with("low", -1e308)
            .with("high", 1e308);
        let mut rng = create_rng(42);
        assert!(Uniform.initialize(3, &ctx(&params), &mut rng).is_err());
        assert!(KnownSolutions.initialize(3, &ctx(&params), &mut rng).is_err());

        let params = OperatorParams::new()
            .with("chrom_length", 2)
            .with("low", 0.0)
            .with("high", 1e308);
        let pop = Uniform.initialize(3, &ctx(&params), &mut rng).unwrap();
        assert!(pop.iter().flatten().all(|g| (0.0..1e308).contains(g)));
    }

    #[test]
    fn test_normal_shape() {
        let params = OperatorParams::new().with("chrom_length", "3");
        let mut rng = create_rng(42);
        let pop = Gaussian.initialize(4, &ctx(&params), &mut rng).unwrap();
        assert_eq!(pop.len(), 4);
        assert!(pop.iter().all(|ind| ind.len() == 3));
    }

    #[test]
    fn test_known_solutions_first() {
        let params = OperatorParams::new()
            .with("chrom_length", 3)
            .with("known_solutions", "1 0 1; 0 1 1");
        let mut rng = create_rng(42);
        let pop = KnownSolutions.initialize(4, &ctx(&params), &mut rng).unwrap();
        assert_eq!(pop.len(), 4);
        assert_eq!(pop[0], vec![1.0, 0.0, 1.0]);
        assert_eq!(pop[1], vec![0.0, 1.0, 1.0]);
        assert!(pop.iter().all(|ind| ind.len() == 3));
    }

    #[test]
    fn test_known_solutions_truncated_to_population() {
        let params = OperatorParams::new()
            .with("chrom_length", 1)
            .with("known_solutions", vec![vec![1.0], vec![2.0], vec![3.0]]);
        let mut rng = create_rng(42);
        let pop = KnownSolutions.initialize(2, &ctx(&params), &mut rng).unwrap();
        assert_eq!(pop, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_known_solution_length_mismatch_fails() {
        let params = OperatorParams::new()
            .with("chrom_length", 2)
            .with("known_solutions", "1 0 1");
        let mut rng = create_rng(42);
        assert!(KnownSolutions.initialize(3, &ctx(&params), &mut rng).is_err());
    }

    #[test]
    fn test_missing_chrom_length_fails() {
        let params = OperatorParams::new();
        let mut rng = create_rng(42);
        let err = RandomBinary.initialize(3, &ctx(&params), &mut rng).unwrap_err();
        assert_eq!(err.message(), "missing required parameter `chrom_length`");
    }
}
