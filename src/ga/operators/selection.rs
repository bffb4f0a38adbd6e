//! Built-in parent selection strategies.
//!
//! Selection determines which individuals are chosen as parents for
//! crossover. Different strategies provide different selection pressure.
//! Every strategy honours the run's [`MinMaxRule`].
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"
//! - Goldberg & Deb (1991), "A Comparative Analysis of Selection Schemes
//!   Used in Genetic Algorithms"
//! - Goldberg & Richardson (1987), "Genetic Algorithms with Sharing for
//!   Multimodal Function Optimization"

use super::{OperatorContext, OperatorResult, SelectionOperator};
use crate::error::OperatorFailure;
use crate::ga::types::{Individual, MinMaxRule};
use rand::seq::index;
use rand::{Rng, RngCore};

/// Tournament selection: sample `tournament_size` distinct individuals,
/// return the best.
///
/// Parameter `tournament_size` (default 3, capped at the population size).
///
/// Higher sizes mean stronger selection pressure:
/// - 2: light pressure (good for diversity)
/// - 3–5: moderate pressure (typical default)
/// - more than 5: strong pressure (risk of premature convergence)
#[derive(Debug, Clone, Copy, Default)]
pub struct Tournament;

impl SelectionOperator for Tournament {
    fn select(
        &self,
        population: &[Individual],
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<usize> {
        let n = check_inputs(population, fitness)?;
        let k = ctx.params.usize_or("tournament_size", 3)?;
        Ok(tournament(fitness, k, ctx.rule, n, rng))
    }
}

/// Fitness-proportionate (roulette wheel) selection.
///
/// Weights are shifted so the worst individual still has a small positive
/// weight, which makes the strategy work for negative fitness and for
/// minimization.
///
/// **Warning**: susceptible to super-individual dominance when fitness
/// variance is high.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouletteWheel;

impl SelectionOperator for RouletteWheel {
    fn select(
        &self,
        population: &[Individual],
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<usize> {
        check_inputs(population, fitness)?;
        Ok(roulette(&quality_weights(fitness, ctx.rule), rng))
    }
}

/// Linear rank selection: weight `n − rank`, best rank 0.
///
/// Avoids the scaling problems of roulette selection.
///
/// Reference: Baker (1985), "Adaptive Selection Methods for Genetic
/// Algorithms"
#[derive(Debug, Clone, Copy, Default)]
pub struct Rank;

impl SelectionOperator for Rank {
    fn select(
        &self,
        population: &[Individual],
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<usize> {
        let n = check_inputs(population, fitness)?;
        if n == 1 {
            return Ok(0);
        }
        let order = ctx.rule.rank_indices(fitness);
        let total = (n * (n + 1)) as f64 / 2.0;
        let threshold = rng.random_range(0.0..total);
        let mut cumulative = 0.0;
        for (rank, &original_idx) in order.iter().enumerate() {
            cumulative += (n - rank) as f64;
            if cumulative > threshold {
                return Ok(original_idx);
            }
        }
        Ok(order[n - 1])
    }
}

/// Uniform choice among the `elite_size` best individuals.
///
/// Parameter `elite_size` (default 2, capped at the population size).
#[derive(Debug, Clone, Copy, Default)]
pub struct Elitism;

impl SelectionOperator for Elitism {
    fn select(
        &self,
        population: &[Individual],
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<usize> {
        let n = check_inputs(population, fitness)?;
        let k = ctx.params.usize_or("elite_size", 2)?.clamp(1, n);
        let order = ctx.rule.rank_indices(fitness);
        Ok(order[rng.random_range(0..k)])
    }
}

/// Roulette selection on niche-penalized weights.
///
/// Each individual's weight is divided by its niche count
/// `1 + Σ sh(d_ij)` with `sh(d) = 1 − (d / sigma_share)^alpha` for
/// `d < sigma_share`, where `d` is the Euclidean distance between genomes.
///
/// Parameters `sigma_share` (default 0.5) and `alpha` (default 1).
///
/// # Complexity
/// O(n²·L) per selection for `n` individuals of length `L`
#[derive(Debug, Clone, Copy, Default)]
pub struct FitnessSharing;

impl SelectionOperator for FitnessSharing {
    fn select(
        &self,
        population: &[Individual],
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<usize> {
        let n = check_inputs(population, fitness)?;
        let sigma = ctx.params.f64_or("sigma_share", 0.5)?;
        let alpha = ctx.params.f64_or("alpha", 1.0)?;
        if sigma <= 0.0 {
            return Err(OperatorFailure::new("sigma_share must be positive"));
        }

        let mut weights = quality_weights(fitness, ctx.rule);
        for i in 0..n {
            let niche: f64 = (0..n)
                .filter(|&j| j != i)
                .map(|j| euclidean(&population[i], &population[j]))
                .filter(|&d| d < sigma)
                .map(|d| 1.0 - (d / sigma).powf(alpha))
                .sum();
            weights[i] /= 1.0 + niche;
        }
        Ok(roulette(&weights, rng))
    }
}

/// Tournament selection during the first half of the run, roulette
/// afterwards.
///
/// Parameter `tournament_size` as for [`Tournament`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveSelection;

impl SelectionOperator for AdaptiveSelection {
    fn select(
        &self,
        population: &[Individual],
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<usize> {
        if (ctx.generation as f64) < ctx.max_generations as f64 / 2.0 {
            Tournament.select(population, fitness, ctx, rng)
        } else {
            RouletteWheel.select(population, fitness, ctx, rng)
        }
    }
}

fn check_inputs(population: &[Individual], fitness: &[f64]) -> OperatorResult<usize> {
    if population.is_empty() {
        return Err(OperatorFailure::new("cannot select from empty population"));
    }
    if population.len() != fitness.len() {
        return Err(OperatorFailure::new(format!(
            "fitness vector has {} entries for {} individuals",
            fitness.len(),
            population.len()
        )));
    }
    Ok(population.len())
}

/// Sample `k` distinct individuals, return the best.
fn tournament(fitness: &[f64], k: usize, rule: MinMaxRule, n: usize, rng: &mut dyn RngCore) -> usize {
    let k = k.clamp(1, n);
    let mut contestants = index::sample(rng, n, k).into_iter();
    let mut best_idx = contestants.next().unwrap_or(0);
    for idx in contestants {
        if rule.is_better(fitness[idx], fitness[best_idx]) {
            best_idx = idx;
        }
    }
    best_idx
}

/// Selection weights that grow with quality.
///
/// For maximization: `f − min + ε`; for minimization: `max − f + ε`.
/// NaN fitness gets the minimum weight.
fn quality_weights(fitness: &[f64], rule: MinMaxRule) -> Vec<f64> {
    let epsilon = 1e-10;
    let finite = fitness.iter().copied().filter(|f| f.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
        (lo.min(f), hi.max(f))
    });
    fitness
        .iter()
        .map(|&f| {
            if !f.is_finite() || !lo.is_finite() {
                return epsilon;
            }
            let w = match rule {
                MinMaxRule::Max => f - lo,
                MinMaxRule::Min => hi - f,
            };
            w.max(0.0) + epsilon
        })
        .collect()
}

/// Roulette wheel over non-negative weights.
fn roulette(weights: &[f64], rng: &mut dyn RngCore) -> usize {
    let n = weights.len();
    if n == 1 {
        return 0;
    }
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return rng.random_range(0..n);
    }

    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > threshold {
            return i;
        }
    }

    n - 1 // floating-point fallback
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::operators::testing::ctx;
    use crate::ga::params::OperatorParams;
    use crate::random::create_rng;

    fn make_population(n: usize) -> Vec<Individual> {
        (0..n).map(|i| vec![i as f64]).collect()
    }

    fn counts(
        op: &dyn SelectionOperator,
        fitness: &[f64],
        params: &OperatorParams,
        rule: MinMaxRule,
    ) -> Vec<u32> {
        let pop = make_population(fitness.len());
        let mut c = ctx(params);
        c.rule = rule;
        let mut rng = create_rng(42);
        let mut counts = vec![0u32; fitness.len()];
        for _ in 0..10_000 {
            let idx = op.select(&pop, fitness, &c, &mut rng).unwrap();
            counts[idx] += 1;
        }
        counts
    }

    #[test]
    fn test_tournament_favors_best_max() {
        let params = OperatorParams::new().with("tournament_size", 4);
        let counts = counts(&Tournament, &[10.0, 5.0, 1.0, 8.0], &params, MinMaxRule::Max);
        // Sampling without replacement over the whole population: best always wins.
        assert_eq!(counts[0], 10_000);
    }

    #[test]
    fn test_tournament_favors_best_min() {
        let params = OperatorParams::new().with("tournament_size", 3);
        let counts = counts(&Tournament, &[10.0, 5.0, 1.0, 8.0], &params, MinMaxRule::Min);
        assert!(counts[2] > 6000, "expected best to dominate: {counts:?}");
        // The worst can never win a tournament of 3 out of 4.
        assert_eq!(counts[0], 0);
    }

    #[test]
    fn test_tournament_size_1_is_random() {
        let params = OperatorParams::new().with("tournament_size", 1);
        let counts = counts(&Tournament, &[10.0, 5.0, 1.0, 8.0], &params, MinMaxRule::Max);
        for &c in &counts {
            assert!(c > 1500, "expected uniform, got counts: {counts:?}");
        }
    }

    #[test]
    fn test_roulette_favors_best() {
        let params = OperatorParams::new();
        let counts = counts(&RouletteWheel, &[100.0, 50.0, 1.0, 80.0], &params, MinMaxRule::Min);
        assert!(counts[2] > counts[0], "best should win more: {counts:?}");

        let counts = counts_max_negative();
        assert!(counts[1] > counts[0], "{counts:?}");
    }

    fn counts_max_negative() -> Vec<u32> {
        counts(&RouletteWheel, &[-10.0, -1.0, -5.0], &OperatorParams::new(), MinMaxRule::Max)
    }

    #[test]
    fn test_rank_favors_best() {
        let params = OperatorParams::new();
        let counts = counts(&Rank, &[100.0, 50.0, 1.0, 80.0], &params, MinMaxRule::Min);
        assert!(counts[2] > counts[0], "best should win more: {counts:?}");
    }

    #[test]
    fn test_elitism_only_picks_elites() {
        let params = OperatorParams::new().with("elite_size", 2);
        let counts = counts(&Elitism, &[3.0, 9.0, 1.0, 7.0], &params, MinMaxRule::Max);
        assert_eq!(counts[0], 0);
        assert_eq!(counts[2], 0);
        assert!(counts[1] > 0 && counts[3] > 0);
    }

    #[test]
    fn test_fitness_sharing_penalizes_crowds() {
        // Three identical genomes share a niche; the loner keeps its weight.
        let pop = vec![vec![0.0], vec![0.0], vec![0.0], vec![5.0]];
        let fitness = [1.0, 1.0, 1.0, 1.0];
        let params = OperatorParams::new().with("sigma_share", 1.0);
        let c = ctx(&params);
        let mut rng = create_rng(7);
        let mut counts = [0u32; 4];
        for _ in 0..10_000 {
            counts[FitnessSharing.select(&pop, &fitness, &c, &mut rng).unwrap()] += 1;
        }
        assert!(counts[3] > counts[0], "{counts:?}");
    }

    #[test]
    fn test_adaptive_switches_strategy() {
        let pop = make_population(4);
        let fitness = [1.0, 2.0, 3.0, 4.0];
        let params = OperatorParams::new().with("tournament_size", 4);
        let mut c = ctx(&params);
        let mut rng = create_rng(3);
        c.generation = 1;
        for _ in 0..100 {
            assert_eq!(AdaptiveSelection.select(&pop, &fitness, &c, &mut rng).unwrap(), 3);
        }
        c.generation = 9;
        let picked: std::collections::HashSet<usize> = (0..500)
            .map(|_| AdaptiveSelection.select(&pop, &fitness, &c, &mut rng).unwrap())
            .collect();
        assert!(picked.len() > 1);
    }

    #[test]
    fn test_single_individual() {
        let pop = make_population(1);
        let params = OperatorParams::new();
        let c = ctx(&params);
        let mut rng = create_rng(42);
        let ops: [&dyn SelectionOperator; 5] =
            [&Tournament, &RouletteWheel, &Rank, &Elitism, &FitnessSharing];
        for op in ops {
            assert_eq!(op.select(&pop, &[5.0], &c, &mut rng).unwrap(), 0);
        }
    }

    #[test]
    fn test_empty_population_fails() {
        let params = OperatorParams::new();
        let c = ctx(&params);
        let mut rng = create_rng(42);
        let err = Tournament.select(&[], &[], &c, &mut rng).unwrap_err();
        assert_eq!(err.message(), "cannot select from empty population");
    }

    #[test]
    fn test_misaligned_fitness_fails() {
        let params = OperatorParams::new();
        let c = ctx(&params);
        let mut rng = create_rng(42);
        assert!(Rank.select(&make_population(3), &[1.0], &c, &mut rng).is_err());
    }

    #[test]
    fn test_nan_fitness_still_selects_in_range() {
        let params = OperatorParams::new();
        let c = ctx(&params);
        let mut rng = create_rng(42);
        let fitness = [f64::NAN, f64::NAN, 1.0];
        for _ in 0..100 {
            let idx = RouletteWheel.select(&make_population(3), &fitness, &c, &mut rng).unwrap();
            assert!(idx < 3);
        }
    }
}
