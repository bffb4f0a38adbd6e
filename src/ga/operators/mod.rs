//! Operator interfaces and the built-in operator library.
//!
//! Every operator category has a trait. Operators receive their inputs by
//! reference and return new values; the engine never hands them mutable
//! access to a population. Per-call information (generation, current rates,
//! keyword parameters) arrives through an [`OperatorContext`] instead of
//! access to the engine itself.
//!
//! # Categories
//!
//! | Category | Trait | Built-ins |
//! |---|---|---|
//! | fitness | [`FitnessOperator`] | [`fitness`] |
//! | selection | [`SelectionOperator`] | [`selection`] |
//! | crossover | [`CrossoverOperator`] | [`crossover`] |
//! | mutation | [`MutationOperator`] | [`mutation`] |
//! | adaptation | [`AdaptationOperator`] | [`adaptation`] |
//! | initialize_population | [`InitializationOperator`] | [`initialization`] |
//! | termination | [`TerminationOperator`] | engine-owned policies in [`termination`](super::termination) |

pub mod adaptation;
pub mod crossover;
pub mod fitness;
pub mod initialization;
pub mod mutation;
pub mod selection;

use super::params::OperatorParams;
use super::termination::TerminationState;
use super::types::{Gene, Individual, MinMaxRule, Population};
use crate::error::OperatorFailure;
use rand::{Rng, RngCore};

/// Result type returned by every operator.
pub type OperatorResult<T> = Result<T, OperatorFailure>;

/// Read-only view of the engine state handed to operators.
#[derive(Debug, Clone, Copy)]
pub struct OperatorContext<'a> {
    /// Generation being built (1-based).
    pub generation: usize,
    /// Configured generation limit.
    pub max_generations: usize,
    /// Optimization direction.
    pub rule: MinMaxRule,
    /// Current mutation rate (may have been adapted).
    pub mutation_rate: f64,
    /// Current crossover rate (may have been adapted).
    pub crossover_rate: f64,
    /// Current elitism size (may have been adapted).
    pub elitism_size: usize,
    /// Best fitness of the previous generation, if any.
    pub previous_best: Option<f64>,
    /// Keyword parameters of the operator being called.
    pub params: &'a OperatorParams,
}

impl OperatorContext<'_> {
    /// Fraction of the generation budget consumed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.max_generations == 0 {
            return 1.0;
        }
        (self.generation as f64 / self.max_generations as f64).clamp(0.0, 1.0)
    }
}

/// Engine parameters an adaptation operator may change between generations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunableParams {
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub elitism_size: usize,
}

/// Scores one individual.
///
/// Called concurrently from the worker pool, so implementations must be
/// `Send + Sync` and must not rely on call order.
pub trait FitnessOperator: Send + Sync {
    fn evaluate(&self, individual: &[Gene], params: &OperatorParams) -> OperatorResult<f64>;
}

/// Chooses a parent index from the population.
///
/// `fitness` is index-aligned with `population`. The returned index must
/// lie in `0..population.len()`.
pub trait SelectionOperator: Send + Sync {
    fn select(
        &self,
        population: &[Individual],
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<usize>;
}

/// Recombines two parents into two children of the same length.
pub trait CrossoverOperator: Send + Sync {
    fn crossover(
        &self,
        parent1: &[Gene],
        parent2: &[Gene],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<(Individual, Individual)>;
}

/// Produces a perturbed copy of an individual of the same length.
pub trait MutationOperator: Send + Sync {
    fn mutate(
        &self,
        individual: &[Gene],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Individual>;
}

/// Adjusts the engine's tunable parameters for the next generation.
pub trait AdaptationOperator: Send + Sync {
    fn adapt(&self, params: &mut TunableParams, ctx: &OperatorContext<'_>) -> OperatorResult<()>;
}

/// Creates the initial population.
pub trait InitializationOperator: Send + Sync {
    fn initialize(
        &self,
        population_size: usize,
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Population>;
}

/// Caller-supplied termination check, consulted before the built-in
/// policies.
pub trait TerminationOperator: Send + Sync {
    fn should_terminate(
        &self,
        state: &TerminationState<'_>,
        params: &OperatorParams,
    ) -> OperatorResult<bool>;
}

/// Adapts a closure into a [`FitnessOperator`].
pub struct FitnessFn<F>(pub F);

impl<F> FitnessOperator for FitnessFn<F>
where
    F: Fn(&[Gene], &OperatorParams) -> OperatorResult<f64> + Send + Sync,
{
    fn evaluate(&self, individual: &[Gene], params: &OperatorParams) -> OperatorResult<f64> {
        (self.0)(individual, params)
    }
}

/// Adapts a closure into a [`TerminationOperator`].
pub struct TerminationFn<F>(pub F);

impl<F> TerminationOperator for TerminationFn<F>
where
    F: Fn(&TerminationState<'_>, &OperatorParams) -> OperatorResult<bool> + Send + Sync,
{
    fn should_terminate(
        &self,
        state: &TerminationState<'_>,
        params: &OperatorParams,
    ) -> OperatorResult<bool> {
        (self.0)(state, params)
    }
}

/// Fails unless both parents have the same, non-zero length.
pub(crate) fn check_parents(parent1: &[Gene], parent2: &[Gene]) -> OperatorResult<()> {
    if parent1.len() != parent2.len() {
        return Err(OperatorFailure::new(format!(
            "parents have different lengths ({} and {})",
            parent1.len(),
            parent2.len()
        )));
    }
    if parent1.is_empty() {
        return Err(OperatorFailure::new("parents must not be empty"));
    }
    Ok(())
}

/// Reads a per-gene probability parameter, defaulting to `1 / len`.
pub(crate) fn gene_rate(params: &OperatorParams, len: usize) -> OperatorResult<f64> {
    let default = if len == 0 { 0.0 } else { 1.0 / len as f64 };
    let rate = params.f64_or("gene_rate", default)?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(OperatorFailure::new(format!(
            "gene_rate must be within [0, 1], got {rate}"
        )));
    }
    Ok(rate)
}

/// Pick a random segment `[start, end]` within `0..n` where `start <= end`.
pub(crate) fn random_segment(n: usize, rng: &mut dyn RngCore) -> (usize, usize) {
    let a = rng.random_range(0..n);
    let b = rng.random_range(0..n);
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) fn ctx(params: &OperatorParams) -> OperatorContext<'_> {
        OperatorContext {
            generation: 1,
            max_generations: 10,
            rule: MinMaxRule::Max,
            mutation_rate: 0.1,
            crossover_rate: 0.9,
            elitism_size: 0,
            previous_best: None,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress() {
        let params = OperatorParams::new();
        let mut c = testing::ctx(&params);
        c.generation = 5;
        assert!((c.progress() - 0.5).abs() < 1e-12);
        c.generation = 50;
        assert!((c.progress() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fitness_fn_adapter() {
        let op = FitnessFn(|genes: &[Gene], _: &OperatorParams| -> OperatorResult<f64> {
            Ok(genes.iter().sum())
        });
        assert_eq!(op.evaluate(&[1.0, 2.0], &OperatorParams::new()), Ok(3.0));
    }

    #[test]
    fn test_check_parents() {
        assert!(check_parents(&[1.0], &[2.0]).is_ok());
        assert!(check_parents(&[1.0], &[2.0, 3.0]).is_err());
        assert!(check_parents(&[], &[]).is_err());
    }

    #[test]
    fn test_random_segment_bounds() {
        let mut rng = crate::random::create_rng(42);
        for _ in 0..1000 {
            let (start, end) = random_segment(10, &mut rng);
            assert!(start <= end);
            assert!(end < 10);
        }
    }

    #[test]
    fn test_gene_rate_default_and_bounds() {
        let params = OperatorParams::new();
        assert!((gene_rate(&params, 4).unwrap() - 0.25).abs() < 1e-12);
        let params = OperatorParams::new().with("gene_rate", 1.5);
        assert!(gene_rate(&params, 4).is_err());
    }
}
