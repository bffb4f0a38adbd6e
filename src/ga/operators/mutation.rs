//! Built-in mutation operators.
//!
//! The engine decides *whether* an offspring is mutated (with probability
//! `mutation_rate`); these operators decide *how*. Per-gene operators read a
//! `gene_rate` parameter, the probability that each individual gene is
//! touched, defaulting to `1 / len`.
//!
//! - [`Gaussian`]: add normal noise (real-valued)
//! - [`Creep`]: add small uniform noise (real-valued)
//! - [`Bitwise`]: flip `g → 1 − g` (binary)
//! - [`Inversion`]: reverse a random segment (any encoding)
//! - [`Adaptive`]: bit flip with a rate that decays over the run (binary)

use super::{gene_rate, random_segment, MutationOperator, OperatorContext, OperatorResult};
use crate::error::OperatorFailure;
use crate::ga::types::{Gene, Individual};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};

/// Gaussian mutation: `g += N(mean, std)` for each selected gene.
///
/// Parameters `gene_rate`, `mean` (default 0), `std` (default 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct Gaussian;

impl MutationOperator for Gaussian {
    fn mutate(
        &self,
        individual: &[Gene],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Individual> {
        let rate = gene_rate(ctx.params, individual.len())?;
        let mean = ctx.params.f64_or("mean", 0.0)?;
        let std = ctx.params.f64_or("std", 1.0)?;
        let noise = Normal::new(mean, std)
            .map_err(|e| OperatorFailure::new(format!("invalid gaussian parameters: {e}")))?;

        Ok(individual
            .iter()
            .map(|&g| {
                if rng.random_bool(rate) {
                    g + noise.sample(&mut *rng)
                } else {
                    g
                }
            })
            .collect())
    }
}

/// Creep mutation: `g += U(−creep_range, creep_range)` for each selected
/// gene.
///
/// Parameters `gene_rate`, `creep_range` (default 0.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct Creep;

impl MutationOperator for Creep {
    fn mutate(
        &self,
        individual: &[Gene],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Individual> {
        let rate = gene_rate(ctx.params, individual.len())?;
        let range = ctx.params.f64_or("creep_range", 0.1)?;
        if !(range >= 0.0) || !range.is_finite() {
            return Err(OperatorFailure::new("creep_range must be non-negative"));
        }
        if !(2.0 * range).is_finite() {
            return Err(OperatorFailure::new(format!("creep_range {range} is too wide to sample")));
        }

        Ok(individual
            .iter()
            .map(|&g| {
                if range > 0.0 && rng.random_bool(rate) {
                    g + rng.random_range(-range..=range)
                } else {
                    g
                }
            })
            .collect())
    }
}

/// Bit-flip mutation: `g → 1 − g` for each selected gene.
///
/// Parameter `gene_rate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bitwise;

impl MutationOperator for Bitwise {
    fn mutate(
        &self,
        individual: &[Gene],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Individual> {
        let rate = gene_rate(ctx.params, individual.len())?;
        Ok(flip(individual, rate, rng))
    }
}

/// Inversion mutation: reverses a random segment `[start, end]`.
///
/// # Complexity
/// O(n)
#[derive(Debug, Clone, Copy, Default)]
pub struct Inversion;

impl MutationOperator for Inversion {
    fn mutate(
        &self,
        individual: &[Gene],
        _ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Individual> {
        let mut mutated = individual.to_vec();
        if mutated.len() < 2 {
            return Ok(mutated);
        }
        let (start, end) = random_segment(mutated.len(), rng);
        mutated[start..=end].reverse();
        Ok(mutated)
    }
}

/// Bit-flip mutation whose per-gene rate decays linearly from `gene_rate`
/// at the start of the run to 0 at `max_generations`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Adaptive;

impl MutationOperator for Adaptive {
    fn mutate(
        &self,
        individual: &[Gene],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<Individual> {
        let rate = gene_rate(ctx.params, individual.len())? * (1.0 - ctx.progress());
        Ok(flip(individual, rate.clamp(0.0, 1.0), rng))
    }
}

fn flip(individual: &[Gene], rate: f64, rng: &mut dyn RngCore) -> Individual {
    individual
        .iter()
        .map(|&g| if rng.random_bool(rate) { 1.0 - g } else { g })
        .collect()
}
