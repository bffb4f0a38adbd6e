//! Built-in adaptation schedules.
//!
//! Each schedule is a function of run progress `t = generation / max_generations`
//! and rewrites one [`TunableParams`] field after every generation.

use super::{AdaptationOperator, OperatorContext, OperatorResult, TunableParams};
use crate::error::OperatorFailure;

/// `mutation_rate = max(initial_rate · (1 − t), min_rate)`.
///
/// Parameters `initial_rate` (default 0.01), `min_rate` (default 0.001).
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveMutationRate;

impl AdaptationOperator for AdaptiveMutationRate {
    fn adapt(&self, params: &mut TunableParams, ctx: &OperatorContext<'_>) -> OperatorResult<()> {
        params.mutation_rate = decaying_rate(ctx, 0.01, 0.001)?;
        Ok(())
    }
}

/// `crossover_rate = max(initial_rate · (1 − t), min_rate)`.
///
/// Parameters `initial_rate` (default 0.7), `min_rate` (default 0.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveCrossoverRate;

impl AdaptationOperator for AdaptiveCrossoverRate {
    fn adapt(&self, params: &mut TunableParams, ctx: &OperatorContext<'_>) -> OperatorResult<()> {
        params.crossover_rate = decaying_rate(ctx, 0.7, 0.5)?;
        Ok(())
    }
}

/// `elitism_size = ⌊initial_size + t · (max_size − initial_size)⌋`.
///
/// Parameters `initial_size` (default 2), `max_size` (default 10). The
/// engine caps the result below the population size.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveElitismSize;

impl AdaptationOperator for AdaptiveElitismSize {
    fn adapt(&self, params: &mut TunableParams, ctx: &OperatorContext<'_>) -> OperatorResult<()> {
        let initial = ctx.params.usize_or("initial_size", 2)? as f64;
        let max = ctx.params.usize_or("max_size", 10)? as f64;
        let size = initial + ctx.progress() * (max - initial);
        params.elitism_size = size.max(0.0).floor() as usize;
        Ok(())
    }
}

fn decaying_rate(ctx: &OperatorContext<'_>, initial: f64, min: f64) -> OperatorResult<f64> {
    let initial = ctx.params.f64_or("initial_rate", initial)?;
    let min = ctx.params.f64_or("min_rate", min)?;
    for (key, v) in [("initial_rate", initial), ("min_rate", min)] {
        if !(0.0..=1.0).contains(&v) {
            return Err(OperatorFailure::new(format!(
                "{key} must be within [0, 1], got {v}"
            )));
        }
    }
    Ok((initial * (1.0 - ctx.progress())).max(min))
}
