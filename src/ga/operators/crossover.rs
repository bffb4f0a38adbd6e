//! Built-in crossover operators for real- and binary-valued chromosomes.
//!
//! # Positional
//!
//! - [`SinglePoint`]: swap the tails after one cut point
//! - [`TwoPoint`]: swap the segment between two cut points
//! - [`Uniform`]: swap each gene independently
//!
//! # Blending (real-valued)
//!
//! - [`Arithmetic`]: convex combination of the parents
//! - [`BlxAlpha`]: sample from the parents' extended bounding box
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Syswerda (1989), "Uniform Crossover in Genetic Algorithms"
//! - Eshelman & Schaffer (1993), "Real-Coded Genetic Algorithms and
//!   Interval-Schemata"

use super::{check_parents, random_segment, CrossoverOperator, OperatorContext, OperatorResult};
use crate::error::OperatorFailure;
use crate::ga::types::{Gene, Individual};
use rand::{Rng, RngCore};

// ============================================================================
// Positional crossover
// ============================================================================

/// Single-point crossover.
///
/// Picks a cut point in `1..len` and swaps the tails. Parents of length 1
/// are returned as swapped copies.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePoint;

impl CrossoverOperator for SinglePoint {
    fn crossover(
        &self,
        parent1: &[Gene],
        parent2: &[Gene],
        _ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<(Individual, Individual)> {
        check_parents(parent1, parent2)?;
        let n = parent1.len();
        if n < 2 {
            return Ok((parent2.to_vec(), parent1.to_vec()));
        }
        let point = rng.random_range(1..n);
        Ok((splice(parent1, parent2, point, n), splice(parent2, parent1, point, n)))
    }
}

/// Two-point crossover.
///
/// Swaps the segment `[start, end]` between the parents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoPoint;

impl CrossoverOperator for TwoPoint {
    fn crossover(
        &self,
        parent1: &[Gene],
        parent2: &[Gene],
        _ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<(Individual, Individual)> {
        check_parents(parent1, parent2)?;
        let (start, end) = random_segment(parent1.len(), rng);
        let mut child1 = parent1.to_vec();
        let mut child2 = parent2.to_vec();
        child1[start..=end].copy_from_slice(&parent2[start..=end]);
        child2[start..=end].copy_from_slice(&parent1[start..=end]);
        Ok((child1, child2))
    }
}

/// Uniform crossover.
///
/// Each gene of child 1 comes from parent 1 with probability `prob`
/// (default 0.5); child 2 takes the complement.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl CrossoverOperator for Uniform {
    fn crossover(
        &self,
        parent1: &[Gene],
        parent2: &[Gene],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<(Individual, Individual)> {
        check_parents(parent1, parent2)?;
        let prob = probability(ctx, "prob", 0.5)?;
        let mut child1 = Vec::with_capacity(parent1.len());
        let mut child2 = Vec::with_capacity(parent2.len());
        for (&a, &b) in parent1.iter().zip(parent2) {
            if rng.random_bool(prob) {
                child1.push(a);
                child2.push(b);
            } else {
                child1.push(b);
                child2.push(a);
            }
        }
        Ok((child1, child2))
    }
}

// ============================================================================
// Blending crossover
// ============================================================================

/// Arithmetic crossover: `c1 = α·p1 + (1−α)·p2`, `c2 = α·p2 + (1−α)·p1`.
///
/// Parameter `alpha` (default 0.5). Deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Arithmetic;

impl CrossoverOperator for Arithmetic {
    fn crossover(
        &self,
        parent1: &[Gene],
        parent2: &[Gene],
        ctx: &OperatorContext<'_>,
        _rng: &mut dyn RngCore,
    ) -> OperatorResult<(Individual, Individual)> {
        check_parents(parent1, parent2)?;
        let alpha = ctx.params.f64_or("alpha", 0.5)?;
        let blend = |x: &[Gene], y: &[Gene]| -> Individual {
            x.iter().zip(y).map(|(a, b)| alpha * a + (1.0 - alpha) * b).collect()
        };
        Ok((blend(parent1, parent2), blend(parent2, parent1)))
    }
}

/// BLX-α crossover.
///
/// Each child gene is drawn uniformly from `[lo − α·d, hi + α·d]` where
/// `lo`/`hi` are the parents' genes and `d = hi − lo`.
///
/// Parameter `alpha` (default 0.5, must be non-negative).
#[derive(Debug, Clone, Copy, Default)]
pub struct BlxAlpha;

impl CrossoverOperator for BlxAlpha {
    fn crossover(
        &self,
        parent1: &[Gene],
        parent2: &[Gene],
        ctx: &OperatorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> OperatorResult<(Individual, Individual)> {
        check_parents(parent1, parent2)?;
        let alpha = ctx.params.f64_or("alpha", 0.5)?;
        if alpha < 0.0 {
            return Err(OperatorFailure::new("alpha must be non-negative"));
        }

        let mut child1 = Vec::with_capacity(parent1.len());
        let mut child2 = Vec::with_capacity(parent2.len());
        for (&a, &b) in parent1.iter().zip(parent2) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let d = hi - lo;
            let (lower, upper) = (lo - alpha * d, hi + alpha * d);
            if !(upper > lower) {
                // Identical (or non-finite) genes: nothing to blend.
                child1.push(a);
                child2.push(b);
                continue;
            }
            if !(upper - lower).is_finite() {
                return Err(OperatorFailure::new(format!(
                    "blend interval [{lower}, {upper}] is too wide to sample"
                )));
            }
            child1.push(rng.random_range(lower..=upper));
            child2.push(rng.random_range(lower..=upper));
        }
        Ok((child1, child2))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn splice(head: &[Gene], tail: &[Gene], point: usize, n: usize) -> Individual {
    let mut child = Vec::with_capacity(n);
    child.extend_from_slice(&head[..point]);
    child.extend_from_slice(&tail[point..]);
    child
}

fn probability(ctx: &OperatorContext<'_>, key: &str, default: f64) -> OperatorResult<f64> {
    let p = ctx.params.f64_or(key, default)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(OperatorFailure::new(format!(
            "{key} must be within [0, 1], got {p}"
        )));
    }
    Ok(p)
}

// ============================================================================
// Tests
// ============================================================================
