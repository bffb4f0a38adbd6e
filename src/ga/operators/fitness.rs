//! Built-in benchmark fitness functions.
//!
//! Classic continuous test landscapes. All have their global minimum at a
//! known point, so pair them with `min_max_rule = min`.
//!
//! # References
//!
//! - Rastrigin (1974), *Systems of Extremal Control*
//! - Rosenbrock (1960), "An Automatic Method for Finding the Greatest or
//!   Least Value of a Function"
//! - Ackley (1987), *A Connectionist Machine for Genetic Hillclimbing*

use super::{FitnessOperator, OperatorResult};
use crate::error::OperatorFailure;
use crate::ga::params::OperatorParams;
use crate::ga::types::Gene;
use std::f64::consts::{E, PI};

/// Sphere: `Σ x_i²`, minimum 0 at the origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sphere;

impl FitnessOperator for Sphere {
    fn evaluate(&self, individual: &[Gene], _params: &OperatorParams) -> OperatorResult<f64> {
        Ok(individual.iter().map(|x| x * x).sum())
    }
}

/// Rastrigin: `A·n + Σ (x_i² − A·cos(2π x_i))`, minimum 0 at the origin.
///
/// Parameter `a` (default 10).
#[derive(Debug, Clone, Copy, Default)]
pub struct Rastrigin;

impl FitnessOperator for Rastrigin {
    fn evaluate(&self, individual: &[Gene], params: &OperatorParams) -> OperatorResult<f64> {
        let a = params.f64_or("a", 10.0)?;
        Ok(a * individual.len() as f64
            + individual
                .iter()
                .map(|x| x * x - a * (2.0 * PI * x).cos())
                .sum::<f64>())
    }
}

/// Rosenbrock: `Σ 100(x_{i+1} − x_i²)² + (1 − x_i)²`, minimum 0 at `(1, …, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rosenbrock;

impl FitnessOperator for Rosenbrock {
    fn evaluate(&self, individual: &[Gene], _params: &OperatorParams) -> OperatorResult<f64> {
        Ok(individual
            .windows(2)
            .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
            .sum())
    }
}

/// Ackley, minimum 0 at the origin.
///
/// Parameters `a` (20), `b` (0.2), `c` (2π).
#[derive(Debug, Clone, Copy, Default)]
pub struct Ackley;

impl FitnessOperator for Ackley {
    fn evaluate(&self, individual: &[Gene], params: &OperatorParams) -> OperatorResult<f64> {
        if individual.is_empty() {
            return Err(OperatorFailure::new("ackley needs at least one gene"));
        }
        let a = params.f64_or("a", 20.0)?;
        let b = params.f64_or("b", 0.2)?;
        let c = params.f64_or("c", 2.0 * PI)?;
        let d = individual.len() as f64;
        let sum_sq = individual.iter().map(|x| x * x).sum::<f64>() / d;
        let sum_cos = individual.iter().map(|x| (c * x).cos()).sum::<f64>() / d;
        Ok(-a * (-b * sum_sq.sqrt()).exp() - sum_cos.exp() + a + E)
    }
}
