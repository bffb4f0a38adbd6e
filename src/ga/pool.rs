//! Parallel fitness evaluation.
//!
//! Each engine owns one [`WorkerPool`] for its whole lifetime; the rayon
//! thread pool is built once and reused every generation. Output is always
//! index-aligned with the input population.

use super::operators::FitnessOperator;
use super::params::OperatorParams;
use super::types::{FitnessVector, Individual};
use crate::error::{panic_message, WorkerPoolError};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// A bounded pool of fitness workers.
pub struct WorkerPool {
    pool: ThreadPool,
    timeout: Option<Duration>,
}

impl WorkerPool {
    /// Starts a pool with `num_workers` threads (0 = rayon's default, one
    /// per logical CPU).
    pub fn new(num_workers: usize) -> Result<Self, WorkerPoolError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("ga-worker-{i}"))
            .build()
            .map_err(|e| WorkerPoolError::Build(e.to_string()))?;
        Ok(Self {
            pool,
            timeout: None,
        })
    }

    /// Sets a per-call time limit for fitness evaluations.
    ///
    /// The limit is not preemptive: a call that overran is reported as
    /// [`WorkerPoolError::Timeout`] once it returns.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluates every individual in parallel.
    ///
    /// `result[i]` is the fitness of `population[i]`. Any failing call
    /// aborts the evaluation and no partial result is returned; when several
    /// calls fail, which one is reported is unspecified.
    pub fn evaluate(
        &self,
        population: &[Individual],
        fitness: &dyn FitnessOperator,
        params: &OperatorParams,
    ) -> Result<FitnessVector, WorkerPoolError> {
        let timeout = self.timeout;
        self.pool.install(|| {
            population
                .par_iter()
                .enumerate()
                .map(|(index, individual)| evaluate_one(index, individual, fitness, params, timeout))
                .collect()
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn evaluate_one(
    index: usize,
    individual: &[f64],
    fitness: &dyn FitnessOperator,
    params: &OperatorParams,
    timeout: Option<Duration>,
) -> Result<f64, WorkerPoolError> {
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| fitness.evaluate(individual, params)));
    let elapsed = start.elapsed();

    let value = match outcome {
        Ok(Ok(value)) => value,
        Ok(Err(source)) => return Err(WorkerPoolError::Evaluation { index, source }),
        Err(payload) => {
            return Err(WorkerPoolError::Panicked {
                index,
                message: panic_message(payload.as_ref()),
            })
        }
    };

    if let Some(limit) = timeout {
        if elapsed > limit {
            return Err(WorkerPoolError::Timeout {
                index,
                elapsed_ms: elapsed.as_millis() as u64,
                limit_ms: limit.as_millis() as u64,
            });
        }
    }
    Ok(value)
}
