//! Run controller.
//!
//! [`GaRunner`] drives a complete run: validation and operator resolution →
//! engine construction (one per island) → topology loop → result
//! aggregation → status reporting.

use super::config::GaConfig;
use super::engine::{run_single, GenerationEngine, LoopOutcome};
use super::island::{run_async, IslandRunner};
use super::progress::{NullSink, ProcessLog, ProgressSink, ResultAggregator, RunResults};
use super::registry::OperatorRegistry;
use super::termination::TerminationReason;
use super::types::{Individual, OperatorCategory, Topology};
use crate::error::{ConfigError, EngineError};
use crate::random::derive_seed;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RunStatus {
    #[default]
    Created,
    Started,
    /// A population terminated normally.
    Finished,
    /// The external stop flag was raised.
    Stopped,
    /// Configuration, operator or worker pool failure.
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Created => "created",
            RunStatus::Started => "started",
            RunStatus::Finished => "finished",
            RunStatus::Stopped => "stopped",
            RunStatus::Error => "error",
        })
    }
}

/// Why a run ended in [`RunStatus::Error`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunError {
    /// Operator category at fault, when one can be named.
    pub category: Option<OperatorCategory>,
    /// Generation of the failure (0 = population setup). `None` for
    /// configuration errors.
    pub generation: Option<usize>,
    pub message: String,
}

impl RunError {
    fn from_config(err: &ConfigError) -> Self {
        let category = match err {
            ConfigError::MissingOperator { category, .. }
            | ConfigError::UnknownOperator { category, .. } => Some(*category),
            _ => None,
        };
        Self {
            category,
            generation: None,
            message: err.to_string(),
        }
    }

    fn from_engine(err: &EngineError) -> Self {
        Self {
            category: err.category(),
            generation: err.generation(),
            message: err.to_string(),
        }
    }
}

/// Status plus the error reason, as reported to the [`StatusCallback`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunState {
    pub status: RunStatus,
    pub error: Option<RunError>,
}

impl RunState {
    fn new(status: RunStatus) -> Self {
        Self { status, error: None }
    }

    fn failed(error: RunError) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(error),
        }
    }
}

/// Receives run lifecycle transitions.
pub trait StatusCallback: Send + Sync {
    fn on_status(&self, state: &RunState);
}

impl<F> StatusCallback for F
where
    F: Fn(&RunState) + Send + Sync,
{
    fn on_status(&self, state: &RunState) {
        self(state)
    }
}

/// Collaborators of a run.
#[derive(Clone)]
pub struct RunHooks {
    /// Lifecycle status receiver.
    pub callback: Option<Arc<dyn StatusCallback>>,
    /// Per-generation record receiver.
    pub sink: Arc<dyn ProgressSink>,
    /// Raised by the caller to stop the run at the next generation boundary.
    pub stop: Arc<AtomicBool>,
}

impl Default for RunHooks {
    fn default() -> Self {
        Self {
            callback: None,
            sink: Arc::new(NullSink),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl RunHooks {
    pub fn with_callback(mut self, callback: impl StatusCallback + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    fn report(&self, state: &RunState) {
        if let Some(callback) = &self.callback {
            callback.on_status(state);
        }
    }
}

impl fmt::Debug for RunHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHooks")
            .field("callback", &self.callback.is_some())
            .field("stop", &self.stop)
            .finish_non_exhaustive()
    }
}

/// Outcome of a run that got past configuration checks.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Terminal state, also reported through the status callback.
    pub state: RunState,
    /// Merged per-process records.
    pub results: RunResults,
    /// Generations evaluated by the result process.
    pub generations: usize,
    /// Why the run terminated (`None` when stopped or failed).
    pub termination: Option<TerminationReason>,
    /// Best fitness and individual of the result process's last generation.
    pub best: Option<(f64, Individual)>,
}

/// Executes GA runs.
///
/// # Usage
///
/// ```
/// use u_evolve::ga::{
///     GaConfig, GaRunner, MinMaxRule, OperatorCategory, OperatorRegistry, OperatorSpec,
///     RunHooks, RunStatus,
/// };
///
/// let config = GaConfig::default()
///     .with_population_size(20)
///     .with_max_generations(10)
///     .with_min_max_rule(MinMaxRule::Min)
///     .with_seed(42)
///     .with_operator(OperatorCategory::Fitness, OperatorSpec::new("sphere"))
///     .with_operator(OperatorCategory::Selection, OperatorSpec::new("tournament"))
///     .with_operator(OperatorCategory::Crossover, OperatorSpec::new("arithmetic"))
///     .with_operator(OperatorCategory::Mutation, OperatorSpec::new("gaussian"))
///     .with_operator(
///         OperatorCategory::InitializePopulation,
///         OperatorSpec::new("uniform").with_param("chrom_length", 4),
///     );
///
/// let registry = OperatorRegistry::with_builtins();
/// let report = GaRunner::run(&config, &registry, RunHooks::default()).unwrap();
/// assert_eq!(report.state.status, RunStatus::Finished);
/// assert_eq!(report.generations, 10);
/// ```
pub struct GaRunner;

impl GaRunner {
    /// Runs the configured topology to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] (after reporting [`RunStatus::Error`]) when
    /// the configuration is invalid or names unresolvable operators. Nothing
    /// is constructed in that case. Failures once the run has started are
    /// reported in [`RunReport::state`] instead.
    pub fn run(
        config: &GaConfig,
        registry: &OperatorRegistry,
        hooks: RunHooks,
    ) -> Result<RunReport, ConfigError> {
        let operators = match config.validate().and_then(|()| registry.resolve(config)) {
            Ok(operators) => Arc::new(operators),
            Err(err) => {
                error!(error = %err, "invalid configuration");
                hooks.report(&RunState::failed(RunError::from_config(&err)));
                return Err(err);
            }
        };

        let seed = config.seed.unwrap_or_else(rand::random::<u64>);
        let num_islands = config.num_islands();
        let start = Instant::now();
        info!(
            algorithm = %config.algorithm,
            islands = num_islands,
            population_size = config.population_size,
            max_generations = config.max_generations,
            seed,
            "run started"
        );
        hooks.report(&RunState::new(RunStatus::Started));

        let mut engines = Vec::with_capacity(num_islands);
        for index in 0..num_islands {
            let log = if config.algorithm.is_island() {
                ProcessLog::island(index)
            } else {
                ProcessLog::master()
            };
            match GenerationEngine::new(
                config,
                Arc::clone(&operators),
                log,
                derive_seed(seed, index),
                Arc::clone(&hooks.sink),
            ) {
                Ok(engine) => engines.push(engine),
                Err(error) => {
                    let outcome = LoopOutcome::Failed { index, error };
                    return Ok(Self::finish(config, engines, outcome, &hooks, start));
                }
            }
        }

        let stop = hooks.stop.as_ref();
        let migration_interval = config.island.map_or(1, |island| island.migration_interval);
        let (engines, outcome) = match config.algorithm {
            Topology::MasterWorker => {
                let outcome = match engines.first_mut() {
                    Some(engine) => run_single(engine, stop),
                    None => LoopOutcome::Stopped,
                };
                (engines, outcome)
            }
            Topology::IslandModel => {
                let mut runner = IslandRunner::new(
                    engines,
                    migration_interval,
                    config.migration_count(),
                    derive_seed(seed, num_islands),
                );
                let outcome = runner.run(stop);
                (runner.into_engines(), outcome)
            }
            Topology::AsynchronousModel => {
                let seeds: Vec<u64> = (0..num_islands)
                    .map(|i| derive_seed(seed, num_islands + 1 + i))
                    .collect();
                run_async(engines, migration_interval, config.migration_count(), &seeds, stop)
            }
        };

        Ok(Self::finish(config, engines, outcome, &hooks, start))
    }

    fn finish(
        config: &GaConfig,
        engines: Vec<GenerationEngine>,
        outcome: LoopOutcome,
        hooks: &RunHooks,
        start: Instant,
    ) -> RunReport {
        let terminating = match &outcome {
            LoopOutcome::Terminated { index, .. } => engines.get(*index),
            _ => None,
        };
        let terminating_key = terminating.map(|engine| engine.log().key().to_string());
        let generations = match terminating {
            Some(engine) => engine.generation(),
            None => engines.iter().map(GenerationEngine::generation).max().unwrap_or(0),
        };

        let logs = engines.into_iter().map(GenerationEngine::into_log).collect();
        let results = ResultAggregator::finalize(logs, terminating_key.as_deref());
        let best = results.final_record().map(|record| {
            let (fitness, individual) = record.best(config.min_max_rule);
            (fitness, individual.clone())
        });

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let (state, termination) = match outcome {
            LoopOutcome::Terminated { reason, .. } => {
                info!(
                    process = terminating_key.as_deref().unwrap_or_default(),
                    generations,
                    %reason,
                    best = best.as_ref().map(|(f, _)| *f),
                    elapsed_ms,
                    "run finished"
                );
                (RunState::new(RunStatus::Finished), Some(reason))
            }
            LoopOutcome::Stopped => {
                info!(generations, elapsed_ms, "run stopped");
                (RunState::new(RunStatus::Stopped), None)
            }
            LoopOutcome::Failed { index, error } => {
                error!(island = index, error = %error, "run failed");
                (RunState::failed(RunError::from_engine(&error)), None)
            }
        };

        hooks.report(&state);
        RunReport {
            state,
            results,
            generations,
            termination,
            best,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
