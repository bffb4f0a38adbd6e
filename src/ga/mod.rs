//! Genetic algorithm execution engine.
//!
//! A run is described by a [`GaConfig`]: topology, population and rate
//! parameters, and one named operator per category. Names are resolved
//! against an [`OperatorRegistry`] that holds the built-in operator library
//! plus whatever the caller registers. [`GaRunner::run`] then evolves the
//! populations and reports per-generation records to a [`ProgressSink`] and
//! lifecycle changes to a [`StatusCallback`].
//!
//! # Topologies
//!
//! - [`Topology::MasterWorker`]: one population, fitness evaluated in
//!   parallel by a [`WorkerPool`].
//! - [`Topology::IslandModel`]: several populations advanced in lockstep,
//!   exchanging individuals around a ring every `migration_interval`
//!   generations ([`IslandRunner`]).
//! - [`Topology::AsynchronousModel`]: islands on their own threads,
//!   migrating through channels without a per-generation barrier
//!   ([`run_async`]).
//!
//! # Key Types
//!
//! - [`GaConfig`]: run parameters (builder pattern, [`GaConfig::validate`])
//! - [`OperatorRegistry`]: name → operator tables, one per category
//! - [`GenerationEngine`]: one population and its generational loop
//! - [`TerminationEvaluator`]: custom operator, generation limit and
//!   built-in [`TerminationPolicy`]
//! - [`RunResults`]: merged per-process [`GenerationRecord`]s
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*
//! - Cantú-Paz (2000), *Efficient and Accurate Parallel Genetic Algorithms*
//! - Eiben, Hinterding & Michalewicz (1999), "Parameter Control in
//!   Evolutionary Algorithms"

mod config;
pub mod engine;
pub mod island;
pub mod operators;
mod params;
pub mod pool;
pub mod progress;
pub mod registry;
mod runner;
pub mod termination;
mod types;

pub use config::{GaConfig, IslandConfig, OperatorSpec};
pub use engine::{GenerationEngine, LoopOutcome, StepOutcome};
pub use island::{migrate, run_async, IslandRunner};
pub use operators::{OperatorContext, OperatorResult, TunableParams};
pub use params::{OperatorParams, ParamValue};
pub use pool::WorkerPool;
pub use progress::{
    CollectingSink, GenerationRecord, NullSink, ProcessLog, ProgressSink, ResultAggregator,
    RunResults,
};
pub use registry::{OperatorRegistry, ResolvedOperators};
pub use runner::{GaRunner, RunError, RunHooks, RunReport, RunState, RunStatus, StatusCallback};
pub use termination::{TerminationEvaluator, TerminationPolicy, TerminationReason, TerminationState};
pub use types::{FitnessVector, Gene, Individual, MinMaxRule, OperatorCategory, Population, Topology};
