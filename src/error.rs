//! Error types for the GA engine.
//!
//! - [`ConfigError`]: the configuration cannot run; detected before any
//!   population or worker pool exists.
//! - [`OperatorFailure`]: returned by an operator (built-in or caller
//!   supplied) that cannot produce a result.
//! - [`WorkerPoolError`]: the parallel fitness fan-out failed.
//! - [`EngineError`]: a fatal failure during a run, tagged with the operator
//!   category and generation.
//!
//! Cancellation is not an error; a stopped run ends in
//! [`RunStatus::Stopped`](crate::ga::RunStatus::Stopped).

use crate::ga::{OperatorCategory, Topology};
use std::any::Any;
use thiserror::Error;

/// The configuration is invalid or references operators that cannot be
/// resolved.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A category required by the topology has no configured operator.
    #[error("{topology} requires a `{category}` operator but none is configured")]
    MissingOperator {
        category: OperatorCategory,
        topology: Topology,
    },

    /// The configured operator name is not registered.
    #[error("unknown {category} operator `{name}`")]
    UnknownOperator {
        category: OperatorCategory,
        name: String,
    },

    /// A numeric or structural parameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// An island topology was selected without island parameters.
    #[error("{0} requires num_islands, migration_interval and migration_rate")]
    MissingIslandParameters(Topology),

    /// The configuration document could not be parsed.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

impl ConfigError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by an operator.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct OperatorFailure {
    message: String,
}

impl OperatorFailure {
    /// Creates a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure of the parallel fitness evaluation.
///
/// A single failing individual aborts the whole evaluation; there is no
/// partial result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkerPoolError {
    /// The fitness operator returned an error.
    #[error("fitness evaluation failed for individual {index}: {source}")]
    Evaluation {
        index: usize,
        source: OperatorFailure,
    },

    /// The fitness operator panicked inside a worker.
    #[error("fitness worker panicked on individual {index}: {message}")]
    Panicked { index: usize, message: String },

    /// A fitness call took longer than the configured per-call limit.
    #[error("fitness evaluation of individual {index} took {elapsed_ms} ms (limit {limit_ms} ms)")]
    Timeout {
        index: usize,
        elapsed_ms: u64,
        limit_ms: u64,
    },

    /// The worker threads could not be started.
    #[error("failed to start worker pool: {0}")]
    Build(String),
}

/// Fatal error during a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An operator failed; the run is aborted without retry.
    #[error("{category} operator failed at generation {generation}: {source}")]
    Operator {
        category: OperatorCategory,
        generation: usize,
        source: OperatorFailure,
    },

    /// The worker pool failed while evaluating fitness.
    #[error("fitness evaluation failed at generation {generation}: {source}")]
    WorkerPool {
        generation: usize,
        source: WorkerPoolError,
    },

    /// The engine panicked outside any single operator call.
    #[error("engine panicked at generation {generation}: {message}")]
    Panicked { generation: usize, message: String },
}

impl EngineError {
    pub(crate) fn operator(
        category: OperatorCategory,
        generation: usize,
        source: OperatorFailure,
    ) -> Self {
        EngineError::Operator {
            category,
            generation,
            source,
        }
    }

    /// Wraps a panic payload caught around an operator call.
    pub(crate) fn operator_panic(
        category: OperatorCategory,
        generation: usize,
        payload: &(dyn Any + Send),
    ) -> Self {
        let message = format!("panicked: {}", panic_message(payload));
        EngineError::operator(category, generation, OperatorFailure::new(message))
    }

    /// Operator category the failure is attributed to.
    ///
    /// Worker pool failures are attributed to the fitness operator.
    pub fn category(&self) -> Option<OperatorCategory> {
        match self {
            EngineError::Config(_) | EngineError::Panicked { .. } => None,
            EngineError::Operator { category, .. } => Some(*category),
            EngineError::WorkerPool { .. } => Some(OperatorCategory::Fitness),
        }
    }

    /// Generation during which the failure happened (0 = run setup).
    pub fn generation(&self) -> Option<usize> {
        match self {
            EngineError::Config(_) => None,
            EngineError::Operator { generation, .. }
            | EngineError::WorkerPool { generation, .. }
            | EngineError::Panicked { generation, .. } => Some(*generation),
        }
    }
}

/// Text of a panic payload (`&str` or `String`).
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
