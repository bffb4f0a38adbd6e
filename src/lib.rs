//! Configurable genetic-algorithm execution engine.
//!
//! Evolves populations of real- or binary-coded individuals under one of
//! three topologies:
//!
//! - **Master-worker**: a single population whose fitness is evaluated by a
//!   bounded worker pool.
//! - **Island model**: isolated sub-populations advanced in lockstep with
//!   periodic ring migration.
//! - **Asynchronous islands**: sub-populations on their own threads that
//!   exchange migrants without a per-generation barrier.
//!
//! Every evolutionary step is a named, pluggable operator (fitness,
//! selection, crossover, mutation, adaptation, initialization and
//! termination) resolved from an [`OperatorRegistry`](ga::OperatorRegistry)
//! before the run starts.
//!
//! # Architecture
//!
//! The crate has no persistence, transport or export layer. Callers hand it
//! a validated [`GaConfig`](ga::GaConfig), a registry, a progress sink and a
//! status callback; it hands back per-generation records and a terminal
//! status. Logging goes through `tracing`; no subscriber is installed.

pub mod error;
pub mod ga;
pub mod random;
