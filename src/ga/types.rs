//! Core data model shared by every part of the engine.
//!
//! An [`Individual`] is a fixed-length vector of genes. Binary encodings use
//! `0.0`/`1.0` genes. Fitness values live in a separate [`FitnessVector`]
//! that is index-aligned with its [`Population`] and recomputed every
//! generation.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single gene value.
pub type Gene = f64;

/// A candidate solution: a fixed-length ordered sequence of genes.
pub type Individual = Vec<Gene>;

/// An ordered collection of individuals evolved together.
pub type Population = Vec<Individual>;

/// One fitness value per individual, index-aligned with the population.
pub type FitnessVector = Vec<f64>;

/// Direction of optimization: which fitness value counts as "best".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MinMaxRule {
    /// Lower fitness is better.
    Min,
    /// Higher fitness is better.
    #[default]
    Max,
}

impl MinMaxRule {
    /// Parses `"min"` / `"max"` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Some(MinMaxRule::Min),
            "max" => Some(MinMaxRule::Max),
            _ => None,
        }
    }

    /// Returns `true` if `a` is strictly better than `b`.
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            MinMaxRule::Min => a < b,
            MinMaxRule::Max => a > b,
        }
    }

    /// Index of the best fitness value, first one on ties.
    ///
    /// NaN values are never selected unless every value is NaN.
    pub fn best_index(self, fitness: &[f64]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &f) in fitness.iter().enumerate() {
            match best {
                None => best = Some(i),
                Some(b) if fitness[b].is_nan() && !f.is_nan() => best = Some(i),
                Some(b) if self.is_better(f, fitness[b]) => best = Some(i),
                _ => {}
            }
        }
        best
    }

    /// Best fitness value in the slice.
    pub fn best(self, fitness: &[f64]) -> Option<f64> {
        self.best_index(fitness).map(|i| fitness[i])
    }

    /// Population indices sorted best first, NaN last. Ties keep their
    /// original order.
    pub fn rank_indices(self, fitness: &[f64]) -> Vec<usize> {
        use std::cmp::Ordering;

        let mut order: Vec<usize> = (0..fitness.len()).collect();
        order.sort_by(|&a, &b| {
            let (x, y) = (fitness[a], fitness[b]);
            match (x.is_nan(), y.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => match self {
                    MinMaxRule::Min => x.total_cmp(&y),
                    MinMaxRule::Max => y.total_cmp(&x),
                },
            }
        });
        order
    }

    /// The opposite rule.
    pub fn reversed(self) -> Self {
        match self {
            MinMaxRule::Min => MinMaxRule::Max,
            MinMaxRule::Max => MinMaxRule::Min,
        }
    }
}

impl fmt::Display for MinMaxRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MinMaxRule::Min => "min",
            MinMaxRule::Max => "max",
        })
    }
}

/// Operator categories resolved by the [`OperatorRegistry`](super::OperatorRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OperatorCategory {
    Fitness,
    Selection,
    Crossover,
    Mutation,
    Adaptation,
    InitializePopulation,
    Termination,
}

impl OperatorCategory {
    /// Every category, in configuration order.
    pub const ALL: [OperatorCategory; 7] = [
        OperatorCategory::Adaptation,
        OperatorCategory::Crossover,
        OperatorCategory::Fitness,
        OperatorCategory::InitializePopulation,
        OperatorCategory::Mutation,
        OperatorCategory::Selection,
        OperatorCategory::Termination,
    ];

    /// Configuration key of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            OperatorCategory::Fitness => "fitness",
            OperatorCategory::Selection => "selection",
            OperatorCategory::Crossover => "crossover",
            OperatorCategory::Mutation => "mutation",
            OperatorCategory::Adaptation => "adaptation",
            OperatorCategory::InitializePopulation => "initialize_population",
            OperatorCategory::Termination => "termination",
        }
    }

    /// Parses a configuration key.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for OperatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Topology {
    /// One population, fitness evaluated by a worker pool.
    #[default]
    MasterWorker,
    /// Islands advanced in lockstep with periodic ring migration.
    IslandModel,
    /// Islands advanced independently, migrating through mailboxes.
    AsynchronousModel,
}

impl Topology {
    /// Configuration value of the topology.
    pub fn as_str(self) -> &'static str {
        match self {
            Topology::MasterWorker => "master_worker",
            Topology::IslandModel => "island_model",
            Topology::AsynchronousModel => "asynchronous_model",
        }
    }

    /// Parses a configuration value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "master_worker" => Some(Topology::MasterWorker),
            "island_model" => Some(Topology::IslandModel),
            "asynchronous_model" => Some(Topology::AsynchronousModel),
            _ => None,
        }
    }

    /// Whether the topology runs several islands.
    pub fn is_island(self) -> bool {
        !matches!(self, Topology::MasterWorker)
    }

    /// Operator categories that must resolve before the run can start.
    ///
    /// Migration is engine-owned, so island topologies need nothing beyond
    /// the master-worker set.
    pub fn required_categories(self) -> &'static [OperatorCategory] {
        &[
            OperatorCategory::Fitness,
            OperatorCategory::Selection,
            OperatorCategory::Crossover,
            OperatorCategory::Mutation,
            OperatorCategory::InitializePopulation,
        ]
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
