//! Operator registry and resolution.
//!
//! The registry maps operator names to implementations, one table per
//! [`OperatorCategory`]. [`OperatorRegistry::resolve`] turns the operator
//! names of a [`GaConfig`] into shared implementations before anything else
//! of a run is built, so a misconfigured run fails without touching a
//! population or a worker pool.
//!
//! # Examples
//!
//! ```
//! use u_evolve::ga::{GaConfig, OperatorCategory, OperatorRegistry, OperatorSpec};
//! use u_evolve::ga::operators::OperatorResult;
//!
//! let mut registry = OperatorRegistry::with_builtins();
//! registry.register_fitness_fn("ones", |genes, _| -> OperatorResult<f64> {
//!     Ok(genes.iter().sum())
//! });
//!
//! let config = GaConfig::default()
//!     .with_operator(OperatorCategory::Fitness, OperatorSpec::new("ones"))
//!     .with_operator(OperatorCategory::Selection, OperatorSpec::new("tournament"))
//!     .with_operator(OperatorCategory::Crossover, OperatorSpec::new("single_point"))
//!     .with_operator(OperatorCategory::Mutation, OperatorSpec::new("bitwise"))
//!     .with_operator(
//!         OperatorCategory::InitializePopulation,
//!         OperatorSpec::new("random_binary").with_param("chrom_length", 16),
//!     );
//!
//! let resolved = registry.resolve(&config).unwrap();
//! assert_eq!(resolved.fitness.name, "ones");
//! ```

use super::config::{GaConfig, OperatorSpec};
use super::operators::{
    adaptation, crossover, fitness, initialization, mutation, selection, AdaptationOperator,
    CrossoverOperator, FitnessFn, FitnessOperator, InitializationOperator, MutationOperator,
    OperatorResult, SelectionOperator, TerminationFn, TerminationOperator,
};
use super::params::OperatorParams;
use super::termination::{TerminationEvaluator, TerminationPolicy, TerminationState};
use super::types::{Gene, OperatorCategory};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// An operator resolved from a configuration: implementation plus the
/// keyword parameters it was configured with.
pub struct Resolved<T: ?Sized> {
    pub name: String,
    pub operator: Arc<T>,
    pub params: OperatorParams,
}

impl<T: ?Sized> Clone for Resolved<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            operator: Arc::clone(&self.operator),
            params: self.params.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Resolved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Every operator a run needs, resolved and ready to share between engines.
#[derive(Debug, Clone)]
pub struct ResolvedOperators {
    pub fitness: Resolved<dyn FitnessOperator>,
    pub selection: Resolved<dyn SelectionOperator>,
    pub crossover: Resolved<dyn CrossoverOperator>,
    pub mutation: Resolved<dyn MutationOperator>,
    pub initialization: Resolved<dyn InitializationOperator>,
    pub adaptation: Option<Resolved<dyn AdaptationOperator>>,
    /// Built-in termination policy named by the configuration.
    pub termination_policy: Option<TerminationPolicy>,
    /// Caller-registered termination operator named by the configuration.
    pub custom_termination: Option<Resolved<dyn TerminationOperator>>,
}

impl ResolvedOperators {
    /// Creates a fresh termination evaluator for one population.
    pub fn termination_evaluator(&self, max_generations: usize) -> TerminationEvaluator {
        TerminationEvaluator::new(
            max_generations,
            self.termination_policy.clone(),
            self.custom_termination.clone(),
        )
    }
}

/// Name → implementation tables, one per operator category.
#[derive(Default, Clone)]
pub struct OperatorRegistry {
    fitness: HashMap<String, Arc<dyn FitnessOperator>>,
    selection: HashMap<String, Arc<dyn SelectionOperator>>,
    crossover: HashMap<String, Arc<dyn CrossoverOperator>>,
    mutation: HashMap<String, Arc<dyn MutationOperator>>,
    adaptation: HashMap<String, Arc<dyn AdaptationOperator>>,
    initialization: HashMap<String, Arc<dyn InitializationOperator>>,
    termination: HashMap<String, Arc<dyn TerminationOperator>>,
}

impl OperatorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in operator library.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();

        r.register_fitness("sphere", fitness::Sphere)
            .register_fitness("rastrigin", fitness::Rastrigin)
            .register_fitness("rosenbrock", fitness::Rosenbrock)
            .register_fitness("ackley", fitness::Ackley);

        r.register_selection("tournament", selection::Tournament)
            .register_selection("roulette_wheel", selection::RouletteWheel)
            .register_selection("rank", selection::Rank)
            .register_selection("elitism", selection::Elitism)
            .register_selection("fitness_sharing", selection::FitnessSharing)
            .register_selection("adaptive_selection", selection::AdaptiveSelection);

        r.register_crossover("single_point", crossover::SinglePoint)
            .register_crossover("two_point", crossover::TwoPoint)
            .register_crossover("uniform", crossover::Uniform)
            .register_crossover("arithmetic", crossover::Arithmetic)
            .register_crossover("blx_alpha", crossover::BlxAlpha);

        r.register_mutation("gaussian", mutation::Gaussian)
            .register_mutation("creep", mutation::Creep)
            .register_mutation("bitwise", mutation::Bitwise)
            .register_mutation("inversion", mutation::Inversion)
            .register_mutation("adaptive", mutation::Adaptive);

        r.register_adaptation("adaptive_mutation_rate", adaptation::AdaptiveMutationRate)
            .register_adaptation("adaptive_crossover_rate", adaptation::AdaptiveCrossoverRate)
            .register_adaptation("adaptive_elitism_size", adaptation::AdaptiveElitismSize);

        r.register_initialization("random_binary", initialization::RandomBinary)
            .register_initialization("uniform", initialization::Uniform)
            .register_initialization("normal", initialization::Gaussian)
            .register_initialization("known_solutions", initialization::KnownSolutions);

        r
    }

    pub fn register_fitness(
        &mut self,
        name: impl Into<String>,
        op: impl FitnessOperator + 'static,
    ) -> &mut Self {
        self.fitness.insert(name.into(), Arc::new(op));
        self
    }

    /// Registers a closure as a fitness operator.
    pub fn register_fitness_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&[Gene], &OperatorParams) -> OperatorResult<f64> + Send + Sync + 'static,
    {
        self.register_fitness(name, FitnessFn(f))
    }

    pub fn register_selection(
        &mut self,
        name: impl Into<String>,
        op: impl SelectionOperator + 'static,
    ) -> &mut Self {
        self.selection.insert(name.into(), Arc::new(op));
        self
    }

    pub fn register_crossover(
        &mut self,
        name: impl Into<String>,
        op: impl CrossoverOperator + 'static,
    ) -> &mut Self {
        self.crossover.insert(name.into(), Arc::new(op));
        self
    }

    pub fn register_mutation(
        &mut self,
        name: impl Into<String>,
        op: impl MutationOperator + 'static,
    ) -> &mut Self {
        self.mutation.insert(name.into(), Arc::new(op));
        self
    }

    pub fn register_adaptation(
        &mut self,
        name: impl Into<String>,
        op: impl AdaptationOperator + 'static,
    ) -> &mut Self {
        self.adaptation.insert(name.into(), Arc::new(op));
        self
    }

    pub fn register_initialization(
        &mut self,
        name: impl Into<String>,
        op: impl InitializationOperator + 'static,
    ) -> &mut Self {
        self.initialization.insert(name.into(), Arc::new(op));
        self
    }

    /// Registers a custom termination operator.
    ///
    /// Names of built-in policies (see [`TerminationPolicy::NAMES`]) always
    /// resolve to the built-in policy, so a custom operator registered under
    /// one of them is never used.
    pub fn register_termination(
        &mut self,
        name: impl Into<String>,
        op: impl TerminationOperator + 'static,
    ) -> &mut Self {
        self.termination.insert(name.into(), Arc::new(op));
        self
    }

    /// Registers a closure as a termination operator.
    pub fn register_termination_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&TerminationState<'_>, &OperatorParams) -> OperatorResult<bool> + Send + Sync + 'static,
    {
        self.register_termination(name, TerminationFn(f))
    }

    /// Whether `name` is registered under `category`.
    ///
    /// Built-in termination policies count as registered.
    pub fn contains(&self, category: OperatorCategory, name: &str) -> bool {
        match category {
            OperatorCategory::Fitness => self.fitness.contains_key(name),
            OperatorCategory::Selection => self.selection.contains_key(name),
            OperatorCategory::Crossover => self.crossover.contains_key(name),
            OperatorCategory::Mutation => self.mutation.contains_key(name),
            OperatorCategory::Adaptation => self.adaptation.contains_key(name),
            OperatorCategory::InitializePopulation => self.initialization.contains_key(name),
            OperatorCategory::Termination => {
                TerminationPolicy::is_builtin(name) || self.termination.contains_key(name)
            }
        }
    }

    /// Registered names of a category, sorted.
    pub fn names(&self, category: OperatorCategory) -> Vec<&str> {
        fn keys<T: ?Sized>(map: &HashMap<String, Arc<T>>) -> Vec<&str> {
            map.keys().map(String::as_str).collect()
        }
        let mut names = match category {
            OperatorCategory::Fitness => keys(&self.fitness),
            OperatorCategory::Selection => keys(&self.selection),
            OperatorCategory::Crossover => keys(&self.crossover),
            OperatorCategory::Mutation => keys(&self.mutation),
            OperatorCategory::Adaptation => keys(&self.adaptation),
            OperatorCategory::InitializePopulation => keys(&self.initialization),
            OperatorCategory::Termination => {
                let mut n = keys(&self.termination);
                n.extend(TerminationPolicy::NAMES);
                n
            }
        };
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Resolves every operator named by `config`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingOperator`] when a category required by the
    ///   topology is not configured
    /// - [`ConfigError::UnknownOperator`] when a required operator name is
    ///   not registered
    /// - [`ConfigError::InvalidParameter`] when a built-in termination
    ///   policy has unusable parameters
    ///
    /// Unknown adaptation or termination names are logged and ignored.
    pub fn resolve(&self, config: &GaConfig) -> Result<ResolvedOperators, ConfigError> {
        for &category in config.algorithm.required_categories() {
            required(config, category)?;
        }

        let fitness = lookup(
            &self.fitness,
            OperatorCategory::Fitness,
            required(config, OperatorCategory::Fitness)?,
        )?;
        let selection = lookup(
            &self.selection,
            OperatorCategory::Selection,
            required(config, OperatorCategory::Selection)?,
        )?;
        let crossover = lookup(
            &self.crossover,
            OperatorCategory::Crossover,
            required(config, OperatorCategory::Crossover)?,
        )?;
        let mutation = lookup(
            &self.mutation,
            OperatorCategory::Mutation,
            required(config, OperatorCategory::Mutation)?,
        )?;
        let initialization = lookup(
            &self.initialization,
            OperatorCategory::InitializePopulation,
            required(config, OperatorCategory::InitializePopulation)?,
        )?;

        let adaptation = config
            .operator(OperatorCategory::Adaptation)
            .and_then(|spec| optional(&self.adaptation, OperatorCategory::Adaptation, spec));

        let mut termination_policy = None;
        let mut custom_termination = None;
        if let Some(spec) = config.operator(OperatorCategory::Termination) {
            match TerminationPolicy::from_spec(&spec.name, &spec.params)? {
                Some(policy) => termination_policy = Some(policy),
                None => {
                    custom_termination =
                        optional(&self.termination, OperatorCategory::Termination, spec)
                }
            }
        }

        Ok(ResolvedOperators {
            fitness,
            selection,
            crossover,
            mutation,
            initialization,
            adaptation,
            termination_policy,
            custom_termination,
        })
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("OperatorRegistry");
        for category in OperatorCategory::ALL {
            d.field(category.as_str(), &self.names(category));
        }
        d.finish()
    }
}

fn required(config: &GaConfig, category: OperatorCategory) -> Result<&OperatorSpec, ConfigError> {
    config.operator(category).ok_or(ConfigError::MissingOperator {
        category,
        topology: config.algorithm,
    })
}

fn lookup<T: ?Sized>(
    map: &HashMap<String, Arc<T>>,
    category: OperatorCategory,
    spec: &OperatorSpec,
) -> Result<Resolved<T>, ConfigError> {
    let operator = map
        .get(&spec.name)
        .ok_or_else(|| ConfigError::UnknownOperator {
            category,
            name: spec.name.clone(),
        })?;
    Ok(Resolved {
        name: spec.name.clone(),
        operator: Arc::clone(operator),
        params: spec.params.clone(),
    })
}

fn optional<T: ?Sized>(
    map: &HashMap<String, Arc<T>>,
    category: OperatorCategory,
    spec: &OperatorSpec,
) -> Option<Resolved<T>> {
    match lookup(map, category, spec) {
        Ok(resolved) => Some(resolved),
        Err(err) => {
            warn!(%category, operator = %spec.name, "ignoring optional operator: {err}");
            None
        }
    }
}
