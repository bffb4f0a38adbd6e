//! Run configuration.
//!
//! [`GaConfig`] is resolved once per run and shared read-only by every
//! island and worker. It names the topology, the numeric GA parameters and
//! one [`OperatorSpec`] per operator category.

use super::params::OperatorParams;
use super::types::{MinMaxRule, OperatorCategory, Topology};
use crate::error::ConfigError;
use std::collections::BTreeMap;

/// Operator name plus its keyword parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperatorSpec {
    /// Registered operator name.
    pub name: String,
    /// Operator-specific keyword parameters.
    pub params: OperatorParams,
}

impl OperatorSpec {
    /// Creates a spec with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: OperatorParams::new(),
        }
    }

    /// Adds a keyword parameter.
    pub fn with_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<super::params::ParamValue>,
    ) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Replaces the keyword parameters.
    pub fn with_params(mut self, params: OperatorParams) -> Self {
        self.params = params;
        self
    }
}

/// Island topology parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IslandConfig {
    /// Number of islands in the ring.
    pub num_islands: usize,
    /// Generations between migration rounds.
    pub migration_interval: usize,
    /// Fraction of an island's population that emigrates per round.
    pub migration_rate: f64,
}

/// Configuration of one GA run.
///
/// # Defaults
///
/// ```
/// use u_evolve::ga::{GaConfig, Topology};
///
/// let config = GaConfig::default();
/// assert_eq!(config.algorithm, Topology::MasterWorker);
/// assert_eq!(config.population_size, 100);
/// assert_eq!(config.max_generations, 500);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_evolve::ga::{GaConfig, OperatorCategory, OperatorSpec, Topology};
///
/// let config = GaConfig::default()
///     .with_algorithm(Topology::IslandModel)
///     .with_population_size(40)
///     .with_islands(4, 5, 0.1)
///     .with_operator(OperatorCategory::Fitness, OperatorSpec::new("rastrigin"))
///     .with_operator(
///         OperatorCategory::Selection,
///         OperatorSpec::new("tournament").with_param("tournament_size", 4),
///     );
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GaConfig {
    /// Execution topology.
    pub algorithm: Topology,

    /// Individuals per population (per island for island topologies).
    pub population_size: usize,

    /// Generation limit; the run terminates at `generation >= max_generations`.
    pub max_generations: usize,

    /// Probability that a child is mutated (0.0–1.0).
    pub mutation_rate: f64,

    /// Probability that a parent pair is recombined (0.0–1.0).
    ///
    /// When crossover is not applied, both parents pass through unchanged.
    pub crossover_rate: f64,

    /// Fitness worker threads per population. `0` uses one per CPU.
    pub num_workers: usize,

    /// Best individuals copied unchanged into the next generation.
    pub elitism_size: usize,

    /// Which fitness direction counts as "best".
    pub min_max_rule: MinMaxRule,

    /// Random seed for reproducibility. `None` uses a random seed.
    pub seed: Option<u64>,

    /// Per-call fitness time limit in milliseconds.
    ///
    /// The limit is not preemptive: a call that overruns it is reported
    /// after it returns.
    pub fitness_timeout_ms: Option<u64>,

    /// Operator per category.
    pub operators: BTreeMap<OperatorCategory, OperatorSpec>,

    /// Island parameters, required by island topologies.
    pub island: Option<IslandConfig>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            algorithm: Topology::MasterWorker,
            population_size: 100,
            max_generations: 500,
            mutation_rate: 0.1,
            crossover_rate: 0.9,
            num_workers: 0,
            elitism_size: 0,
            min_max_rule: MinMaxRule::Max,
            seed: None,
            fitness_timeout_ms: None,
            operators: BTreeMap::new(),
            island: None,
        }
    }
}

impl GaConfig {
    /// Sets the topology.
    pub fn with_algorithm(mut self, algorithm: Topology) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the maximum number of generations.
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the number of fitness workers.
    pub fn with_num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    /// Sets the elitism size.
    pub fn with_elitism_size(mut self, n: usize) -> Self {
        self.elitism_size = n;
        self
    }

    /// Sets the optimization direction.
    pub fn with_min_max_rule(mut self, rule: MinMaxRule) -> Self {
        self.min_max_rule = rule;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the per-call fitness time limit in milliseconds.
    pub fn with_fitness_timeout_ms(mut self, ms: u64) -> Self {
        self.fitness_timeout_ms = Some(ms);
        self
    }

    /// Sets the operator of a category.
    pub fn with_operator(mut self, category: OperatorCategory, spec: OperatorSpec) -> Self {
        self.operators.insert(category, spec);
        self
    }

    /// Sets the island parameters.
    pub fn with_islands(
        mut self,
        num_islands: usize,
        migration_interval: usize,
        migration_rate: f64,
    ) -> Self {
        self.island = Some(IslandConfig {
            num_islands,
            migration_interval,
            migration_rate,
        });
        self
    }

    /// The operator configured for a category.
    pub fn operator(&self, category: OperatorCategory) -> Option<&OperatorSpec> {
        self.operators.get(&category)
    }

    /// Number of islands the run uses (1 for master-worker).
    pub fn num_islands(&self) -> usize {
        match (self.algorithm.is_island(), self.island) {
            (true, Some(island)) => island.num_islands,
            _ => 1,
        }
    }

    /// Individuals that leave an island per migration round:
    /// `max(1, floor(population_size × migration_rate))`, capped so that at
    /// least one native stays behind.
    pub fn migration_count(&self) -> usize {
        let rate = self.island.map(|i| i.migration_rate).unwrap_or(0.0);
        let k = ((self.population_size as f64 * rate).floor() as usize).max(1);
        k.min(self.population_size.saturating_sub(1))
    }

    /// Validates the numeric parameters and the island section.
    ///
    /// Operator names are checked by
    /// [`OperatorRegistry::resolve`](super::OperatorRegistry::resolve).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::invalid(
                "population_size",
                "must be at least 2",
            ));
        }
        if self.max_generations == 0 {
            return Err(ConfigError::invalid("max_generations", "must be at least 1"));
        }
        check_rate("mutation_rate", self.mutation_rate)?;
        check_rate("crossover_rate", self.crossover_rate)?;
        if self.elitism_size >= self.population_size {
            return Err(ConfigError::invalid(
                "elitism_size",
                "elites would fill the entire population",
            ));
        }
        if self.fitness_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "fitness_timeout_ms",
                "must be positive or unset",
            ));
        }
        if self.algorithm.is_island() {
            let island = self
                .island
                .ok_or(ConfigError::MissingIslandParameters(self.algorithm))?;
            if island.num_islands == 0 {
                return Err(ConfigError::invalid("num_islands", "must be at least 1"));
            }
            if island.migration_interval == 0 {
                return Err(ConfigError::invalid(
                    "migration_interval",
                    "must be at least 1",
                ));
            }
            check_rate("migration_rate", island.migration_rate)?;
        }
        Ok(())
    }
}

fn check_rate(name: &str, rate: f64) -> Result<(), ConfigError> {
    if rate.is_finite() && (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(ConfigError::invalid(name, format!("must be within [0, 1], got {rate}")))
    }
}

#[cfg(feature = "serde")]
mod document {
    //! JSON configuration documents.
    //!
    //! The document is a flat map: numeric parameters at the top level and
    //! one `{operator_name, operator_kwargs}` object per operator category.

    use super::{GaConfig, IslandConfig, OperatorSpec};
    use crate::error::ConfigError;
    use crate::ga::params::OperatorParams;
    use crate::ga::types::{MinMaxRule, OperatorCategory, Topology};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct RawOperator {
        operator_name: String,
        #[serde(default)]
        operator_kwargs: OperatorParams,
    }

    #[derive(Deserialize)]
    struct RawConfig {
        algorithm: String,
        population_size: usize,
        max_generations: usize,
        mutation_rate: f64,
        crossover_rate: f64,
        #[serde(default)]
        num_workers: usize,
        #[serde(default)]
        elitism_size: usize,
        #[serde(default)]
        min_max_rule: Option<String>,
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default)]
        fitness_timeout_ms: Option<u64>,
        #[serde(default)]
        adaptation: Option<RawOperator>,
        #[serde(default)]
        crossover: Option<RawOperator>,
        #[serde(default)]
        fitness: Option<RawOperator>,
        #[serde(default)]
        initialize_population: Option<RawOperator>,
        #[serde(default)]
        mutation: Option<RawOperator>,
        #[serde(default)]
        selection: Option<RawOperator>,
        #[serde(default)]
        termination: Option<RawOperator>,
        #[serde(default)]
        num_islands: Option<usize>,
        #[serde(default)]
        migration_interval: Option<usize>,
        #[serde(default)]
        migration_rate: Option<f64>,
    }

    impl TryFrom<RawConfig> for GaConfig {
        type Error = ConfigError;

        fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
            let algorithm = Topology::parse(&raw.algorithm).ok_or_else(|| {
                ConfigError::invalid("algorithm", format!("unknown topology `{}`", raw.algorithm))
            })?;
            let min_max_rule = match raw.min_max_rule.as_deref() {
                None => MinMaxRule::default(),
                Some(s) => MinMaxRule::parse(s).ok_or_else(|| {
                    ConfigError::invalid("min_max_rule", format!("expected `min` or `max`, got `{s}`"))
                })?,
            };
            let island = match (raw.num_islands, raw.migration_interval, raw.migration_rate) {
                (Some(num_islands), Some(migration_interval), Some(migration_rate)) => Some(IslandConfig {
                    num_islands,
                    migration_interval,
                    migration_rate,
                }),
                _ => None,
            };

            let mut config = GaConfig {
                algorithm,
                population_size: raw.population_size,
                max_generations: raw.max_generations,
                mutation_rate: raw.mutation_rate,
                crossover_rate: raw.crossover_rate,
                num_workers: raw.num_workers,
                elitism_size: raw.elitism_size,
                min_max_rule,
                seed: raw.seed,
                fitness_timeout_ms: raw.fitness_timeout_ms,
                island,
                ..GaConfig::default()
            };

            let operators = [
                (OperatorCategory::Adaptation, raw.adaptation),
                (OperatorCategory::Crossover, raw.crossover),
                (OperatorCategory::Fitness, raw.fitness),
                (OperatorCategory::InitializePopulation, raw.initialize_population),
                (OperatorCategory::Mutation, raw.mutation),
                (OperatorCategory::Selection, raw.selection),
                (OperatorCategory::Termination, raw.termination),
            ];
            for (category, op) in operators {
                if let Some(op) = op {
                    config.operators.insert(
                        category,
                        OperatorSpec {
                            name: op.operator_name,
                            params: op.operator_kwargs,
                        },
                    );
                }
            }
            Ok(config)
        }
    }

    impl GaConfig {
        /// Parses a JSON configuration document.
        ///
        /// Only the document structure is checked here; call
        /// [`validate`](GaConfig::validate) for parameter ranges.
        pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
            let raw: RawConfig =
                serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
            raw.try_into()
        }

        /// Parses an already-decoded JSON value.
        pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
            let raw: RawConfig =
                serde_json::from_value(value).map_err(|e| ConfigError::Malformed(e.to_string()))?;
            raw.try_into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GaConfig::default();
        assert_eq!(config.algorithm, Topology::MasterWorker);
        assert_eq!(config.population_size, 100);
        assert_eq!(config.max_generations, 500);
        assert!((config.mutation_rate - 0.1).abs() < 1e-10);
        assert!((config.crossover_rate - 0.9).abs() < 1e-10);
        assert_eq!(config.num_workers, 0);
        assert_eq!(config.elitism_size, 0);
        assert_eq!(config.min_max_rule, MinMaxRule::Max);
        assert!(config.seed.is_none());
        assert!(config.operators.is_empty());
        assert!(config.island.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = GaConfig::default()
            .with_population_size(20)
            .with_max_generations(30)
            .with_mutation_rate(0.05)
            .with_crossover_rate(0.7)
            .with_num_workers(2)
            .with_elitism_size(1)
            .with_min_max_rule(MinMaxRule::Min)
            .with_seed(42)
            .with_fitness_timeout_ms(100)
            .with_operator(OperatorCategory::Fitness, OperatorSpec::new("sphere"));

        assert_eq!(config.population_size, 20);
        assert_eq!(config.max_generations, 30);
        assert!((config.mutation_rate - 0.05).abs() < 1e-10);
        assert!((config.crossover_rate - 0.7).abs() < 1e-10);
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.elitism_size, 1);
        assert_eq!(config.min_max_rule, MinMaxRule::Min);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.fitness_timeout_ms, Some(100));
        assert_eq!(
            config.operator(OperatorCategory::Fitness).map(|s| s.name.as_str()),
            Some("sphere")
        );
    }

    #[test]
    fn test_clamp_rates() {
        let config = GaConfig::default()
            .with_crossover_rate(-0.5)
            .with_mutation_rate(2.0);
        assert!((config.crossover_rate - 0.0).abs() < 1e-10);
        assert!((config.mutation_rate - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_validate_ok() {
        assert!(GaConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_population_too_small() {
        let config = GaConfig::default().with_population_size(1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name, .. }) if name == "population_size"
        ));
    }

    #[test]
    fn test_validate_zero_generations() {
        let config = GaConfig::default().with_max_generations(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rates_set_directly() {
        let mut config = GaConfig::default();
        config.mutation_rate = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_elitism_too_high() {
        let config = GaConfig::default()
            .with_population_size(10)
            .with_elitism_size(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = GaConfig::default().with_fitness_timeout_ms(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_island_topology_requires_island_section() {
        let config = GaConfig::default().with_algorithm(Topology::IslandModel);
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingIslandParameters(Topology::IslandModel))
        );

        let config = config.with_islands(3, 0, 0.1);
        assert!(config.validate().is_err());

        let config = GaConfig::default()
            .with_algorithm(Topology::AsynchronousModel)
            .with_islands(3, 2, 0.1);
        assert!(config.validate().is_ok());
        assert_eq!(config.num_islands(), 3);
    }

    #[test]
    fn test_num_islands_master_worker_is_one() {
        let config = GaConfig::default().with_islands(5, 1, 0.2);
        assert_eq!(config.num_islands(), 1);
    }

    #[test]
    fn test_migration_count() {
        let config = GaConfig::default()
            .with_population_size(4)
            .with_islands(3, 1, 0.5);
        assert_eq!(config.migration_count(), 2);

        // At least one migrant per round.
        let config = GaConfig::default()
            .with_population_size(10)
            .with_islands(3, 1, 0.01);
        assert_eq!(config.migration_count(), 1);

        // At least one native stays.
        let config = GaConfig::default()
            .with_population_size(4)
            .with_islands(3, 1, 1.0);
        assert_eq!(config.migration_count(), 3);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json_document() {
        let json = r#"{
            "algorithm": "island_model",
            "population_size": 12,
            "max_generations": 40,
            "mutation_rate": 0.2,
            "crossover_rate": 0.8,
            "num_workers": 2,
            "min_max_rule": "min",
            "fitness": {"operator_name": "rastrigin"},
            "selection": {"operator_name": "tournament", "operator_kwargs": {"tournament_size": "4"}},
            "crossover": {"operator_name": "single_point"},
            "mutation": {"operator_name": "gaussian", "operator_kwargs": {"std": 0.3}},
            "initialize_population": {"operator_name": "uniform", "operator_kwargs": {"chrom_length": 5}},
            "num_islands": 3,
            "migration_interval": 5,
            "migration_rate": 0.25
        }"#;
        let config = GaConfig::from_json_str(json).unwrap();
        assert_eq!(config.algorithm, Topology::IslandModel);
        assert_eq!(config.min_max_rule, MinMaxRule::Min);
        assert_eq!(config.num_islands(), 3);
        let selection = config.operator(OperatorCategory::Selection).unwrap();
        assert_eq!(selection.params.usize_or("tournament_size", 3).unwrap(), 4);
        assert!(config.validate().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json_rejects_unknown_topology() {
        let json = r#"{"algorithm": "ring", "population_size": 4, "max_generations": 1,
                       "mutation_rate": 0.0, "crossover_rate": 0.0}"#;
        assert!(matches!(
            GaConfig::from_json_str(json),
            Err(ConfigError::InvalidParameter { .. })
        ));
        assert!(matches!(
            GaConfig::from_json_str("{"),
            Err(ConfigError::Malformed(_))
        ));
    }
}
