//! Termination evaluation.
//!
//! A [`TerminationEvaluator`] belongs to one population (the master-worker
//! population or one island). Each generation it is consulted in a fixed
//! order:
//!
//! 1. the caller-supplied termination operator, if one is configured;
//! 2. the generation limit (`generation ≥ max_generations`, always active);
//! 3. the configured built-in [`TerminationPolicy`], if any.
//!
//! The first check that fires wins. Termination is absorbing: once a reason
//! has been recorded every later call returns it again without evaluating.

use super::operators::TerminationOperator;
use super::params::OperatorParams;
use super::registry::Resolved;
use super::types::{Individual, MinMaxRule};
use crate::error::{ConfigError, OperatorFailure};
use std::fmt;
use std::time::{Duration, Instant};

/// Snapshot of a population handed to termination checks.
#[derive(Debug, Clone, Copy)]
pub struct TerminationState<'a> {
    /// Current generation (1-based).
    pub generation: usize,
    /// Configured generation limit.
    pub max_generations: usize,
    /// Optimization direction of the run.
    pub rule: MinMaxRule,
    pub population: &'a [Individual],
    pub fitness: &'a [f64],
    /// Population of the previous generation (`None` in generation 1).
    pub previous_population: Option<&'a [Individual]>,
    /// Fitness of the previous generation (`None` in generation 1).
    pub previous_fitness: Option<&'a [f64]>,
    /// Wall-clock time since the evaluator was created.
    pub elapsed: Duration,
}

/// Built-in termination policies.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationPolicy {
    /// Stop at `max_generations` (already always active; naming it is a no-op).
    GenerationLimit,
    /// Stop once the best fitness reaches `threshold`.
    ///
    /// `rule` overrides the run's [`MinMaxRule`] when set.
    FitnessThreshold {
        threshold: f64,
        rule: Option<MinMaxRule>,
    },
    /// Stop after `generations` consecutive generations whose best fitness
    /// moved by less than `threshold`.
    ///
    /// `rule` overrides the run's [`MinMaxRule`] when set.
    ConvergenceFitness {
        threshold: f64,
        generations: usize,
        rule: Option<MinMaxRule>,
    },
    /// Stop after `generations` consecutive generations whose population
    /// moved (Frobenius distance) by less than `threshold`.
    ConvergencePopulation { threshold: f64, generations: usize },
    /// Stop once `limit` wall-clock time has elapsed. Checked once per
    /// generation, so a run may overshoot by one generation.
    TimeLimit(Duration),
}

impl TerminationPolicy {
    /// Names of the built-in policies as used in configurations.
    pub const NAMES: [&'static str; 5] = [
        "generation_limit",
        "fitness_threshold",
        "convergence_fitness",
        "convergence_population",
        "time_limit",
    ];

    /// Whether `name` refers to a built-in policy.
    pub fn is_builtin(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    /// Builds a built-in policy from its configured name and parameters.
    ///
    /// Returns `Ok(None)` when `name` is not a built-in policy.
    ///
    /// # Parameters
    ///
    /// | Policy | Keys |
    /// |---|---|
    /// | `fitness_threshold` | `fitness_threshold` (required), `min_max_rule` |
    /// | `convergence_fitness` | `stagnation_threshold` (1e-6), `stagnation_generations` (10), `min_max_rule` |
    /// | `convergence_population` | `stagnation_threshold` (1e-6), `stagnation_generations` (10) |
    /// | `time_limit` | `time_limit` seconds (required) |
    pub fn from_spec(name: &str, params: &OperatorParams) -> Result<Option<Self>, ConfigError> {
        let invalid = |e: OperatorFailure| ConfigError::invalid(name, e.message());
        let policy = match name {
            "generation_limit" => TerminationPolicy::GenerationLimit,
            "fitness_threshold" => {
                let threshold = params
                    .f64("fitness_threshold")
                    .map_err(invalid)?
                    .ok_or_else(|| ConfigError::invalid("fitness_threshold", "is required"))?;
                let rule = rule_override(params)?;
                TerminationPolicy::FitnessThreshold { threshold, rule }
            }
            "convergence_fitness" | "convergence_population" => {
                let threshold = params.f64_or("stagnation_threshold", 1e-6).map_err(invalid)?;
                let generations = params
                    .usize_or("stagnation_generations", 10)
                    .map_err(invalid)?;
                if generations == 0 {
                    return Err(ConfigError::invalid("stagnation_generations", "must be at least 1"));
                }
                if name == "convergence_fitness" {
                    let rule = rule_override(params)?;
                    TerminationPolicy::ConvergenceFitness { threshold, generations, rule }
                } else {
                    TerminationPolicy::ConvergencePopulation { threshold, generations }
                }
            }
            "time_limit" => {
                let seconds = params
                    .f64("time_limit")
                    .map_err(invalid)?
                    .ok_or_else(|| ConfigError::invalid("time_limit", "is required"))?;
                let limit = Duration::try_from_secs_f64(seconds).map_err(|_| {
                    ConfigError::invalid("time_limit", format!("must be a non-negative number of seconds, got {seconds}"))
                })?;
                TerminationPolicy::TimeLimit(limit)
            }
            _ => return Ok(None),
        };
        Ok(Some(policy))
    }
}

/// Optional `min_max_rule` parameter of a policy.
fn rule_override(params: &OperatorParams) -> Result<Option<MinMaxRule>, ConfigError> {
    match params.text("min_max_rule") {
        None => Ok(None),
        Some(s) => MinMaxRule::parse(s).map(Some).ok_or_else(|| {
            ConfigError::invalid("min_max_rule", format!("expected `min` or `max`, got `{s}`"))
        }),
    }
}

/// Why a population stopped evolving.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// The caller-supplied operator with this name returned `true`.
    Custom(String),
    GenerationLimit,
    FitnessThreshold,
    FitnessConvergence,
    PopulationConvergence,
    TimeLimit,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Custom(name) => write!(f, "custom termination `{name}`"),
            TerminationReason::GenerationLimit => f.write_str("generation limit reached"),
            TerminationReason::FitnessThreshold => f.write_str("fitness threshold reached"),
            TerminationReason::FitnessConvergence => f.write_str("fitness converged"),
            TerminationReason::PopulationConvergence => f.write_str("population converged"),
            TerminationReason::TimeLimit => f.write_str("time limit reached"),
        }
    }
}

/// Per-population termination state machine.
pub struct TerminationEvaluator {
    custom: Option<Resolved<dyn TerminationOperator>>,
    policy: Option<TerminationPolicy>,
    max_generations: usize,
    start: Instant,
    stagnation_count: usize,
    terminated: Option<TerminationReason>,
}

impl TerminationEvaluator {
    /// Creates an evaluator; the time-limit clock starts now.
    pub fn new(
        max_generations: usize,
        policy: Option<TerminationPolicy>,
        custom: Option<Resolved<dyn TerminationOperator>>,
    ) -> Self {
        Self {
            custom,
            policy,
            max_generations,
            start: Instant::now(),
            stagnation_count: 0,
            terminated: None,
        }
    }

    /// Wall-clock time since creation.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The recorded termination reason, if any.
    pub fn reason(&self) -> Option<&TerminationReason> {
        self.terminated.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.is_some()
    }

    /// Evaluates the checks for one generation.
    ///
    /// Returns the termination reason once (and every time after) a check
    /// has fired. Only the custom operator can fail.
    pub fn check(
        &mut self,
        state: &TerminationState<'_>,
    ) -> Result<Option<TerminationReason>, OperatorFailure> {
        if let Some(reason) = &self.terminated {
            return Ok(Some(reason.clone()));
        }

        let reason = self.evaluate(state)?;
        if reason.is_some() {
            self.terminated = reason.clone();
        }
        Ok(reason)
    }

    fn evaluate(&mut self, state: &TerminationState<'_>) -> Result<Option<TerminationReason>, OperatorFailure> {
        if let Some(custom) = &self.custom {
            if custom.operator.should_terminate(state, &custom.params)? {
                return Ok(Some(TerminationReason::Custom(custom.name.clone())));
            }
        }

        if state.generation >= self.max_generations {
            return Ok(Some(TerminationReason::GenerationLimit));
        }

        let Some(policy) = &self.policy else {
            return Ok(None);
        };
        let reason = match *policy {
            TerminationPolicy::GenerationLimit => None,
            TerminationPolicy::FitnessThreshold { threshold, rule } => {
                let rule = rule.unwrap_or(state.rule);
                let reached = rule.best(state.fitness).is_some_and(|best| match rule {
                    MinMaxRule::Min => best <= threshold,
                    MinMaxRule::Max => best >= threshold,
                });
                reached.then_some(TerminationReason::FitnessThreshold)
            }
            TerminationPolicy::ConvergenceFitness { threshold, generations, rule } => {
                let rule = rule.unwrap_or(state.rule);
                let delta = state
                    .previous_fitness
                    .and_then(|prev| Some((rule.best(state.fitness)? - rule.best(prev)?).abs()));
                self.stagnation(delta, threshold, generations)
                    .then_some(TerminationReason::FitnessConvergence)
            }
            TerminationPolicy::ConvergencePopulation { threshold, generations } => {
                let delta = state
                    .previous_population
                    .and_then(|prev| frobenius_distance(state.population, prev));
                self.stagnation(delta, threshold, generations)
                    .then_some(TerminationReason::PopulationConvergence)
            }
            TerminationPolicy::TimeLimit(limit) => {
                (state.elapsed >= limit).then_some(TerminationReason::TimeLimit)
            }
        };
        Ok(reason)
    }

    /// Advances the stagnation counter. `delta` is `None` when there is no
    /// comparable previous snapshot, which counts as "not stagnant".
    fn stagnation(&mut self, delta: Option<f64>, threshold: f64, generations: usize) -> bool {
        match delta {
            Some(d) if d < threshold => {
                self.stagnation_count += 1;
                self.stagnation_count >= generations
            }
            _ => {
                self.stagnation_count = 0;
                false
            }
        }
    }
}

impl fmt::Debug for TerminationEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationEvaluator")
            .field("custom", &self.custom.as_ref().map(|c| c.name.as_str()))
            .field("policy", &self.policy)
            .field("max_generations", &self.max_generations)
            .field("stagnation_count", &self.stagnation_count)
            .field("terminated", &self.terminated)
            .finish()
    }
}

/// Frobenius norm of `a − b`; `None` when the shapes differ.
fn frobenius_distance(a: &[Individual], b: &[Individual]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b) {
        if x.len() != y.len() {
            return None;
        }
        sum += x.iter().zip(y).map(|(p, q)| (p - q) * (p - q)).sum::<f64>();
    }
    Some(sum.sqrt())
}
