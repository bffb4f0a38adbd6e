//! One population and its generational loop.
//!
//! A [`GenerationEngine`] owns a population, its RNG stream, its worker pool
//! and its termination state. The run controller (or an island runner)
//! drives it by calling [`GenerationEngine::step`] until it terminates.
//!
//! # Step
//!
//! 1. Evaluate the population through the worker pool.
//! 2. Record a [`GenerationRecord`] and forward it to the progress sink.
//! 3. Consult the termination evaluator; a terminated step leaves the
//!    population untouched.
//! 4. Breed the next population: elites first, then pairs of distinct
//!    parents crossed over with probability `crossover_rate` and mutated
//!    (per child) with probability `mutation_rate`. A surplus last child is
//!    dropped.
//! 5. Let the adaptation operator retune the rates for the next generation.

use super::config::GaConfig;
use super::operators::{OperatorContext, OperatorResult, TunableParams};
use super::params::OperatorParams;
use super::pool::WorkerPool;
use super::progress::{GenerationRecord, ProcessLog, ProgressSink};
use super::registry::ResolvedOperators;
use super::termination::{TerminationEvaluator, TerminationReason, TerminationState};
use super::types::{Individual, MinMaxRule, OperatorCategory, Population};
use crate::error::{panic_message, EngineError, OperatorFailure};
use crate::random::create_rng;
use rand::rngs::StdRng;
use rand::Rng;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Re-selections attempted when both parents come out identical.
const MAX_RESELECT: usize = 10;

/// Outcome of one [`GenerationEngine::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A new population was bred; call `step` again.
    Continue,
    /// The population terminated; further steps are not allowed.
    Terminated(TerminationReason),
}

/// How a topology loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// Population `index` terminated the run.
    Terminated {
        index: usize,
        reason: TerminationReason,
    },
    /// The external stop flag was raised.
    Stopped,
    /// Population `index` failed.
    Failed { index: usize, error: EngineError },
}

/// Steps a single engine until it terminates, fails or `stop` is raised.
///
/// `stop` is checked after each generation.
pub fn run_single(engine: &mut GenerationEngine, stop: &AtomicBool) -> LoopOutcome {
    loop {
        match engine.step() {
            Err(error) => return LoopOutcome::Failed { index: 0, error },
            Ok(StepOutcome::Terminated(reason)) => return LoopOutcome::Terminated { index: 0, reason },
            Ok(StepOutcome::Continue) => {}
        }
        if stop.load(Ordering::Relaxed) {
            return LoopOutcome::Stopped;
        }
    }
}

/// Generational loop of a single population.
pub struct GenerationEngine {
    operators: Arc<ResolvedOperators>,
    pool: WorkerPool,
    rng: StdRng,
    sink: Arc<dyn ProgressSink>,
    population_size: usize,
    max_generations: usize,
    rule: MinMaxRule,
    tunable: TunableParams,
    population: Population,
    previous: Option<(Population, Vec<f64>)>,
    generation: usize,
    termination: TerminationEvaluator,
    log: ProcessLog,
}

impl GenerationEngine {
    /// Builds the worker pool and the initial population.
    ///
    /// `seed` seeds this engine's RNG stream; callers derive it from the run
    /// seed so that every island gets an independent stream.
    pub fn new(
        config: &GaConfig,
        operators: Arc<ResolvedOperators>,
        log: ProcessLog,
        seed: u64,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, EngineError> {
        let pool = WorkerPool::new(config.num_workers)
            .map_err(|source| EngineError::WorkerPool { generation: 0, source })?
            .with_timeout(config.fitness_timeout_ms.map(Duration::from_millis));
        let tunable = TunableParams {
            mutation_rate: config.mutation_rate,
            crossover_rate: config.crossover_rate,
            elitism_size: config.elitism_size,
        };
        let termination = operators.termination_evaluator(config.max_generations);

        let mut engine = Self {
            operators,
            pool,
            rng: create_rng(seed),
            sink,
            population_size: config.population_size,
            max_generations: config.max_generations,
            rule: config.min_max_rule,
            tunable,
            population: Vec::new(),
            previous: None,
            generation: 0,
            termination,
            log,
        };
        engine.population = engine.initial_population()?;
        Ok(engine)
    }

    fn initial_population(&mut self) -> Result<Population, EngineError> {
        let init = &self.operators.initialization;
        let ctx = self.context(0, &init.params);
        let fail = |message: String| {
            EngineError::operator(OperatorCategory::InitializePopulation, 0, OperatorFailure::new(message))
        };

        let population = guarded(OperatorCategory::InitializePopulation, 0, || {
            init.operator.initialize(self.population_size, &ctx, &mut self.rng)
        })?;

        if population.len() != self.population_size {
            return Err(fail(format!(
                "created {} individuals, expected {}",
                population.len(),
                self.population_size
            )));
        }
        let len = population.first().map_or(0, Vec::len);
        if len == 0 || population.iter().any(|ind| ind.len() != len) {
            return Err(fail("individuals must be non-empty and of equal length".to_string()));
        }
        Ok(population)
    }

    /// Runs one generation.
    ///
    /// # Errors
    ///
    /// Any operator or worker pool failure; the engine must not be stepped
    /// again afterwards. A panicking operator is reported as a failure of its
    /// category, any other panic (a progress sink, say) as
    /// [`EngineError::Panicked`].
    pub fn step(&mut self) -> Result<StepOutcome, EngineError> {
        let generation = self.generation + 1;
        match panic::catch_unwind(AssertUnwindSafe(|| self.advance())) {
            Ok(result) => result,
            Err(payload) => Err(EngineError::Panicked {
                generation,
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    fn advance(&mut self) -> Result<StepOutcome, EngineError> {
        if let Some(reason) = self.termination.reason() {
            return Ok(StepOutcome::Terminated(reason.clone()));
        }
        let generation = self.generation + 1;

        let fitness_op = &self.operators.fitness;
        let fitness = self
            .pool
            .evaluate(&self.population, fitness_op.operator.as_ref(), &fitness_op.params)
            .map_err(|source| EngineError::WorkerPool { generation, source })?;

        if let Some(record) = GenerationRecord::from_population(generation, &self.population, &fitness) {
            debug!(
                process = self.log.key(),
                generation,
                min = record.min_fitness,
                max = record.max_fitness,
                avg = record.avg_fitness,
                "generation evaluated"
            );
            self.sink.record(self.log.key(), &record);
            self.log.push(record);
        }

        let state = TerminationState {
            generation,
            max_generations: self.max_generations,
            rule: self.rule,
            population: &self.population,
            fitness: &fitness,
            previous_population: self.previous.as_ref().map(|(p, _)| p.as_slice()),
            previous_fitness: self.previous.as_ref().map(|(_, f)| f.as_slice()),
            elapsed: self.termination.elapsed(),
        };
        let termination = &mut self.termination;
        let decision = guarded(OperatorCategory::Termination, generation, || termination.check(&state))?;
        if let Some(reason) = decision {
            self.generation = generation;
            debug!(process = self.log.key(), generation, %reason, "population terminated");
            return Ok(StepOutcome::Terminated(reason));
        }

        let offspring = self.breed(generation, &fitness)?;
        let parents = std::mem::replace(&mut self.population, offspring);
        self.previous = Some((parents, fitness));

        self.adapt(generation)?;
        self.generation = generation;
        Ok(StepOutcome::Continue)
    }

    fn breed(&mut self, generation: usize, fitness: &[f64]) -> Result<Population, EngineError> {
        let n = self.population_size;
        let elites = self.tunable.elitism_size.min(n - 1);
        let mutation_rate = self.tunable.mutation_rate;
        let crossover_rate = self.tunable.crossover_rate;
        let ops = Arc::clone(&self.operators);

        let mut next: Population = Vec::with_capacity(n + 1);
        for &i in self.rule.rank_indices(fitness).iter().take(elites) {
            next.push(self.population[i].clone());
        }

        let select_ctx = self.context(generation, &ops.selection.params);
        let crossover_ctx = self.context(generation, &ops.crossover.params);
        let mutation_ctx = self.context(generation, &ops.mutation.params);

        while next.len() < n {
            let (p1, p2) = self.select_parents(generation, fitness, &select_ctx)?;
            let (parent1, parent2) = (&self.population[p1], &self.population[p2]);

            let (child1, child2) = if chance(&mut self.rng, crossover_rate) {
                let rng = &mut self.rng;
                let children = guarded(OperatorCategory::Crossover, generation, || {
                    ops.crossover.operator.crossover(parent1, parent2, &crossover_ctx, rng)
                })?;
                if children.0.len() != parent1.len() || children.1.len() != parent2.len() {
                    return Err(EngineError::operator(
                        OperatorCategory::Crossover,
                        generation,
                        OperatorFailure::new("crossover changed the chromosome length"),
                    ));
                }
                children
            } else {
                (parent1.clone(), parent2.clone())
            };

            for child in [child1, child2] {
                if !chance(&mut self.rng, mutation_rate) {
                    next.push(child);
                    continue;
                }
                let rng = &mut self.rng;
                let mutated = guarded(OperatorCategory::Mutation, generation, || {
                    ops.mutation.operator.mutate(&child, &mutation_ctx, rng)
                })?;
                if mutated.len() != child.len() {
                    return Err(EngineError::operator(
                        OperatorCategory::Mutation,
                        generation,
                        OperatorFailure::new("mutation changed the chromosome length"),
                    ));
                }
                next.push(mutated);
            }
        }

        next.truncate(n);
        Ok(next)
    }

    /// Selects two parents with different indices.
    ///
    /// Re-selects up to [`MAX_RESELECT`] times on a repeated index, then
    /// falls back to the next index.
    fn select_parents(
        &mut self,
        generation: usize,
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
    ) -> Result<(usize, usize), EngineError> {
        let first = self.select_one(generation, fitness, ctx)?;
        let mut second = self.select_one(generation, fitness, ctx)?;
        let mut retries = 0;
        while second == first && retries < MAX_RESELECT {
            second = self.select_one(generation, fitness, ctx)?;
            retries += 1;
        }
        if second == first {
            second = (first + 1) % self.population.len();
        }
        Ok((first, second))
    }

    fn select_one(
        &mut self,
        generation: usize,
        fitness: &[f64],
        ctx: &OperatorContext<'_>,
    ) -> Result<usize, EngineError> {
        let n = self.population.len();
        let (operators, population, rng) = (&self.operators, &self.population, &mut self.rng);
        let index = guarded(OperatorCategory::Selection, generation, || {
            operators.selection.operator.select(population, fitness, ctx, rng)
        })?;
        if index >= n {
            return Err(EngineError::operator(
                OperatorCategory::Selection,
                generation,
                OperatorFailure::new(format!("selected index {index} is outside a population of {n}")),
            ));
        }
        Ok(index)
    }

    fn adapt(&mut self, generation: usize) -> Result<(), EngineError> {
        let Some(adaptation) = self.operators.adaptation.clone() else {
            return Ok(());
        };
        let ctx = self.context(generation, &adaptation.params);
        let tunable = &mut self.tunable;
        guarded(OperatorCategory::Adaptation, generation, || adaptation.operator.adapt(tunable, &ctx))?;
        debug!(
            process = self.log.key(),
            generation,
            mutation_rate = self.tunable.mutation_rate,
            crossover_rate = self.tunable.crossover_rate,
            elitism_size = self.tunable.elitism_size,
            "parameters adapted"
        );
        Ok(())
    }

    fn context<'a>(&self, generation: usize, params: &'a OperatorParams) -> OperatorContext<'a> {
        OperatorContext {
            generation,
            max_generations: self.max_generations,
            rule: self.rule,
            mutation_rate: self.tunable.mutation_rate,
            crossover_rate: self.tunable.crossover_rate,
            elitism_size: self.tunable.elitism_size,
            previous_best: self
                .previous
                .as_ref()
                .and_then(|(_, f)| self.rule.best(f)),
            params,
        }
    }

    /// Current population.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Mutable access for migration between generations.
    pub(crate) fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    /// Last generation that was evaluated (0 before the first step).
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn termination_reason(&self) -> Option<&TerminationReason> {
        self.termination.reason()
    }

    /// Current (possibly adapted) rates.
    pub fn tunable(&self) -> TunableParams {
        self.tunable
    }

    /// Best fitness and individual of the last evaluated generation.
    pub fn best(&self) -> Option<(f64, &Individual)> {
        self.log.last().map(|record| record.best(self.rule))
    }

    pub fn log(&self) -> &ProcessLog {
        &self.log
    }

    pub fn into_log(self) -> ProcessLog {
        self.log
    }
}

impl std::fmt::Debug for GenerationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationEngine")
            .field("process", &self.log.key())
            .field("generation", &self.generation)
            .field("population_size", &self.population_size)
            .field("tunable", &self.tunable)
            .field("termination", &self.termination)
            .finish_non_exhaustive()
    }
}

/// Calls an operator, turning both its failure and its panic into an
/// [`EngineError`] tagged with `category` and `generation`.
fn guarded<T>(
    category: OperatorCategory,
    generation: usize,
    call: impl FnOnce() -> OperatorResult<T>,
) -> Result<T, EngineError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(|e| EngineError::operator(category, generation, e)),
        Err(payload) => Err(EngineError::operator_panic(category, generation, payload.as_ref())),
    }
}

/// Bernoulli trial that tolerates rates outside `[0, 1]` (and NaN, which
/// never fires).
fn chance(rng: &mut StdRng, p: f64) -> bool {
    if p >= 1.0 {
        true
    } else if p > 0.0 {
        rng.random_bool(p)
    } else {
        false
    }
}
