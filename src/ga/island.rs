//! Island topologies.
//!
//! Islands are independent [`GenerationEngine`]s connected in a ring
//! `i → (i + 1) mod N`. Two drivers are provided:
//!
//! - [`IslandRunner`]: lockstep. All islands step in parallel, the runner
//!   waits for every island (the barrier), then migrates every
//!   `migration_interval` generations.
//! - [`run_async`]: every island runs on its own thread without a barrier
//!   and exchanges migrants over channels.
//!
//! # References
//!
//! - Whitley, Rana & Heckendorn (1999), "The Island Model Genetic
//!   Algorithm: On Separability, Population Size and Convergence"

use super::engine::{GenerationEngine, LoopOutcome, StepOutcome};
use super::types::{Individual, Population};
use crate::error::{panic_message, EngineError};
use crate::random::create_rng;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, RngCore};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::debug;

/// Moves `count` individuals from every population to its ring successor.
///
/// Emigrants are drawn uniformly without replacement from each population
/// before any population is modified, removed from their source and
/// appended to the successor, so every population ends with its original
/// size. At least one native always stays behind. With fewer than two
/// populations this is a no-op.
pub fn migrate(populations: &mut [Population], count: usize, rng: &mut dyn RngCore) {
    let n = populations.len();
    if n < 2 || count == 0 {
        return;
    }
    let sizes: Vec<usize> = populations.iter().map(Vec::len).collect();

    let mut picks: Vec<Vec<usize>> = Vec::with_capacity(n);
    for population in populations.iter() {
        let k = count.min(population.len().saturating_sub(1));
        let mut chosen = index::sample(&mut *rng, population.len(), k).into_vec();
        chosen.sort_unstable();
        picks.push(chosen);
    }

    let mut emigrants: Vec<Vec<Individual>> = Vec::with_capacity(n);
    for (population, chosen) in populations.iter_mut().zip(&picks) {
        let mut leaving: Vec<Individual> = chosen.iter().rev().map(|&i| population.remove(i)).collect();
        leaving.reverse();
        emigrants.push(leaving);
    }

    for (source, group) in emigrants.into_iter().enumerate() {
        populations[(source + 1) % n].extend(group);
    }

    // Only differing source sizes can leave a population off its size.
    for (population, &size) in populations.iter_mut().zip(&sizes) {
        population.truncate(size);
        while population.len() < size {
            match population.last() {
                Some(last) => population.push(last.clone()),
                None => break,
            }
        }
    }
}

/// Lockstep driver for the island topology.
pub struct IslandRunner {
    engines: Vec<GenerationEngine>,
    migration_interval: usize,
    migration_count: usize,
    rng: StdRng,
    generation: usize,
}

impl IslandRunner {
    /// `seed` drives migration choices only; each engine has its own stream.
    pub fn new(
        engines: Vec<GenerationEngine>,
        migration_interval: usize,
        migration_count: usize,
        seed: u64,
    ) -> Self {
        Self {
            engines,
            migration_interval: migration_interval.max(1),
            migration_count,
            rng: create_rng(seed),
            generation: 0,
        }
    }

    /// Steps every island until one terminates, one fails or `stop` is
    /// raised.
    ///
    /// When several islands fail or terminate in the same generation, the
    /// lowest island index is reported. `stop` is checked after the barrier,
    /// before migration.
    pub fn run(&mut self, stop: &AtomicBool) -> LoopOutcome {
        loop {
            if let Some(outcome) = self.barrier() {
                return outcome;
            }
            if stop.load(Ordering::Relaxed) {
                return LoopOutcome::Stopped;
            }
            self.migrate_if_due();
        }
    }

    /// One lockstep generation: step all islands, then migrate if due.
    ///
    /// Returns the outcome once an island has failed or terminated.
    pub fn step(&mut self) -> Option<LoopOutcome> {
        let outcome = self.barrier();
        if outcome.is_none() {
            self.migrate_if_due();
        }
        outcome
    }

    fn barrier(&mut self) -> Option<LoopOutcome> {
        let results: Vec<_> = self.engines.par_iter_mut().map(GenerationEngine::step).collect();
        self.generation += 1;

        let mut terminated = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Err(error) => return Some(LoopOutcome::Failed { index, error }),
                Ok(StepOutcome::Terminated(reason)) if terminated.is_none() => {
                    terminated = Some(LoopOutcome::Terminated { index, reason });
                }
                Ok(_) => {}
            }
        }
        terminated
    }

    fn migrate_if_due(&mut self) {
        if self.engines.len() < 2 || self.generation % self.migration_interval != 0 {
            return;
        }
        let mut populations: Vec<Population> = self
            .engines
            .iter_mut()
            .map(|engine| std::mem::take(engine.population_mut()))
            .collect();
        migrate(&mut populations, self.migration_count, &mut self.rng);
        for (engine, population) in self.engines.iter_mut().zip(populations) {
            *engine.population_mut() = population;
        }
        debug!(
            generation = self.generation,
            islands = self.engines.len(),
            migrants = self.migration_count,
            "migration"
        );
    }

    pub fn engines(&self) -> &[GenerationEngine] {
        &self.engines
    }

    /// Lockstep generations completed.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn into_engines(self) -> Vec<GenerationEngine> {
        self.engines
    }
}

/// Runs every island on its own thread with asynchronous ring migration.
///
/// Every `migration_interval` generations an island sends copies of
/// `migration_count` random residents to its successor and absorbs whatever
/// has arrived in its own inbox, each immigrant replacing a random resident.
/// Island sizes therefore never change. The first island to terminate, fail
/// or panic, or the external `stop` flag, halts all islands at their next
/// generation boundary.
///
/// `seeds[i]` drives the migration choices of island `i`. Engines are
/// returned in their original order.
pub fn run_async(
    engines: Vec<GenerationEngine>,
    migration_interval: usize,
    migration_count: usize,
    seeds: &[u64],
    stop: &AtomicBool,
) -> (Vec<GenerationEngine>, LoopOutcome) {
    let n = engines.len();
    let interval = migration_interval.max(1);
    let halt = AtomicBool::new(false);
    let first_end: Mutex<Option<LoopOutcome>> = Mutex::new(None);

    let (senders, receivers): (Vec<Sender<Population>>, Vec<Receiver<Population>>) =
        (0..n).map(|_| channel::unbounded()).unzip();

    let finish = |outcome: LoopOutcome| {
        let mut slot = first_end.lock();
        if slot.is_none() {
            *slot = Some(outcome);
        }
        halt.store(true, Ordering::Relaxed);
    };

    let engines = thread::scope(|scope| {
        let handles: Vec<_> = engines
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(index, (mut engine, inbox))| {
                let outbox = senders[(index + 1) % n].clone();
                let seed = seeds.get(index).copied().unwrap_or(index as u64);
                let (halt, finish) = (&halt, &finish);
                scope.spawn(move || {
                    let mut rng = create_rng(seed);
                    let island = panic::catch_unwind(AssertUnwindSafe(|| loop {
                        if halt.load(Ordering::Relaxed) {
                            return None;
                        }
                        match engine.step() {
                            Err(error) => return Some(LoopOutcome::Failed { index, error }),
                            Ok(StepOutcome::Terminated(reason)) => {
                                return Some(LoopOutcome::Terminated { index, reason })
                            }
                            Ok(StepOutcome::Continue) => {}
                        }
                        if stop.load(Ordering::Relaxed) {
                            return Some(LoopOutcome::Stopped);
                        }
                        if n > 1 && engine.generation() % interval == 0 {
                            exchange(&mut engine, migration_count, &outbox, &inbox, &mut rng);
                        }
                    }));
                    match island {
                        Ok(Some(outcome)) => finish(outcome),
                        Ok(None) => {}
                        Err(payload) => {
                            let error = EngineError::Panicked {
                                generation: engine.generation() + 1,
                                message: panic_message(payload.as_ref()),
                            };
                            finish(LoopOutcome::Failed { index, error });
                        }
                    }
                    engine
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect::<Vec<_>>()
    });

    let outcome = first_end.into_inner().unwrap_or(LoopOutcome::Stopped);
    (engines, outcome)
}

fn exchange(
    engine: &mut GenerationEngine,
    count: usize,
    outbox: &Sender<Population>,
    inbox: &Receiver<Population>,
    rng: &mut StdRng,
) {
    let population = engine.population_mut();
    let size = population.len();
    let k = count.min(size.saturating_sub(1));
    if k > 0 {
        let migrants: Population = index::sample(&mut *rng, size, k)
            .into_iter()
            .map(|i| population[i].clone())
            .collect();
        // The successor may already have finished; its migrants are not needed.
        let _ = outbox.send(migrants);
    }

    let mut absorbed = 0;
    while let Ok(batch) = inbox.try_recv() {
        for immigrant in batch {
            if size == 0 {
                break;
            }
            let slot = rng.random_range(0..size);
            population[slot] = immigrant;
            absorbed += 1;
        }
    }
    if absorbed > 0 {
        debug!(generation = engine.generation(), absorbed, "immigrants absorbed");
    }
}
