//! End-to-end runs through the public API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use u_evolve::error::ConfigError;
use u_evolve::ga::{
    migrate, CollectingSink, GaConfig, GaRunner, GenerationEngine, GenerationRecord, MinMaxRule,
    NullSink, OperatorCategory, OperatorRegistry, OperatorSpec, Population, ProcessLog, RunHooks,
    RunState, RunStatus, StepOutcome, TerminationReason, Topology,
};
use u_evolve::random::create_rng;

fn real_valued(population_size: usize, max_generations: usize) -> GaConfig {
    GaConfig::default()
        .with_population_size(population_size)
        .with_max_generations(max_generations)
        .with_num_workers(2)
        .with_min_max_rule(MinMaxRule::Min)
        .with_seed(7)
        .with_operator(OperatorCategory::Fitness, OperatorSpec::new("sphere"))
        .with_operator(OperatorCategory::Selection, OperatorSpec::new("tournament"))
        .with_operator(OperatorCategory::Crossover, OperatorSpec::new("blx_alpha"))
        .with_operator(OperatorCategory::Mutation, OperatorSpec::new("gaussian"))
        .with_operator(
            OperatorCategory::InitializePopulation,
            OperatorSpec::new("uniform").with_param("chrom_length", 4),
        )
}

fn recorded_statuses() -> (Arc<Mutex<Vec<RunStatus>>>, RunHooks) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let writer = Arc::clone(&seen);
    let hooks = RunHooks::default().with_callback(move |state: &RunState| writer.lock().push(state.status));
    (seen, hooks)
}

/// Records without their timestamps.
fn comparable(records: &[GenerationRecord]) -> Vec<(usize, f64, Vec<f64>, f64, Vec<f64>, f64)> {
    records
        .iter()
        .map(|r| {
            (
                r.generation,
                r.min_fitness,
                r.min_individual.clone(),
                r.max_fitness,
                r.max_individual.clone(),
                r.avg_fitness,
            )
        })
        .collect()
}

#[test]
fn single_generation_without_variation_keeps_initial_population() {
    let config = real_valued(10, 1).with_mutation_rate(0.0).with_crossover_rate(0.0);
    let registry = OperatorRegistry::with_builtins();
    let operators = Arc::new(registry.resolve(&config).unwrap());
    let mut engine =
        GenerationEngine::new(&config, operators, ProcessLog::master(), 3, Arc::new(NullSink)).unwrap();
    let initial = engine.population().to_vec();

    assert_eq!(
        engine.step().unwrap(),
        StepOutcome::Terminated(TerminationReason::GenerationLimit)
    );
    assert_eq!(engine.population(), initial.as_slice());

    let (seen, hooks) = recorded_statuses();
    let report = GaRunner::run(&config, &registry, hooks).unwrap();
    assert_eq!(report.state.status, RunStatus::Finished);
    assert_eq!(report.generations, 1);
    assert_eq!(*seen.lock(), vec![RunStatus::Started, RunStatus::Finished]);
}

#[test]
fn ring_migration_moves_half_of_each_island() {
    let config = real_valued(4, 10)
        .with_algorithm(Topology::IslandModel)
        .with_islands(3, 1, 0.5);
    assert_eq!(config.migration_count(), 2);

    let mut islands: Vec<Population> = (0..3)
        .map(|i| (0..4).map(|j| vec![i as f64, j as f64]).collect())
        .collect();
    migrate(&mut islands, config.migration_count(), &mut create_rng(11));

    for (i, island) in islands.iter().enumerate() {
        let predecessor = ((i + 2) % 3) as f64;
        assert_eq!(island.len(), 4);
        assert_eq!(island.iter().filter(|ind| ind[0] == predecessor).count(), 2);
    }
}

#[test]
fn fitness_threshold_met_by_known_solution_terminates_immediately() {
    let config = real_valued(10, 100)
        .with_min_max_rule(MinMaxRule::Max)
        .with_operator(
            OperatorCategory::InitializePopulation,
            OperatorSpec::new("known_solutions")
                .with_param("chrom_length", 4)
                .with_param("known_solutions", "0 0 0 0"),
        )
        .with_operator(
            OperatorCategory::Termination,
            OperatorSpec::new("fitness_threshold")
                .with_param("fitness_threshold", 0.0)
                .with_param("min_max_rule", "min"),
        );

    let report = GaRunner::run(&config, &OperatorRegistry::with_builtins(), RunHooks::default()).unwrap();
    assert_eq!(report.state.status, RunStatus::Finished);
    assert_eq!(report.termination, Some(TerminationReason::FitnessThreshold));
    assert_eq!(report.generations, 1);
    assert_eq!(report.results.result.len(), 1);
}

#[test]
fn unknown_operator_fails_before_any_generation() {
    let sink = Arc::new(CollectingSink::new());
    let config = real_valued(10, 5).with_operator(OperatorCategory::Selection, OperatorSpec::new("lottery"));
    let (seen, hooks) = recorded_statuses();
    let err = GaRunner::run(&config, &OperatorRegistry::with_builtins(), hooks.with_sink(sink.clone()))
        .unwrap_err();

    assert_eq!(
        err,
        ConfigError::UnknownOperator {
            category: OperatorCategory::Selection,
            name: "lottery".to_string(),
        }
    );
    assert_eq!(*seen.lock(), vec![RunStatus::Error]);
    assert!(sink.is_empty());
}

#[test]
fn island_topology_without_island_parameters_is_rejected() {
    let config = real_valued(10, 5).with_algorithm(Topology::IslandModel);
    let err = GaRunner::run(&config, &OperatorRegistry::with_builtins(), RunHooks::default()).unwrap_err();
    assert_eq!(err, ConfigError::MissingIslandParameters(Topology::IslandModel));
}

#[test]
fn fixed_seed_reproduces_island_records() {
    let config = real_valued(12, 15)
        .with_algorithm(Topology::IslandModel)
        .with_islands(3, 4, 0.25);
    let run = || {
        GaRunner::run(&config, &OperatorRegistry::with_builtins(), RunHooks::default())
            .unwrap()
            .results
    };
    let (a, b) = (run(), run());

    assert_eq!(a.processes.len(), 3);
    for (key, records) in &a.processes {
        assert_eq!(comparable(records), comparable(&b.processes[key]));
    }
    assert_eq!(comparable(&a.result), comparable(&b.result));
}

#[test]
fn records_arrive_in_generation_order_per_process() {
    let sink = Arc::new(CollectingSink::new());
    let config = real_valued(8, 12)
        .with_algorithm(Topology::AsynchronousModel)
        .with_islands(3, 2, 0.25);
    let report = GaRunner::run(
        &config,
        &OperatorRegistry::with_builtins(),
        RunHooks::default().with_sink(sink.clone()),
    )
    .unwrap();
    assert_eq!(report.state.status, RunStatus::Finished);

    for i in 0..3 {
        let gens: Vec<usize> = sink
            .for_process(&format!("island_{i}"))
            .iter()
            .map(|r| r.generation)
            .collect();
        assert!(gens.windows(2).all(|w| w[1] == w[0] + 1), "island_{i}: {gens:?}");
    }
}

#[test]
fn external_stop_ends_a_long_run() {
    let stop = Arc::new(AtomicBool::new(false));
    let trigger = Arc::clone(&stop);
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        trigger.store(true, Ordering::Relaxed);
    });

    let config = real_valued(20, usize::MAX)
        .with_algorithm(Topology::IslandModel)
        .with_islands(2, 5, 0.1);
    let (seen, hooks) = recorded_statuses();
    let report = GaRunner::run(&config, &OperatorRegistry::with_builtins(), hooks.with_stop(stop)).unwrap();
    stopper.join().unwrap();

    assert_eq!(report.state.status, RunStatus::Stopped);
    assert!(report.termination.is_none());
    assert!(report.generations >= 1);
    assert_eq!(seen.lock().last(), Some(&RunStatus::Stopped));
}
