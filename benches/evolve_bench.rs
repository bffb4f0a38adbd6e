//! Criterion benchmarks for the GA engine.
//!
//! Uses the built-in Sphere and OneMax-style operators to measure engine
//! overhead per topology and the cost of one migration round.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use u_evolve::ga::{
    migrate, GaConfig, GaRunner, MinMaxRule, OperatorCategory, OperatorRegistry, OperatorResult,
    OperatorSpec, Population, RunHooks, Topology,
};
use u_evolve::random::create_rng;

// ===========================================================================
// Configurations
// ===========================================================================

fn sphere(dim: usize, pop: usize, gen: usize) -> GaConfig {
    GaConfig::default()
        .with_population_size(pop)
        .with_max_generations(gen)
        .with_min_max_rule(MinMaxRule::Min)
        .with_elitism_size(2)
        .with_seed(42)
        .with_operator(OperatorCategory::Fitness, OperatorSpec::new("sphere"))
        .with_operator(OperatorCategory::Selection, OperatorSpec::new("tournament"))
        .with_operator(OperatorCategory::Crossover, OperatorSpec::new("blx_alpha"))
        .with_operator(OperatorCategory::Mutation, OperatorSpec::new("gaussian"))
        .with_operator(
            OperatorCategory::InitializePopulation,
            OperatorSpec::new("uniform").with_param("chrom_length", dim),
        )
}

fn binary(n: usize) -> GaConfig {
    GaConfig::default()
        .with_population_size(100)
        .with_max_generations(50)
        .with_seed(42)
        .with_operator(OperatorCategory::Fitness, OperatorSpec::new("ones"))
        .with_operator(OperatorCategory::Selection, OperatorSpec::new("rank"))
        .with_operator(OperatorCategory::Crossover, OperatorSpec::new("two_point"))
        .with_operator(OperatorCategory::Mutation, OperatorSpec::new("bitwise"))
        .with_operator(
            OperatorCategory::InitializePopulation,
            OperatorSpec::new("random_binary").with_param("chrom_length", n),
        )
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_master_worker_sphere(c: &mut Criterion) {
    let mut group = c.benchmark_group("master_worker_sphere");
    group.sample_size(10);
    let registry = OperatorRegistry::with_builtins();

    for &(dim, pop, gen) in &[(10, 50, 100), (30, 100, 100)] {
        let config = sphere(dim, pop, gen);
        group.bench_with_input(
            BenchmarkId::new(format!("d{dim}_p{pop}_g{gen}"), dim),
            &config,
            |b, config| {
                b.iter(|| {
                    let report = GaRunner::run(black_box(config), &registry, RunHooks::default());
                    black_box(report)
                })
            },
        );
    }
    group.finish();
}

fn bench_island_topologies(c: &mut Criterion) {
    let mut group = c.benchmark_group("island_sphere");
    group.sample_size(10);
    let registry = OperatorRegistry::with_builtins();

    for topology in [Topology::IslandModel, Topology::AsynchronousModel] {
        let config = sphere(10, 40, 100)
            .with_num_workers(1)
            .with_algorithm(topology)
            .with_islands(4, 5, 0.1);
        group.bench_with_input(BenchmarkId::from_parameter(topology), &config, |b, config| {
            b.iter(|| {
                let report = GaRunner::run(black_box(config), &registry, RunHooks::default());
                black_box(report)
            })
        });
    }
    group.finish();
}

fn bench_binary_onemax(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_onemax");
    group.sample_size(10);
    let mut registry = OperatorRegistry::with_builtins();
    registry.register_fitness_fn("ones", |genes, _| -> OperatorResult<f64> { Ok(genes.iter().sum()) });

    for &n in &[20, 50, 100] {
        let config = binary(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &config, |b, config| {
            b.iter(|| {
                let report = GaRunner::run(black_box(config), &registry, RunHooks::default());
                black_box(report)
            })
        });
    }
    group.finish();
}

fn bench_migration(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_migration");

    for &islands in &[4, 16] {
        let populations: Vec<Population> = (0..islands)
            .map(|i| (0..100).map(|j| vec![i as f64, j as f64]).collect())
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(islands), &populations, |b, pops| {
            let mut rng = create_rng(42);
            b.iter(|| {
                let mut pops = pops.clone();
                migrate(&mut pops, 10, &mut rng);
                black_box(pops)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_master_worker_sphere,
    bench_island_topologies,
    bench_binary_onemax,
    bench_migration
);
criterion_main!(benches);
