use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hcle::{CoefficientStore, ScenarioChanges, Variable, simulate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_scenario(rng: &mut StdRng, inputs: usize) -> ScenarioChanges {
    Variable::ALL
        .into_iter()
        .take(inputs)
        .map(|v| (v, rng.gen_range(-1.0..1.0)))
        .collect()
}

fn benchmark_simulate(c: &mut Criterion) {
    let store = CoefficientStore::with_defaults();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    let mut group = c.benchmark_group("simulate");
    for inputs in [1_usize, 3, Variable::COUNT] {
        let scenario = random_scenario(&mut rng, inputs);
        group.throughput(Throughput::Elements(inputs as u64));

        group.bench_with_input(BenchmarkId::new("engine", inputs), &scenario, |b, changes| {
            b.iter(|| {
                let result = simulate(black_box(0.3492), black_box(changes), &store);
                black_box(result);
            });
        });

        group.bench_with_input(BenchmarkId::new("dense_dot", inputs), &scenario, |b, changes| {
            b.iter(|| {
                let delta = black_box(changes)
                    .to_dense()
                    .dot(&store.coefficients().as_view());
                black_box(delta);
            });
        });
    }
    group.finish();
}

criterion_group!(simulate_benches, benchmark_simulate);
criterion_main!(simulate_benches);
