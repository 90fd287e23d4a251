use cardiorisk::config::ForestConfig;
use cardiorisk::forest::RandomForest;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array1, Array2};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const N_FEATURES: usize = 13;

/// Standardized-looking features with a label driven by the first two columns.
fn random_design(rows: usize) -> (Array2<f64>, Array1<u8>) {
    let mut rng = StdRng::seed_from_u64(0x5EED_F64 + rows as u64);
    let x = Array2::from_shape_fn((rows, N_FEATURES), |_| {
        rng.sample::<f64, _>(Standard) * 2.0 - 1.0
    });
    let y = x
        .rows()
        .into_iter()
        .map(|row| u8::from(row[0] + 0.5 * row[1] > 0.0))
        .collect();
    (x, y)
}

fn benchmark_forest(c: &mut Criterion) {
    let config = ForestConfig::default();
    let sizes = [300_usize, 900];
    let designs: Vec<_> = sizes
        .iter()
        .map(|&rows| (rows, random_design(rows)))
        .collect();

    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10);
    for (rows, (x, y)) in designs.iter() {
        group.throughput(Throughput::Elements(*rows as u64));

        group.bench_with_input(BenchmarkId::new("fit", rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let forest = RandomForest::fit(black_box(x.view()), y.view(), &config)
                    .expect("fit forest");
                black_box(forest);
            });
        });

        let forest = RandomForest::fit(x.view(), y.view(), &config).expect("fit forest");
        group.bench_with_input(BenchmarkId::new("predict_proba", rows), x, |b, input| {
            b.iter(|| {
                let p = forest.predict_proba(black_box(input.view())).expect("predict");
                black_box(p);
            });
        });
    }
    group.finish();
}

criterion_group!(forest_benchmark, benchmark_forest);
criterion_main!(forest_benchmark);
