use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use driftwatch::prelude::*;
use ndarray::Array2;
use rand::prelude::*;

fn feature_names(n_features: usize) -> Vec<String> {
    (0..n_features).map(|i| format!("feature_{}", i)).collect()
}

fn create_reference(n_rows: usize, n_features: usize) -> ReferenceDataset {
    let mut rng = rand::thread_rng();
    let data = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    ReferenceDataset::from_array(feature_names(n_features), data).unwrap()
}

fn create_monitor(n_rows: usize, n_features: usize, window: usize) -> DriftMonitor {
    let schema = FeatureSchema::new(feature_names(n_features)).unwrap();
    let config = MonitorConfig::default()
        .with_window_capacity(window)
        .with_min_samples(1);
    let monitor = DriftMonitor::with_reference(config, schema, create_reference(n_rows, n_features)).unwrap();

    let mut rng = rand::thread_rng();
    for _ in 0..window {
        let vector: FeatureVector = feature_names(n_features)
            .into_iter()
            .map(|name| (name, rng.gen::<f64>() * 10.0 + 1.0))
            .collect();
        monitor.observe(&vector).unwrap();
    }
    monitor
}

fn bench_wasserstein(c: &mut Criterion) {
    let mut group = c.benchmark_group("wasserstein");
    let mut rng = rand::thread_rng();

    for n in [1000, 10000, 100000].iter() {
        let mut reference: Vec<f64> = (0..*n).map(|_| rng.gen::<f64>()).collect();
        let mut current: Vec<f64> = (0..*n).map(|_| rng.gen::<f64>() + 0.1).collect();
        reference.sort_by(|a, b| a.total_cmp(b));
        current.sort_by(|a, b| a.total_cmp(b));

        group.bench_with_input(BenchmarkId::new("between_sorted", n), n, |b, _| {
            b.iter(|| WassersteinDistance::between_sorted(black_box(&reference), black_box(&current)))
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    group.sample_size(20);

    for n_features in [4, 16, 64].iter() {
        let monitor = create_monitor(10000, *n_features, 1000);
        group.bench_with_input(BenchmarkId::new("features", n_features), n_features, |b, _| {
            b.iter(|| monitor.evaluate().unwrap())
        });
    }

    group.finish();
}

fn bench_observe(c: &mut Criterion) {
    let monitor = create_monitor(1000, 16, 1000);
    let vector: FeatureVector = feature_names(16).into_iter().map(|name| (name, 1.0)).collect();

    c.bench_function("observe", |b| b.iter(|| monitor.observe(black_box(&vector)).unwrap()));
}

criterion_group!(benches, bench_wasserstein, bench_evaluate, bench_observe);
criterion_main!(benches);
