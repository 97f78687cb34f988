use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use rand::prelude::*;
use serplens::data::{
    Dataset, CLICKS_COLUMN, CTR_COLUMN, IMPRESSIONS_COLUMN, POSITION_COLUMN, QUERY_COLUMN,
};
use serplens::quadrant;
use serplens::training::{train, ModelKind};

fn synthetic_dataset(n_rows: usize) -> Dataset {
    let mut rng = rand::thread_rng();

    let queries: Vec<String> = (0..n_rows).map(|i| format!("query {}", i)).collect();
    let ctr: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 0.3).collect();
    let position: Vec<f64> = (0..n_rows).map(|_| 1.0 + rng.gen::<f64>() * 49.0).collect();
    let impressions: Vec<f64> = (0..n_rows)
        .map(|_| (100.0 + rng.gen::<f64>() * 9900.0).round())
        .collect();

    // Clicks follow ctr * impressions with a little noise
    let clicks: Vec<f64> = (0..n_rows)
        .map(|i| (ctr[i] * impressions[i] + rng.gen::<f64>() * 5.0).round())
        .collect();

    let df = DataFrame::new(vec![
        Column::new(QUERY_COLUMN.into(), queries),
        Column::new(CTR_COLUMN.into(), ctr),
        Column::new(POSITION_COLUMN.into(), position),
        Column::new(IMPRESSIONS_COLUMN.into(), impressions),
        Column::new(CLICKS_COLUMN.into(), clicks),
    ])
    .unwrap();

    Dataset::new(df).unwrap()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    // Full fits are slow, keep the sample count down
    group.sample_size(10);

    for n_rows in [250, 1000, 5000] {
        let dataset = synthetic_dataset(n_rows);

        group.bench_with_input(
            BenchmarkId::new("linear_regression", n_rows),
            &dataset,
            |b, dataset| {
                b.iter(|| train(black_box(dataset), ModelKind::LinearRegression).unwrap())
            },
        );

        group.bench_with_input(
            BenchmarkId::new("random_forest", n_rows),
            &dataset,
            |b, dataset| b.iter(|| train(black_box(dataset), ModelKind::RandomForest).unwrap()),
        );
    }

    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");

    // Train once on a mid-sized export
    let train_set = synthetic_dataset(5000);
    let (model, _) = train(&train_set, ModelKind::RandomForest).unwrap();

    for n_rows in [100, 1000, 10_000] {
        let dataset = synthetic_dataset(n_rows);
        let features = dataset.feature_matrix().unwrap();

        group.bench_with_input(
            BenchmarkId::new("predict", n_rows),
            &features,
            |b, features| b.iter(|| model.predict(black_box(features)).unwrap()),
        );
    }

    group.finish();
}

fn bench_quadrants(c: &mut Criterion) {
    let mut group = c.benchmark_group("quadrants");

    for n_rows in [1000, 10_000] {
        let dataset = synthetic_dataset(n_rows);

        group.bench_with_input(
            BenchmarkId::new("classify", n_rows),
            &dataset,
            |b, dataset| b.iter(|| quadrant::classify(black_box(dataset)).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_scoring, bench_quadrants);
criterion_main!(benches);
