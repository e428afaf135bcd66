//! Criterion benchmarks for balanced-forest: ensemble training and prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use balanced_forest::{BalancedForestConfig, BalancedRandomForestClassifier};

/// Imbalanced 3-class dataset: counts scale 1 / 5 / 44 of `n_samples` / 50.
fn make_imbalanced(n_samples: usize, n_features: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let unit = n_samples / 50;
    let counts = [unit, 5 * unit, n_samples - 6 * unit];

    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for (class, &count) in counts.iter().enumerate() {
        for _ in 0..count {
            let row: Vec<f64> = (0..n_features)
                .map(|f| {
                    let base = if f < 2 { class as f64 * 4.0 } else { 0.0 };
                    base + rng.r#gen::<f64>() * 0.5
                })
                .collect();
            features.push(row);
            labels.push(class);
        }
    }
    (features, labels)
}

fn bench_brf_fit(c: &mut Criterion) {
    let (features, labels) = make_imbalanced(1000, 10, 42);
    let config = BalancedForestConfig::new(50).unwrap().with_seed(42);

    c.bench_function("brf_fit_1000x10_3class_50trees", |b| {
        b.iter(|| {
            let mut clf = BalancedRandomForestClassifier::new(config.clone());
            clf.fit(&features, &labels, None).unwrap();
        });
    });
}

fn bench_brf_predict_batch(c: &mut Criterion) {
    let (features, labels) = make_imbalanced(1000, 10, 42);
    let config = BalancedForestConfig::new(50).unwrap().with_seed(42);
    let mut clf = BalancedRandomForestClassifier::new(config);
    clf.fit(&features, &labels, None).unwrap();

    c.bench_function("brf_predict_batch_1000x10_50trees", |b| {
        b.iter(|| clf.predict_batch(&features).unwrap());
    });
}

fn bench_brf_oob_fit(c: &mut Criterion) {
    let (features, labels) = make_imbalanced(1000, 10, 42);
    let config = BalancedForestConfig::new(50)
        .unwrap()
        .with_oob_score(true)
        .with_seed(42);

    c.bench_function("brf_fit_oob_1000x10_50trees", |b| {
        b.iter(|| {
            let mut clf = BalancedRandomForestClassifier::new(config.clone());
            clf.fit(&features, &labels, None).unwrap();
        });
    });
}

criterion_group!(benches, bench_brf_fit, bench_brf_predict_batch, bench_brf_oob_fit);
criterion_main!(benches);
