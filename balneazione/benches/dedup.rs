//! Benchmarks pour la déduplication et la sérialisation des features

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geojson::{Geometry, Value as GeoValue};
use portale::RawFeature;

use balneazione::harvest::{deduplicate, to_feature_collection};

/// Features synthétiques : un tiers des codes apparaît deux fois
fn synthetic_features(count: usize) -> Vec<RawFeature> {
    (0..count)
        .map(|i| {
            let code = (i - i / 3) as i64;
            RawFeature {
                code,
                geometry: Geometry::new(GeoValue::Polygon(vec![vec![
                    vec![10.0, 43.0],
                    vec![10.0 + i as f64 * 1e-4, 43.0],
                    vec![10.0, 43.0 + i as f64 * 1e-4],
                    vec![10.0, 43.0],
                ]])),
                region: format!("{:03}", i % 18),
            }
        })
        .collect()
}

fn bench_deduplicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("deduplicate");

    for count in [1_000usize, 10_000, 50_000] {
        let features = synthetic_features(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &features, |b, input| {
            b.iter(|| black_box(deduplicate(black_box(input.clone()))))
        });
    }

    group.finish();
}

fn bench_feature_collection(c: &mut Criterion) {
    let features = deduplicate(synthetic_features(10_000));

    let mut group = c.benchmark_group("feature_collection");
    group.throughput(Throughput::Elements(features.len() as u64));
    group.sample_size(20);

    group.bench_function("to_json", |b| {
        b.iter(|| {
            let collection = to_feature_collection(black_box(&features));
            black_box(serde_json::to_vec(&collection).map(|v| v.len()).unwrap_or(0))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_deduplicate, bench_feature_collection);
criterion_main!(benches);
