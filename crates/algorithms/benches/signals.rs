//! Benchmarks for the change signal extractors

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geowatch_algorithms::align::{AlignedPair, AlignedView};
use geowatch_algorithms::signals::{SignalExtractor, SignalParams};
use geowatch_core::{Band, GeoTransform, Raster};

fn create_band(size: usize, base: f64, shift: usize) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    for row in 0..size {
        for col in 0..size {
            let v = base + ((row * 7 + (col + shift) * 13) % 200) as f64 / 1000.0;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn create_pair(size: usize) -> AlignedPair {
    let before = AlignedView::new("bench", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 0.0)
        .with_band(Band::Red, create_band(size, 0.1, 0))
        .with_band(Band::Nir, create_band(size, 0.4, 0));
    let after = AlignedView::new("bench", Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), 0.0)
        .with_band(Band::Red, create_band(size, 0.15, 3))
        .with_band(Band::Nir, create_band(size, 0.3, 3));
    AlignedPair::from_views(before, after, GeoTransform::new(0.0, size as f64, 1.0, -1.0), size, size)
}

fn bench_extractors(c: &mut Criterion) {
    let params = SignalParams::default();
    for extractor in SignalExtractor::ALL {
        let mut group = c.benchmark_group(format!("signals/{}", extractor.kind()));
        for size in [64, 256, 512] {
            let pair = create_pair(size);
            group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
                b.iter(|| extractor.extract(black_box(&pair), black_box(&params)))
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_extractors);
criterion_main!(benches);
