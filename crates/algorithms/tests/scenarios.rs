//! End-to-end scenarios: imagery in, classification out

use chrono::{Duration, TimeZone, Utc};
use geo::polygon;
use geowatch_algorithms::align::{align_pair, AlignmentParams};
use geowatch_algorithms::anomaly::AnomalyDetector;
use geowatch_algorithms::classify::Classifier;
use geowatch_algorithms::forecast::{ForecastParams, ForecastTarget, ModelRegistry};
use geowatch_algorithms::fusion::{fuse, fuse_signals, FusionParams};
use geowatch_algorithms::signals::{extract_all, SignalParams};
use geowatch_core::{
    Asset, AssetCategory, AssetId, Band, ChangeObservation, ChangeStatus, GeoTransform, GeoZone, ImageryObservation,
    InvalidReason, Raster, SignalKind, SignalMetrics, SignalResult, ThreatLevel,
};

const SIZE: usize = 20;
const CELL: f64 = 10.0;

fn depot() -> Asset {
    Asset::new(
        "mil-007",
        "Forward depot",
        AssetCategory::Military,
        polygon![
            (x: 0.0, y: 0.0),
            (x: 200.0, y: 0.0),
            (x: 200.0, y: 200.0),
            (x: 0.0, y: 200.0),
            (x: 0.0, y: 0.0),
        ],
        0.9,
    )
}

/// Vegetated field with a road along col 4; optionally a new building
fn scene(day: i64, construction: bool, cloud_cover: f64) -> ImageryObservation {
    let band = |field: f64, road: f64, building: f64| {
        let data: Vec<f64> = (0..SIZE * SIZE)
            .map(|i| {
                let (r, c) = (i / SIZE, i % SIZE);
                if construction && (7..13).contains(&r) && (9..15).contains(&c) {
                    building
                } else if c == 4 {
                    road
                } else {
                    field
                }
            })
            .collect();
        Raster::from_vec(data, SIZE, SIZE).unwrap()
    };

    ImageryObservation::new(
        "sentinel-2",
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::days(day),
        GeoTransform::new(0.0, SIZE as f64 * CELL, CELL, -CELL),
        cloud_cover,
    )
    .with_band(Band::Red, band(0.05, 0.35, 0.5))
    .unwrap()
    .with_band(Band::Nir, band(0.45, 0.4, 0.55))
    .unwrap()
}

#[test]
fn construction_is_detected_and_classified() {
    let asset = depot();
    let pair = align_pair(&asset, &scene(60, true, 0.05), &scene(0, false, 0.02), &AlignmentParams::default()).unwrap();
    assert_eq!((pair.rows, pair.cols), (SIZE, SIZE));

    let signals = extract_all(&pair, &SignalParams::default());
    for s in &signals {
        assert!(s.is_valid(), "{:?}", s);
        let (lo, hi) = s.kind.value_range();
        let v = s.value().unwrap();
        assert!(v >= lo && v <= hi && !v.is_nan());
    }

    let ndvi = signals.iter().find(|s| s.kind == SignalKind::Ndvi).unwrap();
    assert!(ndvi.value().unwrap() < 0.0, "vegetation loss expected");
    let structural = signals.iter().find(|s| s.kind == SignalKind::Structural).unwrap();
    assert!(structural.value().unwrap() > 0.0, "new edges expected");

    let observation = fuse(&asset, &pair, signals, &FusionParams::default());
    assert_eq!(observation.status, ChangeStatus::Scored);
    assert!(observation.change_score.unwrap() > 0.25);
    assert!(observation.observed_at > observation.baseline_at);

    let result = Classifier::default().classify(&observation, &asset, None, GeoZone::Interior);
    assert!(result.threat_level >= ThreatLevel::Medium, "got {}", result.threat_level);
}

#[test]
fn unchanged_scene_scores_zero() {
    let asset = depot();
    let pair = align_pair(&asset, &scene(0, false, 0.0), &scene(30, false, 0.0), &AlignmentParams::default()).unwrap();
    let observation = fuse(&asset, &pair, extract_all(&pair, &SignalParams::default()), &FusionParams::default());

    assert_eq!(observation.change_score, Some(0.0));
    let result = Classifier::default().classify(&observation, &asset, None, GeoZone::Interior);
    assert_eq!(result.threat_level, ThreatLevel::None);
}

#[test]
fn overcast_pair_is_insufficient() {
    let asset = depot();
    let pair = align_pair(&asset, &scene(0, false, 0.0), &scene(30, true, 0.9), &AlignmentParams::default()).unwrap();
    let observation = fuse(&asset, &pair, extract_all(&pair, &SignalParams::default()), &FusionParams::default());

    assert_eq!(observation.status, ChangeStatus::InsufficientData);
    assert_eq!(observation.change_score, None);
    assert_eq!(observation.confidence, 0.0);

    let result = Classifier::default().classify(&observation, &asset, None, GeoZone::Interior);
    assert_eq!(result.threat_level, ThreatLevel::None);
}

#[test]
fn military_scenario_two_valid_signals() {
    let signals = vec![
        SignalResult::valid(
            SignalKind::Ndvi,
            -0.4,
            0.4,
            SignalMetrics {
                before: 0.7,
                after: 0.3,
                changed_fraction: 0.35,
            },
        ),
        SignalResult::valid(
            SignalKind::Structural,
            0.3,
            0.6,
            SignalMetrics {
                before: 0.1,
                after: 0.4,
                changed_fraction: 0.15,
            },
        ),
        SignalResult::invalid(SignalKind::Texture, InvalidReason::TimedOut { after_ms: 200 }),
    ];

    let fused = fuse_signals(AssetCategory::Military, &signals, 0.05, &FusionParams::default());
    let score = fused.score.unwrap();
    assert!((0.5..=0.6).contains(&score), "score {}", score);
    assert!(fused.confidence < 1.0);

    let asset = depot();
    let t = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let observation = ChangeObservation::scored(
        asset.id.clone(),
        t - Duration::days(30),
        t,
        score,
        fused.confidence,
        signals,
        fused.dominant_signal,
        fused.disagreement,
    );
    let result = Classifier::default().classify(&observation, &asset, None, GeoZone::Interior);
    assert_eq!(result.threat_level, ThreatLevel::High);
}

#[test]
fn history_feeds_forecast_and_anomalies() {
    let asset_id = AssetId::new("mil-007");
    let t0 = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let history: Vec<ChangeObservation> = (0..12)
        .map(|k| {
            let t = t0 + Duration::days(30 * (k + 1));
            let score = 0.05 + 0.05 * k as f64;
            ChangeObservation::scored(asset_id.clone(), t - Duration::days(30), t, score, 0.8, Vec::new(), None, false)
        })
        .collect();

    let registry = ModelRegistry::new();
    let histories = vec![(asset_id.clone(), history.clone())];
    registry.train(ForecastTarget::Growth, &histories, &ForecastParams::default()).unwrap();
    let forecast = registry
        .forecast(ForecastTarget::Growth, &asset_id, &history, &ForecastParams::default())
        .unwrap();
    assert!((forecast.predicted - 0.65).abs() < 0.01);

    // A steady ramp is the asset's normal behaviour, not an anomaly
    assert!(AnomalyDetector::default().detect(&asset_id, &history).is_empty());
}
