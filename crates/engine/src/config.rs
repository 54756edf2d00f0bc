//! Engine configuration
//!
//! One TOML file, one section per pipeline stage. Every section and field
//! is optional; missing values take the built-in defaults. Category tables
//! (`[fusion.weights.<category>]`, `[classifier.bands.<category>]`) must
//! list every category when present.

use std::fs;
use std::path::Path;
use std::time::Duration;

use geowatch_algorithms::align::AlignmentParams;
use geowatch_algorithms::anomaly::AnomalyParams;
use geowatch_algorithms::classify::ClassifierParams;
use geowatch_algorithms::forecast::ForecastParams;
use geowatch_algorithms::fusion::FusionParams;
use geowatch_algorithms::signals::SignalParams;
use geowatch_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::strategy::ProcessingMode;

/// Batch execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Observations cloudier than this are dropped before pairing
    pub max_cloud_cover: f64,
    /// Deadline for the three extractors of one pair
    pub extractor_timeout_ms: u64,
    /// Worker threads: 0 for all cores, 1 for sequential
    pub threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_cloud_cover: 0.15,
            extractor_timeout_ms: 5_000,
            threads: 0,
        }
    }
}

impl BatchConfig {
    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_millis(self.extractor_timeout_ms)
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::from_threads(self.threads)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub alignment: AlignmentParams,
    pub signals: SignalParams,
    pub fusion: FusionParams,
    pub classifier: ClassifierParams,
    pub forecast: ForecastParams,
    pub anomaly: AnomalyParams,
    pub batch: BatchConfig,
}

impl EngineConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            Error::Toml(e) => Error::Config(format!("{}: {}", path.display(), e)),
            other => other,
        })
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, the format `load` reads
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("cannot render config: {e}")))
    }

    /// Reject values no stage can work with
    pub fn validate(&self) -> Result<()> {
        let a = &self.alignment;
        non_negative("alignment.buffer", a.buffer)?;
        if a.max_resolution_ratio.is_nan() || a.max_resolution_ratio < 1.0 {
            return Err(invalid("alignment.max_resolution_ratio", a.max_resolution_ratio, "must be >= 1"));
        }

        let s = &self.signals;
        fraction("signals.cloud_usability_threshold", s.cloud_usability_threshold)?;
        fraction("signals.min_valid_fraction", s.min_valid_fraction)?;
        non_negative("signals.pixel_threshold", s.pixel_threshold)?;
        non_negative("signals.edge_threshold", s.edge_threshold)?;
        positive("signals.ndvi_scale", s.ndvi_scale)?;
        positive("signals.structural_scale", s.structural_scale)?;
        positive("signals.texture_scale", s.texture_scale)?;
        if s.texture_levels < 2 {
            return Err(invalid("signals.texture_levels", s.texture_levels, "must be >= 2"));
        }
        if s.focal_radius == 0 {
            return Err(invalid("signals.focal_radius", s.focal_radius, "must be >= 1"));
        }

        let f = &self.fusion;
        for (category, w) in f.weights.iter() {
            let values = [w.ndvi, w.structural, w.texture];
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(Error::Config(format!(
                    "fusion.weights.{category}: weights must be finite and non-negative, got {values:?}"
                )));
            }
            if w.total() <= 0.0 {
                return Err(Error::Config(format!("fusion.weights.{category}: total weight must be positive")));
            }
        }
        non_negative("fusion.disagreement_threshold", f.disagreement_threshold)?;
        fraction("fusion.disagreement_penalty", f.disagreement_penalty)?;
        fraction("fusion.cloud_soft_threshold", f.cloud_soft_threshold)?;
        fraction("fusion.cloud_penalty", f.cloud_penalty)?;

        let c = &self.classifier;
        for (category, bands) in c.bands.iter() {
            bands
                .validate()
                .map_err(|e| Error::Config(format!("classifier.bands.{category}: {e}")))?;
        }
        for (name, m) in [
            ("border", c.zones.multipliers.border),
            ("strategic", c.zones.multipliers.strategic),
            ("urban", c.zones.multipliers.urban),
            ("interior", c.zones.multipliers.interior),
        ] {
            if !m.is_finite() || m <= 0.0 {
                return Err(Error::Config(format!("classifier.zones.multipliers.{name} must be positive, got {m}")));
            }
        }
        for site in &c.zones.sites {
            if !(-90.0..=90.0).contains(&site.lat) || !(-180.0..=180.0).contains(&site.lon) {
                return Err(Error::Config(format!(
                    "classifier.zones.sites `{}`: ({}, {}) is not a lat/lon position",
                    site.name, site.lat, site.lon
                )));
            }
            if !site.radius_km.is_finite() || site.radius_km <= 0.0 {
                return Err(Error::Config(format!(
                    "classifier.zones.sites `{}`: radius_km must be positive",
                    site.name
                )));
            }
        }
        non_negative("classifier.new_feature_radius_m", c.new_feature_radius_m)?;
        fraction("classifier.min_trust_confidence", c.min_trust_confidence)?;
        fraction("classifier.high_criticality", c.high_criticality)?;

        self.forecast.validate()?;

        let an = &self.anomaly;
        if an.min_baseline == 0 || an.window < an.min_baseline {
            return Err(Error::Config(format!(
                "anomaly.window ({}) must be >= anomaly.min_baseline ({}) >= 1",
                an.window, an.min_baseline
            )));
        }
        positive("anomaly.min_std", an.min_std)?;
        positive("anomaly.threshold", an.threshold)?;
        if an.readmit_after == 0 {
            return Err(invalid("anomaly.readmit_after", 0, "must be positive"));
        }

        let b = &self.batch;
        fraction("batch.max_cloud_cover", b.max_cloud_cover)?;
        if b.extractor_timeout_ms == 0 {
            return Err(invalid("batch.extractor_timeout_ms", 0, "must be positive"));
        }

        Ok(())
    }
}

fn invalid(name: &str, value: impl std::fmt::Display, reason: &str) -> Error {
    Error::Config(format!("{name} = {value}: {reason}"))
}

fn fraction(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, value, "must lie in [0, 1]"))
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "must be positive"))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "must be non-negative"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geowatch_algorithms::classify::Sensitivity;
    use geowatch_core::{AssetCategory, GeoZone};

    #[test]
    fn test_defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.batch.max_cloud_cover, 0.15);
        assert_eq!(config.forecast.window, 4);
        assert_eq!(config.classifier.sensitivity, Sensitivity::Medium);
    }

    #[test]
    fn test_defaults_render_and_reload() {
        let text = EngineConfig::default().to_toml().unwrap();
        assert!(text.contains("[fusion.weights.military]"));
        let reloaded = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(reloaded.to_toml().unwrap(), text);
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [batch]
            threads = 1
            max_cloud_cover = 0.3

            [classifier]
            sensitivity = "high"

            [[classifier.zones.sites]]
            name = "Northern crossing"
            lat = 48.5
            lon = 22.1
            radius_km = 25.0
            zone = "border"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch.processing_mode(), ProcessingMode::Sequential);
        assert_eq!(config.batch.max_cloud_cover, 0.3);
        assert_eq!(config.batch.extractor_timeout_ms, 5_000);
        assert_eq!(config.classifier.sensitivity, Sensitivity::High);
        assert_eq!(config.classifier.zones.sites.len(), 1);
        assert_eq!(config.classifier.zones.zone_at(48.5, 22.1), GeoZone::Border);
        assert_eq!(config.fusion.disagreement_threshold, 0.5);
    }

    #[test]
    fn test_incomplete_category_table_is_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [fusion.weights.military]
            ndvi = 0.2
            structural = 0.5
            texture = 0.3
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing"), "{}", err);
    }

    #[test]
    fn test_non_ascending_bands_are_rejected() {
        let mut config = EngineConfig::default();
        config.classifier.bands.get_mut(AssetCategory::Airport).medium = 0.1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("classifier.bands.airport"), "{}", err);
    }

    #[test]
    fn test_zero_weight_mass_is_rejected() {
        let mut config = EngineConfig::default();
        let w = config.fusion.weights.get_mut(AssetCategory::Bridge);
        w.ndvi = 0.0;
        w.structural = 0.0;
        w.texture = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_out_of_range_fraction_is_rejected() {
        let err = EngineConfig::from_toml_str("[batch]\nmax_cloud_cover = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("batch.max_cloud_cover"), "{}", err);
    }

    #[test]
    fn test_zero_readmit_is_rejected() {
        let err = EngineConfig::from_toml_str("[anomaly]\nreadmit_after = 0\n").unwrap_err();
        assert!(err.to_string().contains("anomaly.readmit_after"), "{}", err);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geowatch.toml");
        fs::write(&path, "[anomaly]\nthreshold = 2.5\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.anomaly.threshold, 2.5);
        assert_eq!(config.anomaly.window, 8);
    }
}
