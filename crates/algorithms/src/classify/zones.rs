//! Geographic zones from proximity to reference sites

use geowatch_core::{Asset, GeoZone};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A named location whose surroundings form a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSite {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
    pub zone: GeoZone,
}

/// Band multiplier per zone; values below 1 lower the bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneMultipliers {
    pub border: f64,
    pub strategic: f64,
    pub urban: f64,
    pub interior: f64,
}

impl Default for ZoneMultipliers {
    fn default() -> Self {
        Self {
            border: 0.8,
            strategic: 0.9,
            urban: 1.0,
            interior: 1.0,
        }
    }
}

impl ZoneMultipliers {
    pub fn get(&self, zone: GeoZone) -> f64 {
        match zone {
            GeoZone::Border => self.border,
            GeoZone::Strategic => self.strategic,
            GeoZone::Urban => self.urban,
            GeoZone::Interior => self.interior,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneParams {
    pub multipliers: ZoneMultipliers,
    pub sites: Vec<ReferenceSite>,
}

impl ZoneParams {
    /// Zone of a point given as (lat, lon) degrees.
    ///
    /// When several sites cover the point the most sensitive zone wins
    /// (border, then strategic, then urban). Uncovered points are interior.
    pub fn zone_at(&self, lat: f64, lon: f64) -> GeoZone {
        self.sites
            .iter()
            .filter(|s| haversine_km(lat, lon, s.lat, s.lon) <= s.radius_km)
            .map(|s| s.zone)
            .min_by_key(|z| precedence(*z))
            .unwrap_or(GeoZone::Interior)
    }

    /// Zone of an asset's footprint centroid (x = lon, y = lat)
    pub fn zone_of(&self, asset: &Asset) -> GeoZone {
        asset
            .centroid()
            .map(|(lon, lat)| self.zone_at(lat, lon))
            .unwrap_or(GeoZone::Interior)
    }
}

fn precedence(zone: GeoZone) -> u8 {
    match zone {
        GeoZone::Border => 0,
        GeoZone::Strategic => 1,
        GeoZone::Urban => 2,
        GeoZone::Interior => 3,
    }
}

/// Great-circle distance in kilometers
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn site(name: &str, lat: f64, lon: f64, radius_km: f64, zone: GeoZone) -> ReferenceSite {
        ReferenceSite {
            name: name.into(),
            lat,
            lon,
            radius_km,
            zone,
        }
    }

    #[test]
    fn test_haversine() {
        // One degree of latitude
        assert_relative_eq!(haversine_km(0.0, 0.0, 1.0, 0.0), 111.195, epsilon = 1e-2);
        assert_eq!(haversine_km(28.6, 77.2, 28.6, 77.2), 0.0);
    }

    #[test]
    fn test_zone_precedence() {
        let params = ZoneParams {
            sites: vec![
                site("Delhi", 28.61, 77.21, 50.0, GeoZone::Urban),
                site("Wagah", 31.60, 74.57, 100.0, GeoZone::Border),
                site("Amritsar", 31.63, 74.87, 40.0, GeoZone::Urban),
            ],
            ..Default::default()
        };

        assert_eq!(params.zone_at(28.65, 77.25), GeoZone::Urban);
        assert_eq!(params.zone_at(31.62, 74.85), GeoZone::Border);
        assert_eq!(params.zone_at(20.0, 80.0), GeoZone::Interior);
        assert_eq!(params.multipliers.get(GeoZone::Border), 0.8);
    }
}
