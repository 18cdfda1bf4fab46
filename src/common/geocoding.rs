use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

/// Resolves a free-text city hint to a coordinate. An external collaborator
/// in the broader system; kept abstract behind a trait so the Route Mapping
/// and Provider Gateway stages can be tested without network access.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode_city(&self, city: &str, region: Option<&str>) -> anyhow::Result<Option<GeocodedLocation>>;
}

#[derive(Debug, Deserialize)]
struct NominatimEntry {
    lat: String,
    lon: String,
    display_name: String,
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
}

impl NominatimGeocoder {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("places-search-server/0.1")
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn geocode_city(&self, city: &str, region: Option<&str>) -> anyhow::Result<Option<GeocodedLocation>> {
        let mut query = city.to_string();
        if let Some(region) = region {
            query.push_str(", ");
            query.push_str(region);
        }

        let response = self
            .client
            .get("https://nominatim.openstreetmap.org/search")
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("geocoding upstream returned {}", response.status());
        }

        let entries: Vec<NominatimEntry> = response.json().await?;
        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(GeocodedLocation {
            latitude: entry.lat.parse()?,
            longitude: entry.lon.parse()?,
            display_name: entry.display_name,
        }))
    }
}

/// City-level coarsening for privacy: rounds to two decimal places (roughly
/// a 1km grid at the equator).
pub fn coarsen_coords(lat: f64, lng: f64) -> (f64, f64) {
    (round2(lat), round2(lng))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn calculate_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarsen_rounds_to_two_decimals() {
        assert_eq!(coarsen_coords(32.08512, 34.78174), (32.09, 34.78));
    }

    #[test]
    fn distance_between_identical_points_is_zero() {
        assert!(calculate_distance_km(32.0, 34.0, 32.0, 34.0) < 1e-9);
    }

    #[test]
    fn distance_tel_aviv_to_jerusalem_is_roughly_54km() {
        let d = calculate_distance_km(32.0853, 34.7818, 31.7683, 35.2137);
        assert!((50.0..60.0).contains(&d), "distance was {d}");
    }

    struct StaticGeocoder(Option<GeocodedLocation>);

    #[async_trait]
    impl Geocoder for StaticGeocoder {
        async fn geocode_city(&self, _city: &str, _region: Option<&str>) -> anyhow::Result<Option<GeocodedLocation>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn static_geocoder_returns_configured_location() {
        let g = StaticGeocoder(Some(GeocodedLocation {
            latitude: 1.0,
            longitude: 2.0,
            display_name: "Nowhere".into(),
        }));
        let loc = g.geocode_city("Nowhere", None).await.unwrap().unwrap();
        assert_eq!(loc.latitude, 1.0);
    }
}
