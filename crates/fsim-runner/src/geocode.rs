//! Place-name lookup against a Nominatim search endpoint.

use fsim_geo::{Coordinate, GeoError, Geocoder};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One search hit. Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Geocoder backed by the OpenStreetMap Nominatim API.
pub struct NominatimGeocoder {
    url: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for NominatimGeocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NominatimGeocoder")
            .field("url", &self.url)
            .finish()
    }
}

impl NominatimGeocoder {
    /// Geocoder querying `url`. Nominatim rejects requests without an
    /// identifying User-Agent.
    pub fn new(url: impl Into<String>, timeout: Duration, user_agent: &str) -> fsim_geo::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| GeoError::Geocode(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

/// Take the first hit of a search response body.
fn parse_response(place: &str, body: &str) -> fsim_geo::Result<Coordinate> {
    let hits: Vec<SearchHit> =
        serde_json::from_str(body).map_err(|e| GeoError::Geocode(format!("bad response: {}", e)))?;
    let hit = hits
        .into_iter()
        .next()
        .ok_or_else(|| GeoError::PlaceNotFound(place.to_string()))?;

    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|_| GeoError::Geocode(format!("bad coordinate '{}'", v)))
    };
    let coord = Coordinate {
        lat: parse(&hit.lat)?,
        lon: parse(&hit.lon)?,
    };
    if let Some(name) = &hit.display_name {
        debug!("'{}' matched {}", place, name);
    }
    Ok(coord)
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, place: &str) -> fsim_geo::Result<Coordinate> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .map_err(|e| GeoError::Geocode(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GeoError::Geocode(format!("HTTP {}", response.status())));
        }
        let body = response
            .text()
            .map_err(|e| GeoError::Geocode(e.to_string()))?;
        parse_response(place, &body)
    }
}
