use crate::services::traits::{Geocoder, ResolvedAddress};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Address resolution via the Google Maps Geocoding API.
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GoogleGeocoder {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, api_key })
    }
}

fn first_hit(response: GeocodeResponse) -> Result<Option<ResolvedAddress>> {
    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(None),
        other => bail!("Geocoding request rejected with status {}", other),
    }
    let Some(hit) = response.results.into_iter().next() else {
        return Ok(None);
    };
    Ok(Some(ResolvedAddress {
        lat: hit.geometry.location.lat,
        lng: hit.geometry.location.lng,
        formatted: hit.formatted_address,
    }))
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn resolve(&self, address: &str) -> Result<Option<ResolvedAddress>> {
        debug!("Geocoding address: {}", address);

        let response = self
            .client
            .get(GEOCODE_URL)
            .query(&[("address", address), ("key", &self.api_key)])
            .send()
            .await
            .context("Failed to call geocoding service")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Geocoding call failed with status {}: {}", status, body);
        }

        let parsed: GeocodeResponse = response
            .json()
            .await
            .context("Invalid geocoding response body")?;
        first_hit(parsed)
    }
}
