use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::transport::{HttpRequest, Transport};

/// Free-text place lookup returning `(lat, lon)` pairs, best match first.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, text: &str, api_key: &str) -> AppResult<Vec<(f64, f64)>>;
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
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

/// Google Places text search.
pub struct GoogleMapsGeocoder {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl GoogleMapsGeocoder {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, text: &str, api_key: &str) -> AppResult<String> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/maps/api/place/textsearch/json", self.base_url),
            &[("query", text), ("key", api_key)],
        )
        .map_err(|e| AppError::Config(format!("Invalid geocoding URL: {}", e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Geocoder for GoogleMapsGeocoder {
    async fn geocode(&self, text: &str, api_key: &str) -> AppResult<Vec<(f64, f64)>> {
        let request = HttpRequest::new(Method::GET, self.search_url(text, api_key)?);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AppError::place_resolution(e.to_string()))?;

        if !response.is_success() {
            return Err(AppError::place_resolution(format!(
                "geocoding service returned {}: {}",
                response.status,
                response.text()
            )));
        }

        let parsed: PlacesResponse = response
            .json()
            .map_err(|e| AppError::place_resolution(format!("malformed response: {}", e)))?;

        match parsed.status.as_str() {
            "OK" => Ok(parsed
                .results
                .into_iter()
                .map(|r| (r.geometry.location.lat, r.geometry.location.lng))
                .collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            other => Err(AppError::place_resolution(format!(
                "geocoding status {}: {}",
                other,
                parsed.error_message.unwrap_or_default()
            ))),
        }
    }
}
