use std::sync::Arc;

use crate::credentials::CredentialProvider;
use crate::errors::{AppError, AppResult};
use crate::geocode::Geocoder;
use crate::models::{PlaceQuery, Pose};

pub struct PlaceResolver {
    geocoder: Arc<dyn Geocoder>,
    credentials: Arc<dyn CredentialProvider>,
}

impl PlaceResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            geocoder,
            credentials,
        }
    }

    /// Explicit poses pass through untouched; text queries take the best
    /// geocoding match.
    pub async fn resolve(&self, query: &PlaceQuery) -> AppResult<Pose> {
        let text = match query {
            PlaceQuery::Pose(pose) => return Ok(*pose),
            PlaceQuery::Text(text) => text,
        };

        let api_key = self.credentials.maps_api_key()?;
        let results = self.geocoder.geocode(text, &api_key).await?;

        let (lat, lon) = results
            .first()
            .copied()
            .ok_or_else(|| AppError::PlaceNotFound {
                query: text.clone(),
            })?;

        log::info!("Place '{}' resolved to ({}, {})", text, lat, lon);

        Pose::new(lat, lon).map_err(|_| {
            AppError::place_resolution(format!(
                "geocoder returned out-of-range coordinates ({}, {})",
                lat, lon
            ))
        })
    }
}
