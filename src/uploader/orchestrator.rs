use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ProcessingConfig};
use crate::credentials::CredentialProvider;
use crate::errors::{AppError, AppResult};
use crate::geocode::{Geocoder, GoogleMapsGeocoder};
use crate::models::{MediaAsset, MediaKind, PlaceQuery, PublishOutcome};
use crate::transport::{ReqwestTransport, Transport};

use super::photo_publisher::PhotoPublisher;
use super::place_resolver::PlaceResolver;
use super::progress_tracker::ProgressState;
use super::publish_client::PublishClient;
use super::sequence_publisher::SequencePublisher;
use super::session::UploadSessionManager;

/// Wires one upload run: photo or video path, first failure wins.
pub struct Orchestrator {
    resolver: PlaceResolver,
    sessions: UploadSessionManager,
    photos: PhotoPublisher,
    sequences: SequencePublisher,
    processing: ProcessingConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        geocoder: Arc<dyn Geocoder>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let client = PublishClient::new(transport, credentials.clone(), config);

        Self {
            resolver: PlaceResolver::new(geocoder, credentials),
            sessions: UploadSessionManager::new(
                client.clone(),
                config.upload.clone(),
                cancel.clone(),
            ),
            photos: PhotoPublisher::new(client.clone()),
            sequences: SequencePublisher::new(client, cancel.clone()),
            processing: config.processing.clone(),
            cancel,
        }
    }

    /// Production wiring over reqwest and Google Maps.
    pub fn from_config(
        config: &Config,
        credentials: Arc<dyn CredentialProvider>,
    ) -> AppResult<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let geocoder = Arc::new(GoogleMapsGeocoder::new(
            transport.clone(),
            &config.geocode_api_url,
        ));
        Ok(Self::new(config, transport, geocoder, credentials))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> ProgressState {
        self.sessions.progress()
    }

    pub async fn run(
        &self,
        asset: MediaAsset,
        place: Option<PlaceQuery>,
    ) -> AppResult<PublishOutcome> {
        validate_request(&asset, place.as_ref())?;

        log::info!(
            "Publishing {} {} ({} bytes)",
            asset.kind,
            asset.file_name(),
            asset.size
        );

        match (asset.kind, place) {
            (MediaKind::Photo, Some(place)) => self.publish_photo(asset, place).await,
            (MediaKind::Video, None) => self.publish_video(asset).await,
            // Unreachable after validation.
            _ => Err(AppError::invalid_input("place", "Invalid media/place combination")),
        }
    }

    async fn publish_photo(
        &self,
        asset: MediaAsset,
        place: PlaceQuery,
    ) -> AppResult<PublishOutcome> {
        // Resolution and slot negotiation are independent; both must succeed
        // before the photo can be created.
        let (pose, reference) = tokio::try_join!(
            self.resolver.resolve(&place),
            self.sessions.open_session(&asset)
        )?;

        let reference = self.sessions.transfer(reference, &asset).await?;
        let photo = self.photos.publish(reference, pose).await?;
        Ok(PublishOutcome::Photo(photo))
    }

    async fn publish_video(&self, asset: MediaAsset) -> AppResult<PublishOutcome> {
        let reference = self.sessions.open_session(&asset).await?;
        let reference = self.sessions.transfer(reference, &asset).await?;
        let sequence = self.sequences.publish(reference).await?;

        log::info!(
            "Waiting for sequence {} to finish processing (timeout {:?})",
            sequence.sequence_id,
            self.processing.timeout()
        );
        let sequence = self
            .sequences
            .await_processing(
                sequence,
                self.processing.timeout(),
                self.processing.poll_interval(),
            )
            .await?;
        Ok(PublishOutcome::Sequence(sequence))
    }
}

/// A photo needs exactly one place source; a video must not carry one.
pub fn validate_request(asset: &MediaAsset, place: Option<&PlaceQuery>) -> AppResult<()> {
    match (asset.kind, place) {
        (MediaKind::Photo, None) => Err(AppError::invalid_input(
            "place",
            "A photo needs either coordinates or a place query",
        )),
        (MediaKind::Video, Some(_)) => Err(AppError::invalid_input(
            "place",
            "A video cannot carry a place query",
        )),
        (_, Some(PlaceQuery::Pose(pose))) => pose.validate(),
        _ => Ok(()),
    }
}
