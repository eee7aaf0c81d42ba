use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Photo => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// A local media file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
}

impl MediaAsset {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind, size: u64) -> Self {
        Self {
            path: path.into(),
            kind,
            size,
        }
    }

    /// Build an asset from a file on disk, taking the size from its metadata.
    pub fn from_path(path: impl AsRef<Path>, kind: MediaKind) -> AppResult<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        if !metadata.is_file() {
            return Err(AppError::invalid_input("path", "Media path is not a regular file"));
        }
        if metadata.len() == 0 {
            return Err(AppError::invalid_input("path", "Media file is empty"));
        }

        Ok(Self::new(path, kind, metadata.len()))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// Geographic position attached to a published photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Pose {
    pub fn new(latitude: f64, longitude: f64) -> AppResult<Self> {
        let pose = Self {
            latitude,
            longitude,
            heading: None,
            altitude: None,
        };
        pose.validate()?;
        Ok(pose)
    }

    pub fn with_heading(mut self, heading: f64) -> AppResult<Self> {
        if !(0.0..360.0).contains(&heading) {
            return Err(AppError::invalid_input("heading", "Must be in [0, 360)"));
        }
        self.heading = Some(heading);
        Ok(self)
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AppError::invalid_input("latitude", "Must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AppError::invalid_input("longitude", "Must be between -180 and 180"));
        }
        Ok(())
    }
}

/// Where a photo should be placed: explicit coordinates or a free-text query.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceQuery {
    Pose(Pose),
    Text(String),
}

impl PlaceQuery {
    /// Combine the two optional pose sources, requiring exactly one.
    pub fn from_parts(pose: Option<Pose>, text: Option<String>) -> AppResult<Self> {
        let text = text.map(|t| t.trim().to_string());

        match (pose, text) {
            (Some(_), Some(_)) => Err(AppError::invalid_input(
                "place",
                "Provide either coordinates or a place query, not both",
            )),
            (None, None) => Err(AppError::invalid_input(
                "place",
                "A photo needs either coordinates or a place query",
            )),
            (None, Some(text)) if text.is_empty() => {
                Err(AppError::invalid_input("query", "Place query cannot be empty"))
            }
            (Some(pose), None) => {
                pose.validate()?;
                Ok(PlaceQuery::Pose(pose))
            }
            (None, Some(text)) => Ok(PlaceQuery::Text(text)),
        }
    }
}

/// Server-issued handle for a single upload slot.
///
/// Transfer and publish both take the reference by value, so a slot can
/// only ever be consumed once.
#[derive(Debug, PartialEq, Eq)]
pub struct UploadReference {
    upload_url: String,
    finalized: bool,
}

impl UploadReference {
    pub(crate) fn new(upload_url: String) -> Self {
        Self {
            upload_url,
            finalized: false,
        }
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn finalize(mut self) -> Self {
        self.finalized = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedPhoto {
    pub photo_id: String,
    pub pose: Pose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingState {
    Pending,
    Processing,
    Processed,
    Failed,
    #[serde(other)]
    Unspecified,
}

impl ProcessingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingState::Processed | ProcessingState::Failed)
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingState::Pending => "PENDING",
            ProcessingState::Processing => "PROCESSING",
            ProcessingState::Processed => "PROCESSED",
            ProcessingState::Failed => "FAILED",
            ProcessingState::Unspecified => "PROCESSING_STATE_UNSPECIFIED",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoSequence {
    pub sequence_id: String,
    pub state: ProcessingState,
    pub failure_reason: Option<String>,
}

/// Result of one orchestrated run.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Photo(PublishedPhoto),
    Sequence(PhotoSequence),
}

impl PublishOutcome {
    pub fn resource_id(&self) -> &str {
        match self {
            PublishOutcome::Photo(photo) => &photo.photo_id,
            PublishOutcome::Sequence(sequence) => &sequence.sequence_id,
        }
    }
}
