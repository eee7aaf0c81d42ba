use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::models::{Pose, PublishedPhoto, UploadReference};

use super::publish_client::PublishClient;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadReferenceBody {
    pub upload_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatLngPair {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePose {
    lat_lng_pair: LatLngPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    altitude: Option<f64>,
}

impl From<&Pose> for WirePose {
    fn from(pose: &Pose) -> Self {
        Self {
            lat_lng_pair: LatLngPair {
                latitude: pose.latitude,
                longitude: pose.longitude,
            },
            heading: pose.heading,
            altitude: pose.altitude,
        }
    }
}

impl From<WirePose> for Pose {
    fn from(wire: WirePose) -> Self {
        Pose {
            latitude: wire.lat_lng_pair.latitude,
            longitude: wire.lat_lng_pair.longitude,
            heading: wire.heading,
            altitude: wire.altitude,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePhotoRequest {
    upload_reference: UploadReferenceBody,
    pose: WirePose,
}

#[derive(Debug, Deserialize)]
struct PhotoId {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePhotoResponse {
    photo_id: PhotoId,
    pose: Option<WirePose>,
}

pub struct PhotoPublisher {
    client: PublishClient,
}

impl PhotoPublisher {
    pub fn new(client: PublishClient) -> Self {
        Self { client }
    }

    /// Create the photo resource for a finalized upload. Not retried: the
    /// slot is single-use.
    pub async fn publish(&self, reference: UploadReference, pose: Pose) -> AppResult<PublishedPhoto> {
        if !reference.is_finalized() {
            return Err(AppError::invalid_input(
                "upload_reference",
                "Upload must be finalized before publishing",
            ));
        }
        pose.validate()?;

        let request = CreatePhotoRequest {
            upload_reference: UploadReferenceBody {
                upload_url: reference.upload_url().to_string(),
            },
            pose: WirePose::from(&pose),
        };

        let response = self.client.post_json("/v1/photo", &request).await?;

        if (400..500).contains(&response.status) {
            return Err(AppError::PublishRejected {
                status: response.status,
                body: response.text(),
            });
        }
        if !response.is_success() {
            return Err(AppError::Api {
                operation: "publish",
                status: response.status,
                body: response.text(),
            });
        }

        let created: CreatePhotoResponse = response.json()?;
        let stored_pose = created.pose.map(Pose::from).unwrap_or(pose);

        log::info!(
            "Photo created successfully: {} at ({}, {})",
            created.photo_id.id,
            stored_pose.latitude,
            stored_pose.longitude
        );

        Ok(PublishedPhoto {
            photo_id: created.photo_id.id,
            pose: stored_pose,
        })
    }
}
