use reqwest::Method;
use serde::Deserialize;
use std::cmp::min;
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::UploadConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{MediaAsset, MediaKind, UploadReference};
use crate::transport::{HttpRequest, HttpResponse};

use super::progress_tracker::*;
use super::publish_client::PublishClient;
use super::retry::{should_retry_status, RetryPolicy};

const TRANSFER_STAGE: &str = "media transfer";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartUploadResponse {
    upload_url: String,
}

/// Negotiates upload slots and streams media bytes into them.
pub struct UploadSessionManager {
    client: PublishClient,
    config: UploadConfig,
    retry: RetryPolicy,
    cancel: CancellationToken,
    progress: ProgressState,
}

impl UploadSessionManager {
    pub fn new(client: PublishClient, config: UploadConfig, cancel: CancellationToken) -> Self {
        let retry = RetryPolicy::from(&config);
        Self {
            client,
            config,
            retry,
            cancel,
            progress: new_progress_state(),
        }
    }

    pub fn progress(&self) -> ProgressState {
        self.progress.clone()
    }

    /// Request a fresh upload slot for the asset's kind.
    pub async fn open_session(&self, asset: &MediaAsset) -> AppResult<UploadReference> {
        let path = match asset.kind {
            MediaKind::Photo => "/v1/photo:startUpload",
            MediaKind::Video => "/v1/photoSequence:startUpload",
        };

        let response = self
            .client
            .post_json(path, &serde_json::json!({}))
            .await?;

        if !response.is_success() {
            return Err(AppError::SessionOpen {
                status: response.status,
                body: response.text(),
            });
        }

        let started: StartUploadResponse = response.json()?;
        log::info!(
            "Opened {} upload session for {}",
            asset.kind,
            asset.file_name()
        );
        Ok(UploadReference::new(started.upload_url))
    }

    /// Whether the asset goes up through the chunked resumable protocol.
    pub fn uses_resumable(&self, asset: &MediaAsset) -> bool {
        asset.kind == MediaKind::Video || asset.size > self.config.single_request_threshold_bytes
    }

    /// Send the asset's bytes into the slot, returning the finalized reference.
    pub async fn transfer(
        &self,
        reference: UploadReference,
        asset: &MediaAsset,
    ) -> AppResult<UploadReference> {
        if reference.is_finalized() {
            return Err(AppError::invalid_input(
                "upload_reference",
                "Upload reference has already been finalized",
            ));
        }
        if self.cancel.is_cancelled() {
            mark_transfer_cancelled(&self.progress);
            return Err(AppError::cancelled(TRANSFER_STAGE));
        }

        start_transfer(&self.progress, asset.size);

        let result = if self.uses_resumable(asset) {
            self.transfer_resumable(&reference, asset).await
        } else {
            self.transfer_single(&reference, asset).await
        };

        match result {
            Ok(()) => {
                mark_transfer_completed(&self.progress);
                Ok(reference.finalize())
            }
            Err(e @ AppError::Cancelled { .. }) => {
                mark_transfer_cancelled(&self.progress);
                Err(e)
            }
            Err(e) => {
                mark_transfer_failed(&self.progress);
                Err(e)
            }
        }
    }

    async fn transfer_single(
        &self,
        reference: &UploadReference,
        asset: &MediaAsset,
    ) -> AppResult<()> {
        let data = tokio::fs::read(&asset.path).await?;
        if data.len() as u64 != asset.size {
            log::warn!(
                "{} changed size since selection ({} -> {} bytes)",
                asset.file_name(),
                asset.size,
                data.len()
            );
        }

        let length = data.len();
        self.send_with_retry(0, || {
            HttpRequest::new(Method::POST, reference.upload_url())
                .header("Content-Type", asset.kind.content_type())
                .header("X-Goog-Upload-Protocol", "raw")
                .header("X-Goog-Upload-Content-Length", length.to_string())
                .body(data.clone())
        })
        .await?;

        update_progress_acknowledged(&self.progress, length as u64);
        log::info!("Upload successful: {}", asset.file_name());
        Ok(())
    }

    async fn start_resumable(
        &self,
        reference: &UploadReference,
        asset: &MediaAsset,
    ) -> AppResult<String> {
        let response = self
            .send_with_retry(0, || {
                HttpRequest::new(Method::POST, reference.upload_url())
                    .header("X-Goog-Upload-Protocol", "resumable")
                    .header("X-Goog-Upload-Header-Content-Length", asset.size.to_string())
                    .header("X-Goog-Upload-Header-Content-Type", asset.kind.content_type())
                    .header("X-Goog-Upload-Command", "start")
            })
            .await?;

        response
            .header("x-goog-upload-url")
            .map(str::to_string)
            .ok_or_else(|| AppError::Api {
                operation: TRANSFER_STAGE,
                status: response.status,
                body: "resumable start response carried no X-Goog-Upload-URL".to_string(),
            })
    }

    async fn transfer_resumable(
        &self,
        reference: &UploadReference,
        asset: &MediaAsset,
    ) -> AppResult<()> {
        let session_url = self.start_resumable(reference, asset).await?;
        let chunk_size = self.config.chunk_size_bytes.max(1);
        let total = asset.size;

        let mut file = tokio::fs::File::open(&asset.path).await?;
        let mut offset = 0u64;

        // Segments go strictly in offset order; the next one is only read
        // once the server has acknowledged the previous.
        loop {
            if self.cancel.is_cancelled() {
                return Err(AppError::cancelled(TRANSFER_STAGE));
            }

            let length = min(chunk_size, total - offset);
            let end = offset + length;
            let is_last = end == total;
            let command = if is_last { "upload, finalize" } else { "upload" };

            file.seek(SeekFrom::Start(offset)).await?;
            let mut data = vec![0u8; length as usize];
            file.read_exact(&mut data).await?;

            let response = self
                .send_with_retry(offset, || {
                    HttpRequest::new(Method::POST, session_url.as_str())
                        .header("X-Goog-Upload-Command", command)
                        .header("X-Goog-Upload-Offset", offset.to_string())
                        .body(data.clone())
                })
                .await?;

            let acknowledged = acknowledged_offset(&response).unwrap_or(end);
            let valid = if is_last {
                acknowledged == total
            } else {
                acknowledged > offset && acknowledged <= end
            };
            if !valid {
                return Err(AppError::TransferRejected {
                    offset,
                    status: response.status,
                    body: format!(
                        "server acknowledged offset {} for segment {}..{}",
                        acknowledged, offset, end
                    ),
                });
            }

            update_progress_acknowledged(&self.progress, acknowledged);

            if is_last {
                break;
            }
            offset = acknowledged;
        }

        log::info!("Done uploading {} ({} bytes)", asset.file_name(), total);
        Ok(())
    }

    /// Send one segment, retrying transient failures with backoff.
    async fn send_with_retry<F>(&self, offset: u64, build: F) -> AppResult<HttpResponse>
    where
        F: Fn() -> HttpRequest,
    {
        let mut attempt = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(AppError::cancelled(TRANSFER_STAGE));
            }
            attempt += 1;

            let (reason, failed_response) = match self.client.send(build()).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) if should_retry_status(response.status) => {
                    (format!("status {}: {}", response.status, response.text()), Some(response))
                }
                Ok(response) => {
                    return Err(AppError::TransferRejected {
                        offset,
                        status: response.status,
                        body: response.text(),
                    })
                }
                Err(e) if e.is_retryable() => (e.to_string(), None),
                Err(e) => return Err(e),
            };

            if attempt >= self.retry.max_attempts {
                return Err(AppError::TransferFailed {
                    offset,
                    attempts: attempt,
                    reason,
                });
            }

            let delay = self.retry.delay_for(attempt, failed_response.as_ref());
            log::warn!(
                "Segment at offset {} failed (attempt {}/{}), retrying in {:?}: {}",
                offset,
                attempt,
                self.retry.max_attempts,
                delay,
                reason
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(AppError::cancelled(TRANSFER_STAGE)),
                _ = sleep(delay) => {}
            }
        }
    }
}

fn acknowledged_offset(response: &HttpResponse) -> Option<u64> {
    response
        .header("x-goog-upload-size-received")
        .and_then(|value| value.trim().parse().ok())
}
