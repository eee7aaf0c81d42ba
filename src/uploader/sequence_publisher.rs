use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::errors::{AppError, AppResult};
use crate::models::{PhotoSequence, ProcessingState, UploadReference};
use crate::transport::HttpResponse;

use super::photo_publisher::UploadReferenceBody;
use super::publish_client::PublishClient;

const PROCESSING_STAGE: &str = "sequence processing";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSequenceRequest {
    upload_reference: UploadReferenceBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SequenceBody {
    id: Option<String>,
    processing_state: Option<ProcessingState>,
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

/// Long-running operation wrapper the API returns for sequences.
#[derive(Debug, Deserialize)]
struct SequenceOperation {
    name: String,
    response: Option<SequenceBody>,
    error: Option<OperationError>,
}

impl SequenceOperation {
    fn into_sequence(self) -> PhotoSequence {
        let body = self.response.unwrap_or_default();
        let sequence_id = body.id.unwrap_or(self.name);

        if let Some(error) = self.error {
            return PhotoSequence {
                sequence_id,
                state: ProcessingState::Failed,
                failure_reason: Some(error.message),
            };
        }

        let state = match body.processing_state {
            Some(ProcessingState::Unspecified) | None => ProcessingState::Pending,
            Some(state) => state,
        };
        let failure_reason = match state {
            ProcessingState::Failed => body.failure_reason,
            _ => None,
        };

        PhotoSequence {
            sequence_id,
            state,
            failure_reason,
        }
    }
}

pub struct SequencePublisher {
    client: PublishClient,
    cancel: CancellationToken,
}

impl SequencePublisher {
    pub fn new(client: PublishClient, cancel: CancellationToken) -> Self {
        Self { client, cancel }
    }

    /// Create a photo sequence from a finalized video upload.
    pub async fn publish(&self, reference: UploadReference) -> AppResult<PhotoSequence> {
        if !reference.is_finalized() {
            return Err(AppError::invalid_input(
                "upload_reference",
                "Upload must be finalized before publishing",
            ));
        }

        let request = CreateSequenceRequest {
            upload_reference: UploadReferenceBody {
                upload_url: reference.upload_url().to_string(),
            },
        };
        let response = self
            .client
            .post_json("/v1/photoSequence?inputType=VIDEO", &request)
            .await?;

        if (400..500).contains(&response.status) {
            return Err(AppError::PublishRejected {
                status: response.status,
                body: response.text(),
            });
        }
        let sequence = parse_operation(response, "publish")?;
        log::info!(
            "Photo sequence created: {} ({})",
            sequence.sequence_id,
            sequence.state
        );
        Ok(sequence)
    }

    /// Fetch the current processing state once.
    pub async fn poll_status(&self, sequence_id: &str) -> AppResult<PhotoSequence> {
        let response = self
            .client
            .get(&format!("/v1/photoSequence/{}", sequence_id))
            .await?;
        parse_operation(response, "get sequence status")
    }

    /// Poll until the sequence reaches a terminal state.
    ///
    /// The first poll is immediate. `PROCESSED` returns the sequence, `FAILED`
    /// becomes `ProcessingFailed`, and running out of time becomes
    /// `ProcessingTimeout`. Cancellation ends the wait at once.
    pub async fn await_processing(
        &self,
        sequence: PhotoSequence,
        timeout: Duration,
        poll_interval: Duration,
    ) -> AppResult<PhotoSequence> {
        if sequence.state.is_terminal() {
            return terminal_outcome(sequence);
        }

        let started = Instant::now();
        // An unrepresentable deadline means waiting without a time limit.
        let deadline = started.checked_add(timeout);
        let mut last_state = sequence.state;
        let mut polls = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(AppError::cancelled(PROCESSING_STAGE));
            }

            let current = self.poll_status(&sequence.sequence_id).await?;
            polls += 1;

            if current.state != last_state {
                log::info!(
                    "Sequence {} is now {} (poll {})",
                    current.sequence_id,
                    current.state,
                    polls
                );
                last_state = current.state;
            }

            if current.state.is_terminal() {
                return terminal_outcome(current);
            }

            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(AppError::ProcessingTimeout {
                        sequence_id: sequence.sequence_id,
                        last_state: last_state.to_string(),
                        elapsed: now - started,
                    });
                }
                Some(deadline) => poll_interval.min(deadline - now),
                None => poll_interval,
            };
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(AppError::cancelled(PROCESSING_STAGE)),
                _ = sleep(wait) => {}
            }
        }
    }
}

fn parse_operation(response: HttpResponse, operation: &'static str) -> AppResult<PhotoSequence> {
    if !response.is_success() {
        return Err(AppError::Api {
            operation,
            status: response.status,
            body: response.text(),
        });
    }
    let parsed: SequenceOperation = response.json()?;
    Ok(parsed.into_sequence())
}

fn terminal_outcome(sequence: PhotoSequence) -> AppResult<PhotoSequence> {
    match sequence.state {
        ProcessingState::Failed => Err(AppError::ProcessingFailed {
            reason: sequence
                .failure_reason
                .unwrap_or_else(|| "no reason given".to_string()),
            sequence_id: sequence.sequence_id,
        }),
        _ => Ok(sequence),
    }
}
