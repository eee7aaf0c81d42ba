use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Idle,
    Active,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadProgress {
    pub total_bytes: u64,
    pub acknowledged_bytes: u64,
    pub segments_sent: u32,
    pub status: TransferStatus,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self {
            total_bytes: 0,
            acknowledged_bytes: 0,
            segments_sent: 0,
            status: TransferStatus::Idle,
        }
    }
}

impl UploadProgress {
    pub fn percent_complete(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.status == TransferStatus::Completed {
                100.0
            } else {
                0.0
            };
        }
        self.acknowledged_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Progress state type
pub type ProgressState = Arc<Mutex<UploadProgress>>;

pub fn new_progress_state() -> ProgressState {
    Arc::new(Mutex::new(UploadProgress::default()))
}

/// Safe progress state update
pub fn safe_progress_update<F>(progress_state: &ProgressState, operation: &str, f: F) -> bool
where
    F: FnOnce(&mut UploadProgress),
{
    match progress_state.lock() {
        Ok(mut progress) => {
            f(&mut progress);
            true
        }
        Err(e) => {
            log::error!(
                "Failed to acquire progress lock for {} (non-critical): {}",
                operation,
                e
            );
            false
        }
    }
}

pub fn safe_progress_read<F, R>(progress_state: &ProgressState, operation: &str, f: F) -> Option<R>
where
    F: FnOnce(&UploadProgress) -> R,
{
    match progress_state.lock() {
        Ok(progress) => Some(f(&progress)),
        Err(e) => {
            log::error!(
                "Failed to acquire progress lock for {} (non-critical): {}",
                operation,
                e
            );
            None
        }
    }
}

/// Reset the tracker for a new transfer of `total_bytes`.
pub fn start_transfer(progress_state: &ProgressState, total_bytes: u64) {
    safe_progress_update(progress_state, "start transfer", |progress| {
        *progress = UploadProgress {
            total_bytes,
            status: TransferStatus::Active,
            ..UploadProgress::default()
        };
    });
}

/// Record an acknowledged segment; `acknowledged_bytes` is cumulative.
pub fn update_progress_acknowledged(progress_state: &ProgressState, acknowledged_bytes: u64) {
    safe_progress_update(progress_state, "segment acknowledged", |progress| {
        progress.acknowledged_bytes = acknowledged_bytes;
        progress.segments_sent += 1;
        log::info!(
            "Done {:.2}% ({}/{} bytes, {} segments)",
            progress.percent_complete(),
            progress.acknowledged_bytes,
            progress.total_bytes,
            progress.segments_sent
        );
    });
}

pub fn mark_transfer_completed(progress_state: &ProgressState) {
    safe_progress_update(progress_state, "mark completed", |progress| {
        progress.status = TransferStatus::Completed;
        log::info!(
            "Transfer completed: {} bytes in {} segments",
            progress.total_bytes,
            progress.segments_sent
        );
    });
}

pub fn mark_transfer_failed(progress_state: &ProgressState) {
    safe_progress_update(progress_state, "mark failed", |progress| {
        progress.status = TransferStatus::Failed;
        log::error!(
            "Transfer failed after {}/{} bytes",
            progress.acknowledged_bytes,
            progress.total_bytes
        );
    });
}

pub fn mark_transfer_cancelled(progress_state: &ProgressState) {
    safe_progress_update(progress_state, "mark cancelled", |progress| {
        progress.status = TransferStatus::Cancelled;
        log::info!(
            "Transfer cancelled with {}/{} bytes acknowledged",
            progress.acknowledged_bytes,
            progress.total_bytes
        );
    });
}
