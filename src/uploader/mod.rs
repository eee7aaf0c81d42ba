// Upload pipeline - slot negotiation, media transfer and publishing
//
// The orchestrator picks the photo path (place resolution, single or chunked
// upload, photo creation) or the video path (chunked upload, sequence
// creation, processing status polling).

pub mod orchestrator;
pub mod photo_publisher;
pub mod place_resolver;
pub mod progress_tracker;
pub mod publish_client;
pub mod retry;
pub mod sequence_publisher;
pub mod session;

pub use orchestrator::Orchestrator;
pub use session::UploadSessionManager;
