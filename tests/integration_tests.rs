use mockito::Matcher;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

use streetview_uploader::{
    config::{Config, ProcessingConfig, UploadConfig},
    credentials::StaticCredentials,
    errors::AppError,
    models::{MediaAsset, MediaKind, PlaceQuery, Pose, ProcessingState, PublishOutcome},
    uploader::Orchestrator,
};

/// End-to-end runs of the upload pipeline over real HTTP against a mock
/// publish API and geocoding service.

fn test_config(server: &mockito::Server) -> Config {
    let mut config = Config::default();
    config.publish_api_url = server.url();
    config.geocode_api_url = server.url();
    config.request_timeout_secs = 10;
    config.upload = UploadConfig {
        chunk_size_bytes: 1024,
        single_request_threshold_bytes: 4096,
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 10,
        exponential_base: 2.0,
    };
    config.processing = ProcessingConfig {
        poll_interval_secs: 1,
        timeout_secs: 10,
    };
    config
}

fn orchestrator(server: &mockito::Server) -> Orchestrator {
    let credentials = Arc::new(StaticCredentials::new("test-token", "maps-key"));
    Orchestrator::from_config(&test_config(server), credentials).unwrap()
}

fn media_file(size: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let bytes: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
    file.write_all(&bytes).unwrap();
    file
}

async fn mock_photo_upload(server: &mut mockito::Server) -> (mockito::Mock, mockito::Mock) {
    let start = server
        .mock("POST", "/v1/photo:startUpload")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_body(json!({ "uploadUrl": format!("{}/upload/photo-slot", server.url()) }).to_string())
        .expect(1)
        .create_async()
        .await;
    let upload = server
        .mock("POST", "/upload/photo-slot")
        .match_header("x-goog-upload-protocol", "raw")
        .match_header("x-goog-upload-content-length", "512")
        .match_header("content-type", "image/jpeg")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    (start, upload)
}

#[tokio::test]
async fn test_photo_with_explicit_coordinates() {
    let mut server = mockito::Server::new_async().await;
    let (start, upload) = mock_photo_upload(&mut server).await;
    let geocode = server
        .mock("GET", "/maps/api/place/textsearch/json")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/v1/photo")
        .match_body(Matcher::PartialJson(json!({
            "uploadReference": { "uploadUrl": format!("{}/upload/photo-slot", server.url()) },
            "pose": { "latLngPair": { "latitude": 37.4, "longitude": -122.1 } }
        })))
        .with_status(200)
        .with_body(r#"{"photoId": {"id": "CAoSLEFGMVFpcE4"}}"#)
        .expect(1)
        .create_async()
        .await;

    let file = media_file(512);
    let asset = MediaAsset::from_path(file.path(), MediaKind::Photo).unwrap();
    let pose = Pose::new(37.4, -122.1).unwrap();

    let outcome = orchestrator(&server)
        .run(asset, Some(PlaceQuery::Pose(pose)))
        .await
        .unwrap();

    start.assert_async().await;
    upload.assert_async().await;
    geocode.assert_async().await;
    create.assert_async().await;

    match outcome {
        PublishOutcome::Photo(photo) => {
            assert_eq!(photo.photo_id, "CAoSLEFGMVFpcE4");
            assert_eq!(photo.pose, pose);
            println!("✅ Photo published at explicit pose: {}", photo.photo_id);
        }
        other => panic!("expected a photo, got {:?}", other),
    }
}

#[tokio::test]
async fn test_photo_with_place_query() {
    let mut server = mockito::Server::new_async().await;
    let (start, upload) = mock_photo_upload(&mut server).await;
    let geocode = server
        .mock("GET", "/maps/api/place/textsearch/json")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "Googleplex Mountain View, CA".into()),
            Matcher::UrlEncoded("key".into(), "maps-key".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "status": "OK",
                "results": [
                    { "geometry": { "location": { "lat": 37.4220, "lng": -122.0841 } } },
                    { "geometry": { "location": { "lat": 37.0, "lng": -122.0 } } }
                ]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/v1/photo")
        .match_body(Matcher::PartialJson(json!({
            "pose": { "latLngPair": { "latitude": 37.4220, "longitude": -122.0841 } }
        })))
        .with_status(200)
        .with_body(r#"{"photoId": {"id": "googleplex-photo"}}"#)
        .expect(1)
        .create_async()
        .await;

    let file = media_file(512);
    let asset = MediaAsset::from_path(file.path(), MediaKind::Photo).unwrap();
    let query = PlaceQuery::from_parts(None, Some("Googleplex Mountain View, CA".into())).unwrap();

    let outcome = orchestrator(&server).run(asset, Some(query)).await.unwrap();

    start.assert_async().await;
    upload.assert_async().await;
    geocode.assert_async().await;
    create.assert_async().await;
    assert_eq!(outcome.resource_id(), "googleplex-photo");
    println!("✅ Photo published at geocoded place");
}

#[tokio::test]
async fn test_video_uploaded_in_three_chunks() {
    let mut server = mockito::Server::new_async().await;
    let resumable_url = format!("{}/upload/resumable/video-1", server.url());

    let open = server
        .mock("POST", "/v1/photoSequence:startUpload")
        .with_status(200)
        .with_body(json!({ "uploadUrl": format!("{}/upload/video-slot", server.url()) }).to_string())
        .expect(1)
        .create_async()
        .await;
    let start = server
        .mock("POST", "/upload/video-slot")
        .match_header("x-goog-upload-protocol", "resumable")
        .match_header("x-goog-upload-command", "start")
        .match_header("x-goog-upload-header-content-length", "2500")
        .match_header("x-goog-upload-header-content-type", "video/mp4")
        .with_status(200)
        .with_header("X-Goog-Upload-URL", &resumable_url)
        .expect(1)
        .create_async()
        .await;

    let mut chunks = Vec::new();
    for (offset, command) in [(0, "upload"), (1024, "upload"), (2048, "upload, finalize")] {
        let chunk = server
            .mock("POST", "/upload/resumable/video-1")
            .match_header("x-goog-upload-offset", offset.to_string().as_str())
            .match_header("x-goog-upload-command", command)
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        chunks.push(chunk);
    }

    let create = server
        .mock("POST", "/v1/photoSequence")
        .match_query(Matcher::UrlEncoded("inputType".into(), "VIDEO".into()))
        .match_body(Matcher::PartialJson(json!({
            "uploadReference": { "uploadUrl": format!("{}/upload/video-slot", server.url()) }
        })))
        .with_status(200)
        .with_body(r#"{"name": "seq-42"}"#)
        .expect(1)
        .create_async()
        .await;
    let status = server
        .mock("GET", "/v1/photoSequence/seq-42")
        .with_status(200)
        .with_body(r#"{"name": "seq-42", "done": true, "response": {"id": "seq-42", "processingState": "PROCESSED"}}"#)
        .expect(1)
        .create_async()
        .await;

    let file = media_file(2500);
    let asset = MediaAsset::from_path(file.path(), MediaKind::Video).unwrap();
    let orchestrator = orchestrator(&server);

    let outcome = orchestrator.run(asset, None).await.unwrap();

    open.assert_async().await;
    start.assert_async().await;
    for chunk in &chunks {
        chunk.assert_async().await;
    }
    create.assert_async().await;
    status.assert_async().await;

    match outcome {
        PublishOutcome::Sequence(sequence) => {
            assert_eq!(sequence.sequence_id, "seq-42");
            assert_eq!(sequence.state, ProcessingState::Processed);
        }
        other => panic!("expected a sequence, got {:?}", other),
    }

    let progress = orchestrator.progress().lock().unwrap().clone();
    assert_eq!(progress.segments_sent, 3);
    assert_eq!(progress.acknowledged_bytes, 2500);
    println!("✅ Video uploaded in {} segments", progress.segments_sent);
}

#[tokio::test]
async fn test_video_processing_failure_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let resumable_url = format!("{}/upload/resumable/video-2", server.url());

    server
        .mock("POST", "/v1/photoSequence:startUpload")
        .with_body(json!({ "uploadUrl": format!("{}/upload/video-slot-2", server.url()) }).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/upload/video-slot-2")
        .with_header("X-Goog-Upload-URL", &resumable_url)
        .create_async()
        .await;
    server
        .mock("POST", "/upload/resumable/video-2")
        .create_async()
        .await;
    server
        .mock("POST", "/v1/photoSequence")
        .match_query(Matcher::Any)
        .with_body(r#"{"name": "seq-7"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v1/photoSequence/seq-7")
        .with_body(r#"{"name": "seq-7", "response": {"processingState": "FAILED", "failureReason": "NO_OVERLAP_GPS"}}"#)
        .expect(1)
        .create_async()
        .await;

    let file = media_file(100);
    let asset = MediaAsset::from_path(file.path(), MediaKind::Video).unwrap();

    let err = orchestrator(&server).run(asset, None).await.unwrap_err();

    match err {
        AppError::ProcessingFailed { sequence_id, reason } => {
            assert_eq!(sequence_id, "seq-7");
            assert_eq!(reason, "NO_OVERLAP_GPS");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_rejected_session_is_surfaced_with_stage() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/photoSequence:startUpload")
        .with_status(403)
        .with_body(r#"{"error": {"message": "project is not whitelisted"}}"#)
        .create_async()
        .await;

    let file = media_file(100);
    let asset = MediaAsset::from_path(file.path(), MediaKind::Video).unwrap();

    let err = orchestrator(&server).run(asset, None).await.unwrap_err();

    assert!(matches!(err, AppError::SessionOpen { status: 403, .. }));
    assert_eq!(err.stage(), "open upload session");
    assert!(err.to_string().contains("whitelisted"));
}
