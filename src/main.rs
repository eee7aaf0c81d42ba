use anyhow::Context;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::sync::Arc;

use streetview_uploader::config::{self, Config};
use streetview_uploader::credentials::{
    CredentialProvider, FileCredentials, StaticCredentials, MAPS_API_KEY_ENV,
};
use streetview_uploader::errors::AppError;
use streetview_uploader::models::{MediaAsset, MediaKind, PlaceQuery, Pose, PublishOutcome};
use streetview_uploader::uploader::Orchestrator;

/// Upload a 360 photo or video to the Street View Publish API.
#[derive(Parser, Debug)]
#[command(name = "streetview-uploader", version)]
#[command(group(ArgGroup::new("media").required(true).args(["photo", "video"])))]
struct Cli {
    /// Full path to a photo file
    #[arg(long, value_name = "PATH")]
    photo: Option<PathBuf>,

    /// Full path of a stitched video file including its GPMF track
    #[arg(long, value_name = "PATH")]
    video: Option<PathBuf>,

    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Compass heading in degrees, used with --lat/--lon
    #[arg(long, requires = "lat")]
    heading: Option<f64>,

    /// Free-text place, e.g. "Googleplex Mountain View, CA"
    #[arg(long)]
    query: Option<String>,

    /// Bearer token for the publish API (default: stored credentials file)
    #[arg(long)]
    access_token: Option<String>,

    #[arg(long)]
    googlemaps_key: Option<String>,

    /// Developer key of the GCP project
    #[arg(long)]
    developer_key: Option<String>,

    /// Path of the stored OAuth credentials file
    #[arg(long, value_name = "PATH")]
    credentials: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds between processing status polls for videos
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Seconds to wait for video processing before giving up
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn media(&self) -> Option<(PathBuf, MediaKind)> {
        match (&self.photo, &self.video) {
            (Some(path), None) => Some((path.clone(), MediaKind::Photo)),
            (None, Some(path)) => Some((path.clone(), MediaKind::Video)),
            _ => None,
        }
    }

    fn place_query(&self) -> Result<Option<PlaceQuery>, AppError> {
        let pose = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                let pose = Pose::new(lat, lon)?;
                Some(match self.heading {
                    Some(heading) => pose.with_heading(heading)?,
                    None => pose,
                })
            }
            _ => None,
        };

        if pose.is_none() && self.query.is_none() {
            return Ok(None);
        }
        PlaceQuery::from_parts(pose, self.query.clone()).map(Some)
    }

    fn credential_provider(&self) -> anyhow::Result<Arc<dyn CredentialProvider>> {
        let maps_api_key = self
            .googlemaps_key
            .clone()
            .or_else(|| std::env::var(MAPS_API_KEY_ENV).ok());

        if let Some(token) = &self.access_token {
            return Ok(Arc::new(StaticCredentials {
                access_token: Some(token.clone()),
                maps_api_key,
            }));
        }

        let path = match &self.credentials {
            Some(path) => path.clone(),
            None => FileCredentials::default_path()?,
        };
        Ok(Arc::new(FileCredentials::new(path, maps_api_key)))
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => config::load_config()?,
        };

        if let Some(key) = &self.developer_key {
            config.developer_key = Some(key.clone());
        }
        if let Some(secs) = self.poll_interval {
            config.processing.poll_interval_secs = secs;
        }
        if let Some(secs) = self.timeout {
            config.processing.timeout_secs = secs;
        }
        config::validate_config(&config)?;
        Ok(config)
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<PublishOutcome> {
    let (path, kind) = cli
        .media()
        .ok_or_else(|| AppError::invalid_input("media", "Provide exactly one of --photo or --video"))?;
    let place = cli.place_query()?;
    let asset = MediaAsset::from_path(&path, kind)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let credentials = cli.credential_provider()?;

    let orchestrator = Orchestrator::from_config(&config, credentials)?;

    let cancel = orchestrator.cancellation_token();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, cancelling upload...");
        cancel.cancel();
    }) {
        log::warn!("Failed to register Ctrl+C handler (non-critical): {}", e);
    }

    Ok(orchestrator.run(asset, place).await?)
}

fn stage_of(error: &anyhow::Error) -> &'static str {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<AppError>())
        .map(AppError::stage)
        .unwrap_or("upload")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration failed: {:#}", e);
            std::process::exit(2);
        }
    };

    // RUST_LOG takes precedence over the configured level.
    env_logger::Builder::new()
        .parse_filters(&config.log_level)
        .parse_default_env()
        .init();

    log::info!("Starting Street View uploader");

    match run(cli, config).await {
        Ok(PublishOutcome::Photo(photo)) => {
            println!("Photo created successfully: {}", photo.photo_id);
        }
        Ok(PublishOutcome::Sequence(sequence)) => {
            println!(
                "Photo sequence {}: {}",
                sequence.state, sequence.sequence_id
            );
        }
        Err(e) => {
            log::error!("Upload failed: {:#}", e);
            eprintln!("{} failed: {:#}", stage_of(&e), e);
            std::process::exit(1);
        }
    }
}
