use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

pub const ACCESS_TOKEN_ENV: &str = "STREETVIEW_ACCESS_TOKEN";
pub const MAPS_API_KEY_ENV: &str = "GOOGLEMAPS_API_KEY";

/// Supplies the bearer token for the publish API and the geocoding key.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> AppResult<String>;
    fn maps_api_key(&self) -> AppResult<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    pub access_token: Option<String>,
    pub maps_api_key: Option<String>,
}

impl StaticCredentials {
    pub fn new(access_token: impl Into<String>, maps_api_key: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            maps_api_key: Some(maps_api_key.into()),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self) -> AppResult<String> {
        self.access_token
            .clone()
            .ok_or_else(|| AppError::Credentials("publish API access token".to_string()))
    }

    fn maps_api_key(&self) -> AppResult<String> {
        self.maps_api_key
            .clone()
            .ok_or_else(|| AppError::Credentials("Google Maps API key".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StoredCredentials {
    access_token: String,
}

/// Reads the token stored by a previous OAuth consent, with environment
/// variables as fallback.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
    maps_api_key: Option<String>,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>, maps_api_key: Option<String>) -> Self {
        Self {
            path: path.into(),
            maps_api_key,
        }
    }

    pub fn default_path() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Could not find home directory".to_string()))?;
        Ok(home
            .join(".credentials")
            .join("streetviewpublish_credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for FileCredentials {
    fn access_token(&self) -> AppResult<String> {
        if self.path.exists() {
            let contents = fs::read_to_string(&self.path)?;
            let stored: StoredCredentials = serde_json::from_str(&contents)?;
            if !stored.access_token.trim().is_empty() {
                return Ok(stored.access_token);
            }
            log::warn!(
                "Credential file {} has an empty access token",
                self.path.display()
            );
        }

        std::env::var(ACCESS_TOKEN_ENV).map_err(|_| {
            AppError::Credentials(format!(
                "publish API access token (looked in {} and ${})",
                self.path.display(),
                ACCESS_TOKEN_ENV
            ))
        })
    }

    fn maps_api_key(&self) -> AppResult<String> {
        if let Some(key) = &self.maps_api_key {
            return Ok(key.clone());
        }
        std::env::var(MAPS_API_KEY_ENV).map_err(|_| {
            AppError::Credentials(format!("Google Maps API key (set ${})", MAPS_API_KEY_ENV))
        })
    }
}
