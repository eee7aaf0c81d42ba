use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::credentials::CredentialProvider;
use crate::errors::AppResult;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Publish API client: attaches the bearer credential to every request and
/// the developer key to API paths.
#[derive(Clone)]
pub struct PublishClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    developer_key: Option<String>,
}

impl PublishClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        config: &Config,
    ) -> Self {
        Self {
            transport,
            credentials,
            base_url: config.publish_api_url.trim_end_matches('/').to_string(),
            developer_key: config.developer_key.clone(),
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        let url = format!("{}{}", self.base_url, path);
        match &self.developer_key {
            Some(key) if url.contains('?') => format!("{}&key={}", url, key),
            Some(key) => format!("{}?key={}", url, key),
            None => url,
        }
    }

    pub async fn send(&self, request: HttpRequest) -> AppResult<HttpResponse> {
        let token = self.credentials.access_token()?;
        let request = request.header("Authorization", format!("Bearer {}", token));
        let response = self.transport.send(request).await?;
        log::debug!(
            "Publish API response {}: {}",
            response.status,
            response.text()
        );
        Ok(response)
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> AppResult<HttpResponse> {
        let request = HttpRequest::new(Method::POST, self.api_url(path)).json(body)?;
        self.send(request).await
    }

    pub async fn get(&self, path: &str) -> AppResult<HttpResponse> {
        self.send(HttpRequest::new(Method::GET, self.api_url(path)))
            .await
    }
}
