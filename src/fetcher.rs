use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{EtlError, Result};

pub const KOBO_CSV_URL: &str = "https://kf.kobotoolbox.org/api/v2/assets/a7UgQCCmQDJxoJWaTwMXhD/export-settings/esJrBU9SNVd3NbQNtYHFLTa/data.csv";

/// Status and body of the export request. The body is only read on 200.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Where the raw CSV export comes from.
#[async_trait]
pub trait Source {
    async fn fetch(&self) -> Result<FetchResponse>;
}

/// KoboToolbox export endpoint behind HTTP Basic auth.
pub struct KoboSource {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl KoboSource {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        KoboSource {
            client: reqwest::Client::new(),
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Source for KoboSource {
    async fn fetch(&self) -> Result<FetchResponse> {
        info!("Requesting CSV export: {}", self.url);
        let request_failed = |source| EtlError::Request {
            url: self.url.clone(),
            source,
        };

        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status().as_u16();
        if status != 200 {
            return Ok(FetchResponse {
                status,
                body: String::new(),
            });
        }

        let body = response.text().await.map_err(request_failed)?;
        debug!(status, bytes = body.len(), "Export downloaded");
        Ok(FetchResponse { status, body })
    }
}
