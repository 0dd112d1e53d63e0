use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::DiggerError;

/// Blocking access to the remote archive. One attempt per request; retries
/// are left to the operator re-invoking the tool.
pub trait ArchiveClient: Send + Sync {
    /// Fetches a text resource (catalog page, alerts CSV, velocity file).
    fn fetch_text(&self, url: &str) -> Result<String, DiggerError>;

    /// Streams a binary resource (plot PDFs) to `destination`.
    fn download_file(&self, url: &str, destination: &Path) -> Result<(), DiggerError>;
}

#[derive(Clone)]
pub struct HttpArchiveClient {
    client: Client,
}

impl HttpArchiveClient {
    pub fn new() -> Result<Self, DiggerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("harps-digger/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DiggerError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| DiggerError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, DiggerError> {
        debug!(url, "archive request");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| DiggerError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(DiggerError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

impl ArchiveClient for HttpArchiveClient {
    fn fetch_text(&self, url: &str) -> Result<String, DiggerError> {
        self.get(url)?
            .text()
            .map_err(|err| DiggerError::Http(err.to_string()))
    }

    fn download_file(&self, url: &str, destination: &Path) -> Result<(), DiggerError> {
        let mut response = self.get(url)?;
        let mut file =
            File::create(destination).map_err(|err| DiggerError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
