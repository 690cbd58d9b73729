//! services/api/src/adapters/captions_http.rs
//!
//! Downloads caption payloads over plain HTTP. Implements the `CaptionFetcher` port.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lattice_core::ports::{AcquisitionError, CaptionFetcher};
use reqwest::{Client, StatusCode};

#[derive(Clone)]
pub struct HttpCaptionFetcher {
    client: Client,
}

impl HttpCaptionFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CaptionFetcher for HttpCaptionFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, AcquisitionError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AcquisitionError::CaptionDownload(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AcquisitionError::CaptionDownload(format!(
                "caption endpoint returned {}",
                status
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| AcquisitionError::CaptionDownload(e.to_string()))
    }
}
