//! Metadata-only HTTP probing of image URLs.

use anyhow::{anyhow, Result};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// Content type and size reported by a HEAD request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeInfo {
    /// Lowercased media type with parameters stripped, e.g. `image/jpeg`.
    pub content_type: Option<String>,
    /// Byte length from `Content-Length`, when the server sends one.
    pub content_length: Option<u64>,
}

/// Media types treated as ordinary raster product photos.
pub const KNOWN_RASTER_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

impl ProbeInfo {
    /// `Some(true)` for SVG, `Some(false)` for any other known type, `None` if unknown.
    pub fn is_svg(&self) -> Option<bool> {
        self.content_type.as_deref().map(|t| t.contains("svg"))
    }

    pub fn is_known_raster(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|t| KNOWN_RASTER_TYPES.contains(&t))
            .unwrap_or(false)
    }
}

/// Issues HEAD requests with a per-call time bound.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build a prober with its own client.
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Self::client_builder(user_agent).build()?;
        Ok(Self::new(client, timeout))
    }

    /// Client settings shared by every prober: fixed UA, at most 5 redirects.
    pub fn client_builder(user_agent: &str) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
    }

    /// Probe a URL, swallowing every failure.
    pub async fn probe(&self, url: &str) -> Option<ProbeInfo> {
        match self.try_probe(url).await {
            Ok(info) => {
                debug!(
                    "Probed {}: type={:?} length={:?}",
                    url, info.content_type, info.content_length
                );
                Some(info)
            }
            Err(e) => {
                debug!("Image probe failed for {}: {}", url, e);
                None
            }
        }
    }

    /// Probe a URL, reporting why it failed.
    pub async fn try_probe(&self, url: &str) -> Result<ProbeInfo> {
        let response = tokio::time::timeout(self.timeout, self.client.head(url).send())
            .await
            .map_err(|_| anyhow!("timed out after {:?}", self.timeout))??;

        if !response.status().is_success() {
            return Err(anyhow!("non-success status {}", response.status()));
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty());
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        Ok(ProbeInfo {
            content_type,
            content_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(t: Option<&str>) -> ProbeInfo {
        ProbeInfo {
            content_type: t.map(str::to_string),
            content_length: None,
        }
    }

    #[test]
    fn test_is_svg() {
        assert_eq!(typed(Some("image/svg+xml")).is_svg(), Some(true));
        assert_eq!(typed(Some("image/png")).is_svg(), Some(false));
        assert_eq!(typed(None).is_svg(), None);
    }

    #[test]
    fn test_is_known_raster() {
        assert!(typed(Some("image/jpeg")).is_known_raster());
        assert!(typed(Some("image/webp")).is_known_raster());
        assert!(!typed(Some("image/avif")).is_known_raster());
        assert!(!typed(Some("text/html")).is_known_raster());
        assert!(!typed(None).is_known_raster());
    }
}
