//! Fetching tile bytes.
//!
//! Transport and request scheduling live behind the [`Fetcher`] trait. The
//! content lifecycle only needs "bytes or failure" for a URL.
//!
//! # Implementations
//!
//! - [`HttpFetcher`]: Plain HTTP GET via reqwest (native only, since browser
//!   fetch futures are not `Send`)

use std::{future::Future, pin::Pin};

use crate::error::{Error, Result};

/// Future type for fetch operations.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'static>>;

/// A request for one tile's bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// The tile URL.
    pub url: String,
    /// Distance from the camera to the tile, for prioritization.
    pub distance: f64,
}

/// Source of tile bytes.
///
/// Implementations should report transport failures as
/// [`Error::FetchFailed`]. The returned future must not borrow `self`, since
/// it outlives the call.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture;
}

/// Fetches tiles over HTTP.
#[cfg(not(target_family = "wasm"))]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

#[cfg(not(target_family = "wasm"))]
impl HttpFetcher {
    /// Create a fetcher with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher around a preconfigured HTTP client.
    #[must_use]
    pub fn with_http(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[cfg(not(target_family = "wasm"))]
impl Fetcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture {
        let http = self.http.clone();
        let url = request.url.clone();
        let distance = request.distance;

        Box::pin(async move {
            tracing::debug!(url, distance, "fetching");

            let response = http
                .get(&url)
                .send()
                .await
                .map_err(|e| Error::FetchFailed {
                    url: url.clone(),
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::FetchFailed {
                    url,
                    message: format!("http status {}", status.as_u16()),
                });
            }

            let data = response.bytes().await.map_err(|e| Error::FetchFailed {
                url: url.clone(),
                message: e.to_string(),
            })?;

            Ok(data.to_vec())
        })
    }
}
