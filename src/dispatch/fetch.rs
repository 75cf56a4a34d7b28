//! Remote image fetching for paste operations.
//!
//! The fetch is deliberately strict about size: the upstream must announce a
//! non-zero `content-length` no larger than the limit before any body is read,
//! and the body is cut off if it runs past what was announced.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use http::header::CONTENT_LENGTH;
use http::HeaderMap;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

/// Largest remote image accepted (4 MiB).
pub const MAX_FETCH_SIZE: u64 = 4 * 1024 * 1024;

/// Default timeout for the whole fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches a remote image into memory.
#[async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    /// Download the resource at `url`, returning the complete body.
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError>;
}

/// Validate an upstream response head.
///
/// Returns the announced body length when the response is acceptable.
pub fn check_response(
    url: &str,
    status: u16,
    content_length: Option<u64>,
    limit: u64,
) -> Result<u64, FetchError> {
    if status != 200 {
        return Err(FetchError::UpstreamStatus {
            url: url.to_string(),
            status,
        });
    }

    let size = match content_length {
        Some(size) if size > 0 => size,
        _ => {
            return Err(FetchError::MissingContentLength {
                url: url.to_string(),
            })
        }
    };

    if size > limit {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            size,
            limit,
        });
    }

    Ok(size)
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// [`ImageFetcher`] over HTTP(S) using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_size: u64,
}

impl HttpImageFetcher {
    /// Create a fetcher with the default timeout and size limit.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_options(DEFAULT_FETCH_TIMEOUT, MAX_FETCH_SIZE)
    }

    /// Create a fetcher with a custom timeout and size limit.
    pub fn with_options(timeout: Duration, max_size: u64) -> Result<Self, reqwest::Error> {
        // Redirects are not followed: a 3xx is checked like any other non-200.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, max_size })
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError> {
        let transport = |e: reqwest::Error| {
            warn!(url = %url, error = %e, "Upstream fetch failed");
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        };

        let response = self.client.get(url.clone()).send().await.map_err(transport)?;

        let expected = check_response(
            url.as_str(),
            response.status().as_u16(),
            declared_length(response.headers()),
            self.max_size,
        )
        .map_err(|e| {
            debug!(error = %e, "Upstream response rejected");
            e
        })?;

        // `expected` is bounded by max_size, so this cannot over-allocate.
        let mut buffer = BytesMut::with_capacity(expected as usize);
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport)?;
            if (buffer.len() + chunk.len()) as u64 > expected {
                warn!(url = %url, expected, "Upstream sent more than announced");
                return Err(FetchError::BodyOverflow {
                    url: url.to_string(),
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = buffer.len(), "Fetched remote image");
        Ok(buffer.freeze())
    }
}
