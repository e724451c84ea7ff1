//! HTTP retrieval of feed bundles.
//!
//! A single attempt per call: there is no retry policy here. A failed
//! download is reported and the whole run is rerun by whoever scheduled it.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use bytes::Bytes;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Downloads `url` with a GET request and returns the body.
///
/// # Errors
///
/// Returns [`PipelineError::FeedUnavailable`] if the URL is malformed, the
/// request fails, or the server answers with a non-success status.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Bytes> {
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|e| PipelineError::unavailable(url, format!("invalid URL: {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| PipelineError::unavailable(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::unavailable(url, format!("HTTP status {status}")));
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| PipelineError::unavailable(url, e))?;
    debug!(url, bytes = body.len(), "Feed body received");
    Ok(body)
}
