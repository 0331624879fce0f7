//! Pulls raw leg payloads from the fleet API.
//!
//! The API serves the current day at `/api/segments` and any past day at
//! `/api/replay?date=YYYY-MM-DD`; both answer with the envelope that
//! [`crate::ingest::parse_payload`] understands.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::debug;

/// Env var holding the API base URL when none is given on the command line.
pub const API_BASE_ENV: &str = "FLEET_API_BASE";

pub fn live_url(base: &str) -> String {
    format!("{}/api/segments", base.trim_end_matches('/'))
}

pub fn replay_url(base: &str, date: NaiveDate) -> String {
    format!(
        "{}/api/replay?date={}",
        base.trim_end_matches('/'),
        date.format("%Y-%m-%d")
    )
}

/// GETs `url` and returns the body. Non-success statuses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid url {url}"))?,
    );

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {url} returned {status}");
    }
    let bytes = resp.bytes().await?;
    debug!(url, bytes = bytes.len(), "Payload received");
    Ok(bytes.to_vec())
}
