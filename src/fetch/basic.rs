use std::time::Duration;

use super::client::HttpClient;
use async_trait::async_trait;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
// Replay payloads for a busy day can be tens of megabytes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
