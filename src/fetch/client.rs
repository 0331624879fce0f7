use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for pulling leg payloads, so tests and wrappers can stand
/// in for the real HTTP client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
