use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam for issuing HTTP requests, so loaders can run without a network.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
