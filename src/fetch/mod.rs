//! Loading dataset bytes from disk or over HTTP.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use reqwest::Request;
use tracing::debug;

/// GETs `url` and returns the body. Non-2xx responses are errors.
pub async fn fetch_bytes(client: &impl HttpClient, url: &str) -> Result<Vec<u8>> {
    let req = Request::new(reqwest::Method::GET, url.parse()?);
    let response = client
        .execute(req)
        .await
        .with_context(|| format!("request to {url} failed"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("{url} returned status {status}: {body}");
    }

    let bytes = response.bytes().await?;
    debug!(url, bytes = bytes.len(), "Fetched");
    Ok(bytes.to_vec())
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads `source` from disk, or fetches it when it is an http(s) URL.
pub async fn read_source(client: &impl HttpClient, source: &str) -> Result<Vec<u8>> {
    if is_remote(source) {
        fetch_bytes(client, source).await
    } else {
        std::fs::read(source).with_context(|| format!("failed to read {source}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::Response;
    use std::env;
    use std::fs;

    struct Offline;

    #[async_trait]
    impl HttpClient for Offline {
        async fn execute(&self, _req: Request) -> reqwest::Result<Response> {
            panic!("local sources must not hit the network");
        }
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.org/stations.csv"));
        assert!(is_remote("http://localhost:8000/s.csv.gz"));
        assert!(!is_remote("data/stations.csv"));
        assert!(!is_remote("httpdata/stations.csv"));
    }

    #[tokio::test]
    async fn test_read_source_local_file() {
        let path = format!("{}/route_risk_test_source.csv", env::temp_dir().display());
        fs::write(&path, "lat,lon\n1,2\n").unwrap();

        let bytes = read_source(&Offline, &path).await.unwrap();
        assert_eq!(bytes, b"lat,lon\n1,2\n");

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_read_source_missing_file() {
        assert!(read_source(&Offline, "/no/such/route_risk.csv").await.is_err());
    }
}
