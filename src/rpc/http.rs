use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use super::{RawResponse, Transport, ERROR_BODY_PREVIEW, MAX_RESPONSE_BYTES};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// Posts JSON-RPC bodies over HTTP(S) with a shared connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<RawResponse> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        // One byte past the limit is enough for the caller to reject the body.
        let limit = if status == reqwest::StatusCode::OK {
            MAX_RESPONSE_BYTES + 1
        } else {
            ERROR_BODY_PREVIEW
        };
        let body = read_limited(response, limit).await?;

        Ok(RawResponse { status, body })
    }
}

/// Reads at most `limit` bytes of the body and drops the rest of the stream.
async fn read_limited(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
