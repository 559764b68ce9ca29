mod http;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, PoisonError,
};

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::endpoints::Endpoint;

pub use http::HttpTransport;

/// Longest slice of an error body kept for diagnostics.
const ERROR_BODY_PREVIEW: usize = 512;
/// Responses larger than this are not decoded.
const MAX_RESPONSE_BYTES: usize = 1 << 20;

pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Carries a serialized JSON-RPC request to a single node.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> anyhow::Result<RawResponse>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Why a single endpoint failed to serve a request.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("encode request: {0}")]
    Encode(serde_json::Error),
    #[error("{0:#}")]
    Transport(anyhow::Error),
    #[error("http {status}: {preview}")]
    Status { status: u16, preview: String },
    #[error("decode response: {0}")]
    Decode(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("rpc client requires at least one endpoint")]
    NoEndpoints,
    #[error("invalid url for endpoint {name}: {source}")]
    InvalidUrl {
        name: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
#[error("all endpoints failed: {}", format_failures(.0))]
pub struct CallError(pub Vec<(String, AttemptError)>);

fn format_failures(failures: &[(String, AttemptError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .join("; ")
}

fn body_preview(body: &[u8]) -> String {
    let end = body.len().min(ERROR_BODY_PREVIEW);
    String::from_utf8_lossy(&body[..end]).trim().to_string()
}

/// Dispatches JSON-RPC calls across a fixed pool of endpoints.
///
/// Every logical call starts one endpoint further along than the previous
/// one and falls through the rest of the pool until an endpoint answers.
pub struct RpcClient<T = HttpTransport> {
    endpoints: Vec<Endpoint>,
    transport: T,
    next: Mutex<usize>,
    call_id: AtomicU64,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(endpoints: Vec<Endpoint>, transport: T) -> Result<Self, ClientError> {
        if endpoints.is_empty() {
            return Err(ClientError::NoEndpoints);
        }
        for endpoint in &endpoints {
            Url::parse(&endpoint.url).map_err(|source| ClientError::InvalidUrl {
                name: endpoint.name.clone(),
                source,
            })?;
        }
        Ok(Self {
            endpoints,
            transport,
            next: Mutex::new(0),
            call_id: AtomicU64::new(0),
        })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    fn next_index(&self) -> usize {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let index = *next;
        *next = (index + 1) % self.endpoints.len();
        index
    }

    /// Performs one logical call, returning the result and the endpoint that served it.
    pub async fn call(&self, method: &str, params: &Value) -> Result<(Value, &Endpoint), CallError> {
        let start = self.next_index();
        let mut failures = Vec::new();

        for offset in 0..self.endpoints.len() {
            let endpoint = &self.endpoints[(start + offset) % self.endpoints.len()];
            match self.call_single(endpoint, method, params).await {
                Ok(result) => return Ok((result, endpoint)),
                Err(err) => {
                    warn!(endpoint = %endpoint.name, method, %err, "rpc attempt failed");
                    failures.push((endpoint.name.clone(), err));
                }
            }
        }

        Err(CallError(failures))
    }

    async fn call_single(
        &self,
        endpoint: &Endpoint,
        method: &str,
        params: &Value,
    ) -> Result<Value, AttemptError> {
        let id = self.call_id.fetch_add(1, Ordering::Relaxed) + 1;
        let body = serde_json::to_vec(&RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        })
        .map_err(AttemptError::Encode)?;

        let response = self
            .transport
            .post_json(&endpoint.url, body)
            .await
            .map_err(AttemptError::Transport)?;

        if response.status != StatusCode::OK {
            return Err(AttemptError::Status {
                status: response.status.as_u16(),
                preview: body_preview(&response.body),
            });
        }
        if response.body.len() > MAX_RESPONSE_BYTES {
            return Err(AttemptError::Decode(format!(
                "response of {} bytes exceeds limit",
                response.body.len()
            )));
        }

        let decoded: RpcResponse = serde_json::from_slice(&response.body)
            .map_err(|err| AttemptError::Decode(err.to_string()))?;

        match (decoded.result, decoded.error) {
            (Some(result), None) => {
                debug!(endpoint = %endpoint.name, id, method, "rpc call succeeded");
                Ok(result)
            }
            (None, Some(RpcErrorObject { code, message })) => {
                Err(AttemptError::Rpc { code, message })
            }
            (Some(_), Some(_)) => Err(AttemptError::Decode(
                "response has both result and error".to_string(),
            )),
            (None, None) => Err(AttemptError::Decode(
                "response has neither result nor error".to_string(),
            )),
        }
    }
}
