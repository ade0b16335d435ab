//! random.org JSON-RPC client.
//!
//! Implements [`IntegerSource`] over the `generateIntegers` method of the
//! random.org v2 API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::entropy::{EntropyError, IntegerSource};

/// Default JSON-RPC endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.random.org/json-rpc/4/invoke";

/// random.org integer generator client.
#[derive(Debug, Clone)]
pub struct RandomOrgClient {
    /// HTTP client with a request timeout.
    client: Client,
    /// Endpoint URL.
    endpoint: String,
    /// API key sent with every request.
    api_key: String,
}

impl RandomOrgClient {
    /// Creates a client for `endpoint` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`EntropyError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EntropyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EntropyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: Params<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Params<'a> {
    api_key: &'a str,
    n: usize,
    min: u64,
    max: u64,
    replacement: bool,
    base: u32,
}

#[derive(Debug, Deserialize)]
struct Response {
    result: Option<RpcResult>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcResult {
    random: RandomData,
}

#[derive(Debug, Deserialize)]
struct RandomData {
    data: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl Response {
    fn into_integers(self) -> Result<Vec<u64>, EntropyError> {
        if let Some(err) = self.error {
            return Err(EntropyError::Service {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .map(|r| r.random.data)
            .ok_or_else(|| EntropyError::Malformed("missing result".to_string()))
    }
}

#[async_trait]
impl IntegerSource for RandomOrgClient {
    fn name(&self) -> &'static str {
        "random.org"
    }

    async fn integers(&self, count: usize, min: u64, max: u64) -> Result<Vec<u64>, EntropyError> {
        let request = Request {
            jsonrpc: "2.0",
            method: "generateIntegers",
            params: Params {
                api_key: &self.api_key,
                n: count,
                min,
                max,
                replacement: true,
                base: 10,
            },
            id: 1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EntropyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EntropyError::Status(status.as_u16()));
        }

        response
            .json::<Response>()
            .await
            .map_err(|e| EntropyError::Malformed(e.to_string()))?
            .into_integers()
    }
}
