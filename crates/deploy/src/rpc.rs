//! Ethereum JSON-RPC transport.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Default timeout for a single RPC request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcTransport {
    client: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl RpcTransport {
    /// Create a transport for `url`.
    pub fn new(url: &str) -> Result<Self, anyhow::Error> {
        let url = Url::parse(url).with_context(|| format!("Invalid RPC URL: {url}"))?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    /// The endpoint, without credentials that may be embedded in its path.
    pub fn endpoint(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}://{}:{}", self.url.scheme(), host, port),
            None => format!("{}://{}", self.url.scheme(), host),
        }
    }

    /// Make a JSON-RPC call and deserialize the result.
    ///
    /// A JSON `null` result deserializes into `Option::None` for optional `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": id
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let result: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        parse_response(method, result)
    }
}

/// Extract the `result` of a JSON-RPC response, surfacing RPC errors.
fn parse_response<T: DeserializeOwned>(method: &str, response: Value) -> Result<T, anyhow::Error> {
    if let Some(error) = response.get("error") {
        anyhow::bail!(
            "RPC error from {}: {}",
            method,
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = response
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}
