//! Implements [`portway_proxy::StepInvoker`] (`spec.md` §4.G): a composite
//! step's `Endpoint` always names a `Proxy` endpoint, so each step re-enters
//! the proxy forward logic directly rather than the full dispatcher.

use async_trait::async_trait;
use bytes::Bytes;
use portway_proxy::{ForwardRequest, ProxyError, StepInvoker};
use portway_registry::{EndpointDefinition, RegistrySnapshot};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

pub struct RegistryInvoker<'a> {
    pub snapshot: &'a RegistrySnapshot,
    pub client: &'a reqwest::Client,
    pub env: &'a str,
    pub max_buffer_bytes: usize,
}

#[async_trait]
impl<'a> StepInvoker for RegistryInvoker<'a> {
    async fn invoke(&self, endpoint: &str, method: &str, body: Option<Value>) -> Result<Value, ProxyError> {
        let definition = self
            .snapshot
            .find(endpoint)
            .ok_or_else(|| ProxyError::Orchestration(format!("unknown composite step endpoint `{endpoint}`")))?;
        let EndpointDefinition::Proxy(proxy_endpoint) = definition else {
            return Err(ProxyError::Orchestration(format!(
                "composite step endpoint `{endpoint}` is not a Proxy endpoint"
            )));
        };

        let mut headers = HeaderMap::new();
        let body_bytes = match &body {
            Some(value) => {
                headers.insert("content-type", HeaderValue::from_static("application/json"));
                serde_json::to_vec(value).map_err(|e| ProxyError::Template(e.to_string()))?
            }
            None => Vec::new(),
        };

        let request = ForwardRequest {
            method: method.to_owned(),
            env: self.env.to_owned(),
            path_segments: Vec::new(),
            query_pairs: Vec::new(),
            headers,
            body: Bytes::from(body_bytes),
            content_length_known: true,
        };

        let response = portway_proxy::forward(self.client, proxy_endpoint, request, self.max_buffer_bytes).await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => {
                if status.is_success() {
                    Ok(value)
                } else {
                    Err(ProxyError::BadGateway(format!("step endpoint `{endpoint}` returned {status}")))
                }
            }
            Err(_) if status.is_success() => Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned())),
            Err(_) => Err(ProxyError::BadGateway(format!("step endpoint `{endpoint}` returned {status}"))),
        }
    }
}
