//! The outbound `reqwest::Client` used for proxy forwarding and composite
//! step calls: rustls, an explicit timeout, no implicit retries.

use std::time::Duration;

use crate::error::ProxyError;

pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ProxyError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .use_rustls_tls()
        .build()
        .map_err(|e| ProxyError::BadGateway(e.to_string()))
}
