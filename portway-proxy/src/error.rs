use portway_common::PortwayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream timed out")]
    Timeout,
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("dependency cycle or unknown step: {0}")]
    Orchestration(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Timeout
        } else {
            ProxyError::BadGateway(err.to_string())
        }
    }
}

impl From<ProxyError> for PortwayError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Timeout => PortwayError::gateway_timeout("upstream request timed out"),
            ProxyError::BadGateway(msg) => PortwayError::bad_gateway(msg),
            ProxyError::Template(msg) => PortwayError::bad_request(msg),
            ProxyError::PayloadTooLarge => {
                PortwayError::payload_too_large("request body exceeds MaxProxyBufferBytes")
            }
            ProxyError::Orchestration(msg) => PortwayError::bad_request(msg),
        }
    }
}
