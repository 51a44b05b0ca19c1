//! Bridges actix-web's request/response types and `portway-proxy`'s
//! framework-agnostic [`ForwardRequest`]/[`reqwest::Response`] (`spec.md`
//! §4.F). `actix-web` and `reqwest` each carry their own generation of the
//! `http` crate's header types, so headers are translated name-by-name
//! rather than reused directly.

use actix_web::http::StatusCode as ActixStatus;
use actix_web::{HttpRequest, HttpResponse};
use bytes::Bytes;
use portway_common::PortwayError;
use portway_registry::ProxyEndpoint;
use reqwest::header::{HeaderMap as ReqwestHeaders, HeaderName as ReqwestName, HeaderValue as ReqwestValue};

use portway_proxy::ForwardRequest;

fn to_reqwest_headers(req: &HttpRequest) -> ReqwestHeaders {
    let mut headers = ReqwestHeaders::new();
    for (name, value) in req.headers().iter() {
        let (Ok(name), Ok(value)) = (
            ReqwestName::from_bytes(name.as_str().as_bytes()),
            ReqwestValue::from_bytes(value.as_bytes()),
        ) else {
            continue;
        };
        headers.append(name, value);
    }
    headers
}

pub fn build_forward_request(
    req: &HttpRequest,
    env: &str,
    path_segments: Vec<String>,
    query_pairs: Vec<(String, String)>,
    body: Bytes,
) -> ForwardRequest {
    let content_length_known = req
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some();

    ForwardRequest {
        method: req.method().as_str().to_owned(),
        env: env.to_owned(),
        path_segments,
        query_pairs,
        headers: to_reqwest_headers(req),
        body,
        content_length_known,
    }
}

pub async fn to_actix_response(response: reqwest::Response) -> Result<HttpResponse, PortwayError> {
    let status = ActixStatus::from_u16(response.status().as_u16())
        .unwrap_or(ActixStatus::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);
    for (name, value) in response.headers().iter() {
        if name.as_str().eq_ignore_ascii_case("content-length") {
            continue;
        }
        builder.append_header((name.as_str(), value.as_bytes()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| PortwayError::bad_gateway(e.to_string()))?;
    Ok(builder.body(body))
}

pub async fn forward(
    client: &reqwest::Client,
    endpoint: &ProxyEndpoint,
    request: ForwardRequest,
    max_buffer_bytes: usize,
) -> Result<HttpResponse, PortwayError> {
    let response = portway_proxy::forward(client, endpoint, request, max_buffer_bytes).await?;
    to_actix_response(response).await
}
