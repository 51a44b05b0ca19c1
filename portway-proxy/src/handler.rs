//! The Proxy Handler (`spec.md` §4.F): rewrites the request's target URL,
//! method, headers and query string, forwards it, and streams the
//! response back verbatim.

use std::time::Duration;

use bytes::Bytes;
use portway_odata::ColumnMap;
use portway_registry::ProxyEndpoint;
use reqwest::{Method, Response};

use crate::error::ProxyError;
use crate::headers::{apply_header_append, strip_hop_by_hop};
use crate::query_rewrite::rewrite_query;

/// Everything the dispatcher already knows about the inbound request that
/// the proxy forward needs, decoupled from any particular web framework's
/// request type.
pub struct ForwardRequest {
    pub method: String,
    pub env: String,
    pub path_segments: Vec<String>,
    pub query_pairs: Vec<(String, String)>,
    pub headers: reqwest::header::HeaderMap,
    pub body: Bytes,
    pub content_length_known: bool,
}

fn translate_method(endpoint: &ProxyEndpoint, original: &str) -> String {
    endpoint
        .method_translation
        .get(original)
        .cloned()
        .unwrap_or_else(|| original.to_owned())
}

fn render_target_url(template: &str, env: &str, path_segments: &[String]) -> String {
    let mut url = template.replace("{env}", env);
    for (i, segment) in path_segments.iter().enumerate() {
        url = url.replace(&format!("{{{i}}}"), segment);
    }
    url
}

fn endpoint_columns(endpoint: &ProxyEndpoint) -> ColumnMap {
    ColumnMap::new(
        endpoint
            .allowed_columns()
            .into_iter()
            .map(|m| (m.alias, m.db_column)),
    )
}

pub async fn forward(
    client: &reqwest::Client,
    endpoint: &ProxyEndpoint,
    request: ForwardRequest,
    max_buffer_bytes: usize,
) -> Result<Response, ProxyError> {
    if !request.content_length_known && request.body.len() > max_buffer_bytes {
        return Err(ProxyError::PayloadTooLarge);
    }

    let translated_method = translate_method(endpoint, &request.method);
    let method = Method::from_bytes(translated_method.as_bytes())
        .map_err(|e| ProxyError::Template(e.to_string()))?;

    let base_url = render_target_url(&endpoint.target_url_template, &request.env, &request.path_segments);

    let query = if request.method.eq_ignore_ascii_case("GET") {
        let columns = endpoint_columns(endpoint);
        rewrite_query(&request.query_pairs, &columns)
            .map_err(|e| ProxyError::Template(e.to_string()))?
    } else {
        request.query_pairs.clone()
    };

    let mut headers = request.headers.clone();
    strip_hop_by_hop(&mut headers);
    if let Some(entries) = endpoint.header_append.get(&request.method) {
        apply_header_append(
            &mut headers,
            entries,
            &request.method,
            &translated_method,
            endpoint.header_conflict_policy,
        );
    }

    let response = client
        .request(method, base_url)
        .query(&query)
        .headers(headers)
        .body(request.body)
        .send()
        .await?;

    Ok(response)
}

pub fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
