//! Routes a `GET` at a [`StaticEndpoint`] (`spec.md` §4.H): conditional GET
//! via `ETag`/`Last-Modified`, with optional client-side OData filtering of
//! a JSON array payload when `EnableFiltering` is set.

use actix_web::HttpRequest;
use portway_common::PortwayError;
use portway_files::{apply_filtering, is_not_modified, load_static};
use portway_odata::ODataQuery;
use portway_registry::StaticEndpoint;

pub enum StaticResponse {
    NotModified { etag: String },
    Ok {
        body: Vec<u8>,
        content_type: String,
        etag: String,
        last_modified: httpdate::HttpDate,
    },
}

pub fn get(endpoint: &StaticEndpoint, req: &HttpRequest, query_pairs: &[(String, String)]) -> Result<StaticResponse, PortwayError> {
    let content = load_static(endpoint).map_err(PortwayError::from)?;

    let if_none_match = req.headers().get("if-none-match").and_then(|v| v.to_str().ok());
    let if_modified_since = req.headers().get("if-modified-since").and_then(|v| v.to_str().ok());
    if is_not_modified(&content.etag, content.last_modified, if_none_match, if_modified_since) {
        return Ok(StaticResponse::NotModified { etag: content.etag });
    }

    let body = if endpoint.enable_filtering && !query_pairs.is_empty() {
        let query = ODataQuery::parse(query_pairs).map_err(|e| PortwayError::bad_request(e.to_string()))?;
        apply_filtering(endpoint, &content.body, &query).map_err(PortwayError::from)?
    } else {
        content.body
    };

    Ok(StaticResponse::Ok {
        body,
        content_type: content.content_type,
        etag: content.etag,
        last_modified: httpdate::HttpDate::from(content.last_modified),
    })
}
