//! `Static` endpoint GET handling (`spec.md` §4.H): serves a descriptor's
//! payload file with conditional-GET support, and optional client-side
//! OData filtering over a top-level JSON array.

use std::time::SystemTime;

use portway_odata::ODataQuery;
use portway_registry::StaticEndpoint;
use sha2::{Digest, Sha256};

use crate::error::FileError;
use crate::filter_eval;

pub struct StaticContent {
    pub body: Vec<u8>,
    pub content_type: String,
    pub etag: String,
    pub last_modified: SystemTime,
}

pub fn etag_of(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("\"{}\"", hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// `true` when the client's cache is still fresh and the handler should
/// answer `304 Not Modified` instead of resending the body.
pub fn is_not_modified(etag: &str, last_modified: SystemTime, if_none_match: Option<&str>, if_modified_since: Option<&str>) -> bool {
    if let Some(candidate) = if_none_match {
        return candidate.split(',').map(str::trim).any(|c| c == etag || c == "*");
    }
    if let Some(since) = if_modified_since {
        if let Ok(since) = httpdate::parse_http_date(since) {
            return last_modified <= since;
        }
    }
    false
}

pub fn load(endpoint: &StaticEndpoint) -> Result<StaticContent, FileError> {
    let bytes = std::fs::read(&endpoint.path)?;
    let metadata = std::fs::metadata(&endpoint.path)?;
    let last_modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
    Ok(StaticContent {
        etag: etag_of(&bytes),
        content_type: endpoint.content_type.clone(),
        body: bytes,
        last_modified,
    })
}

/// When `EnableFiltering` is set and the content type is JSON, applies
/// `$select`/`$filter`/`$orderby`/`$top`/`$skip` over the top-level array
/// and re-serialises. Non-JSON content, or filtering left unrequested,
/// passes through untouched.
pub fn apply_filtering(
    endpoint: &StaticEndpoint,
    body: &[u8],
    query: &ODataQuery,
) -> Result<Vec<u8>, FileError> {
    if !endpoint.enable_filtering || !endpoint.content_type.contains("json") {
        return Ok(body.to_vec());
    }
    let parsed: serde_json::Value = serde_json::from_slice(body).map_err(|e| FileError::Storage(e.to_string()))?;
    let Some(rows) = parsed.as_array() else {
        return Ok(body.to_vec());
    };
    let filtered = filter_eval::apply(rows, query);
    serde_json::to_vec(&filtered).map_err(|e| FileError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portway_odata::parse_filter;
    use portway_registry::EndpointMeta;
    use serde_json::Map;

    fn endpoint(path: &std::path::Path) -> StaticEndpoint {
        StaticEndpoint {
            meta: EndpointMeta {
                name: "Catalog".to_owned(),
                namespace: None,
                allowed_methods: vec![],
                is_private: false,
                extra: Map::new(),
            },
            content_type: "application/json".to_owned(),
            path: path.to_string_lossy().into_owned(),
            enable_filtering: true,
        }
    }

    #[test]
    fn etag_is_stable_for_identical_bytes() {
        assert_eq!(etag_of(b"hello"), etag_of(b"hello"));
        assert_ne!(etag_of(b"hello"), etag_of(b"world"));
    }

    #[test]
    fn if_none_match_with_a_matching_etag_is_not_modified() {
        let etag = etag_of(b"hello");
        assert!(is_not_modified(&etag, SystemTime::now(), Some(&etag), None));
    }

    #[test]
    fn if_none_match_with_a_different_etag_is_modified() {
        let etag = etag_of(b"hello");
        assert!(!is_not_modified(&etag, SystemTime::now(), Some("\"other\""), None));
    }

    #[test]
    fn filters_a_json_array_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, br#"[{"Code":"A1"},{"Code":"B2"}]"#).unwrap();
        let endpoint = endpoint(&path);

        let mut query = ODataQuery::default();
        query.filter = Some(parse_filter("Code eq 'B2'").unwrap());

        let content = load(&endpoint).unwrap();
        let filtered = apply_filtering(&endpoint, &content.body, &query).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&filtered).unwrap();
        assert_eq!(value, serde_json::json!([{"Code": "B2"}]));
    }
}
