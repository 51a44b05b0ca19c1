//! Header handling for the proxy forward (`spec.md` §4.F): hop-by-hop
//! stripping, `HeaderAppend` placeholder substitution, and the
//! `HeaderConflictPolicy` applied against headers the client already sent.

use portway_registry::{HeaderConflictPolicy, HeaderEntry};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// RFC 7230 §6.1 hop-by-hop headers: meaningful only for one transport hop,
/// never forwarded by an intermediary.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn substitute_placeholders(value: &str, original_method: &str, translated_method: &str) -> String {
    value
        .replace("{ORIGINAL_METHOD}", original_method)
        .replace("{TRANSLATED_METHOD}", translated_method)
}

/// Applies one `HeaderAppend` entry list for the original HTTP method,
/// honouring `policy` against headers already present on `headers`.
pub fn apply_header_append(
    headers: &mut HeaderMap,
    entries: &[HeaderEntry],
    original_method: &str,
    translated_method: &str,
    policy: HeaderConflictPolicy,
) {
    for entry in entries {
        let Ok(name) = HeaderName::from_bytes(entry.key.as_bytes()) else {
            log::warn!("skipping HeaderAppend entry with invalid header name `{}`", entry.key);
            continue;
        };
        let rendered = substitute_placeholders(&entry.value, original_method, translated_method);
        let Ok(value) = HeaderValue::from_str(&rendered) else {
            log::warn!("skipping HeaderAppend entry with invalid header value for `{}`", entry.key);
            continue;
        };

        let already_present = headers.contains_key(&name);
        match (already_present, policy) {
            (false, _) => {
                headers.append(name, value);
            }
            (true, HeaderConflictPolicy::Skip) => {}
            (true, HeaderConflictPolicy::Overwrite) => {
                headers.remove(&name);
                headers.append(name, value);
            }
            (true, HeaderConflictPolicy::LogAndAdd) => {
                log::info!("header `{}` present on both client request and HeaderAppend; adding a second value", name);
                headers.append(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_connection_and_transfer_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));
        strip_hop_by_hop(&mut headers);
        assert!(!headers.contains_key("connection"));
        assert!(!headers.contains_key("transfer-encoding"));
        assert!(headers.contains_key("x-custom"));
    }

    #[test]
    fn skip_policy_does_not_overwrite_existing_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("client-value"));
        apply_header_append(
            &mut headers,
            &[HeaderEntry {
                key: "x-api-key".to_owned(),
                value: "server-value".to_owned(),
            }],
            "GET",
            "GET",
            HeaderConflictPolicy::Skip,
        );
        assert_eq!(headers.get("x-api-key").unwrap(), "client-value");
    }

    #[test]
    fn overwrite_policy_replaces_existing_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("client-value"));
        apply_header_append(
            &mut headers,
            &[HeaderEntry {
                key: "x-api-key".to_owned(),
                value: "server-value".to_owned(),
            }],
            "GET",
            "GET",
            HeaderConflictPolicy::Overwrite,
        );
        assert_eq!(headers.get("x-api-key").unwrap(), "server-value");
    }

    #[test]
    fn placeholder_tokens_are_substituted() {
        let mut headers = HeaderMap::new();
        apply_header_append(
            &mut headers,
            &[HeaderEntry {
                key: "x-original-method".to_owned(),
                value: "{ORIGINAL_METHOD}->{TRANSLATED_METHOD}".to_owned(),
            }],
            "PATCH",
            "PUT",
            HeaderConflictPolicy::Skip,
        );
        assert_eq!(headers.get("x-original-method").unwrap(), "PATCH->PUT");
    }
}
