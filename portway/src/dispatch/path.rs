//! Path grammar (`spec.md` §4.I): `/<prefix>/<env>/(files/<endpoint>[/<rest>]
//! | webhook/<id> | composite/<endpoint> | <endpoint>[/<rest>])`.

use portway_registry::RegistrySnapshot;

#[derive(Debug, PartialEq)]
pub enum Route<'a> {
    Files { endpoint: &'a str, rest: Vec<&'a str> },
    Webhook { id: &'a str },
    Composite { endpoint: &'a str },
    Endpoint { full_path: String, rest: Vec<String> },
}

/// Strips the configured `path_prefix`, splits off the environment, and
/// classifies the remainder. `env` is returned separately since the caller
/// checks `Environment.Allowed` before anything else (`spec.md` §4.I step 1).
pub fn parse<'a>(prefix: &str, path: &'a str) -> Option<(&'a str, Vec<&'a str>)> {
    let trimmed = path.trim_start_matches('/');
    let trimmed = if prefix.is_empty() {
        trimmed
    } else {
        trimmed.strip_prefix(prefix.trim_matches('/'))?.trim_start_matches('/')
    };
    let mut segments = trimmed.split('/').filter(|s| !s.is_empty());
    let env = segments.next()?;
    Some((env, segments.collect()))
}

/// `Endpoint` lookups may themselves be namespaced (`Financial/Invoices`),
/// so the longest dotted-path prefix of the remaining segments that the
/// registry recognises wins; anything left over is the endpoint's `rest`
/// path (positional TVF parameters, proxy path segments, a record id).
pub fn classify<'a>(segments: &[&'a str], snapshot: &RegistrySnapshot) -> Option<Route<'a>> {
    match segments.first().copied() {
        Some("files") => {
            let endpoint = *segments.get(1)?;
            let rest = segments[2..].to_vec();
            Some(Route::Files { endpoint, rest })
        }
        Some("webhook") => {
            let id = *segments.get(1)?;
            Some(Route::Webhook { id })
        }
        Some("composite") => {
            let endpoint = *segments.get(1)?;
            Some(Route::Composite { endpoint })
        }
        Some(_) => {
            for split in (1..=segments.len()).rev() {
                let candidate = segments[..split].join("/");
                if snapshot.find(&candidate).is_some() {
                    let rest = segments[split..].iter().map(|s| s.to_string()).collect();
                    return Some(Route::Endpoint { full_path: candidate, rest });
                }
            }
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_a_configured_prefix_and_splits_the_environment() {
        let (env, rest) = parse("api", "/api/prod/Items").unwrap();
        assert_eq!(env, "prod");
        assert_eq!(rest, vec!["Items"]);
    }

    #[test]
    fn an_empty_prefix_is_a_no_op() {
        let (env, rest) = parse("", "/prod/Items/A1").unwrap();
        assert_eq!(env, "prod");
        assert_eq!(rest, vec!["Items", "A1"]);
    }

    #[test]
    fn classifies_files_webhook_and_composite_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = portway_registry::EndpointRegistry::load(dir.path());
        let snapshot = registry.current();

        assert_eq!(
            classify(&["files", "Invoices", "abc123"], &snapshot),
            Some(Route::Files { endpoint: "Invoices", rest: vec!["abc123"] })
        );
        assert_eq!(
            classify(&["webhook", "xyz"], &snapshot),
            Some(Route::Webhook { id: "xyz" })
        );
        assert_eq!(
            classify(&["composite", "SalesOrder"], &snapshot),
            Some(Route::Composite { endpoint: "SalesOrder" })
        );
    }
}
