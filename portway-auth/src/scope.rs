//! The wildcard grammar shared by `AllowedScopes` and `AllowedEnvironments`
//! (`spec.md` §3): a CSV of patterns, each one of
//!
//! - `*`                  matches anything
//! - `prefix*`            matches any string starting with `prefix`
//! - `namespace/*`        matches any endpoint under `namespace`
//! - `namespace/endpoint` matches exactly that full path
//! - `literal`            matches exactly that string (used for env names)

/// Parses a CSV pattern list, trimming whitespace and dropping empties.
pub fn parse_patterns(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// True if `candidate` matches at least one of `patterns` under the grammar
/// above.
pub fn matches_any(patterns: &[String], candidate: &str) -> bool {
    patterns.iter().any(|p| matches_one(p, candidate))
}

fn matches_one(pattern: &str, candidate: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return candidate.starts_with(prefix);
    }
    pattern == candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_everything() {
        assert!(matches_any(&parse_patterns("*"), "Financial/Invoices"));
    }

    #[test]
    fn prefix_star_matches_prefix() {
        let patterns = parse_patterns("Financial*");
        assert!(matches_any(&patterns, "Financial/Invoices"));
        assert!(!matches_any(&patterns, "HR/Staff"));
    }

    #[test]
    fn namespace_star_matches_namespace_only() {
        let patterns = parse_patterns("Financial/*");
        assert!(matches_any(&patterns, "Financial/Invoices"));
        assert!(!matches_any(&patterns, "HR/Staff"));
    }

    #[test]
    fn exact_endpoint_matches_only_itself() {
        let patterns = parse_patterns("Financial/Invoices");
        assert!(matches_any(&patterns, "Financial/Invoices"));
        assert!(!matches_any(&patterns, "Financial/Payments"));
    }

    #[test]
    fn scenario_4_financial_star_rejects_hr() {
        // spec.md §8 scenario 4: token scoped to "Financial/*" must not
        // reach "HR/Staff".
        let patterns = parse_patterns("Financial/*");
        assert!(!matches_any(&patterns, "HR/Staff"));
    }
}
