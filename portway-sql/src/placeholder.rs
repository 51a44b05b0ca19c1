//! `portway-odata` emits the dialect-neutral `@p0, @p1, …` placeholders
//! `spec.md` §4.D describes; `sqlx::Any` expects its own `?` convention and
//! rewrites it to whatever the connected backend actually needs. Since the
//! compiler already guarantees placeholders appear in the same left-to-right
//! order as the bound parameter list, a sequential textual swap is exact.

use regex::Regex;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@p\d+").expect("static pattern is valid"))
}

pub fn to_any_placeholders(sql: &str) -> String {
    placeholder_pattern().replace_all(sql, "?").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_in_place_preserving_order() {
        let sql = "[ItemCode] = @p0 AND [Qty] > @p1";
        assert_eq!(to_any_placeholders(sql), "[ItemCode] = ? AND [Qty] > ?");
    }
}
