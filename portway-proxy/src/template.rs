//! `{{expr}}` / `{{?expr}}` templating for composite `TemplateBody`
//! (`spec.md` §4.G): dot-path lookups into `$request` or `$stepName`,
//! numeric segments index into arrays. A whole-string match inserts the
//! resolved JSON value verbatim; a match inside a larger string
//! interpolates its text form.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ProxyError;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\?)?([^}]+)\}\}").expect("static pattern is valid"))
}

/// Resolves `$request.path.to.value` or `$stepName.path.to.value` against
/// the accumulated step context. A numeric path segment indexes an array.
/// The leading `$` is optional: `{{CreateOrder.Id}}` resolves the same as
/// `{{$CreateOrder.Id}}`.
pub fn resolve(ctx: &HashMap<String, Value>, expr: &str) -> Option<Value> {
    let expr = expr.trim();
    let mut parts = expr.split('.');
    let root = parts.next()?;
    let var = root.strip_prefix('$').unwrap_or(root);
    let mut current = ctx.get(var)?.clone();
    for part in parts {
        current = match part.parse::<usize>() {
            Ok(idx) => current.get(idx)?.clone(),
            Err(_) => current.get(part)?.clone(),
        };
    }
    Some(current)
}

fn value_to_interp_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_string(s: &str, ctx: &HashMap<String, Value>) -> Result<Value, ProxyError> {
    let re = pattern();
    let whole_match = re
        .captures(s)
        .filter(|c| c.get(0).map(|m| m.start() == 0 && m.end() == s.len()) == Some(true));

    if let Some(caps) = whole_match {
        let optional = caps.get(1).is_some();
        let expr = caps.get(2).unwrap().as_str();
        return match resolve(ctx, expr) {
            Some(value) => Ok(value),
            None if optional => Ok(Value::Null),
            None => Err(ProxyError::Template(format!("unresolved reference `{expr}`"))),
        };
    }

    let mut result = String::new();
    let mut last = 0;
    for caps in re.captures_iter(s) {
        let m = caps.get(0).unwrap();
        result.push_str(&s[last..m.start()]);
        let optional = caps.get(1).is_some();
        let expr = caps.get(2).unwrap().as_str();
        match resolve(ctx, expr) {
            Some(value) => result.push_str(&value_to_interp_text(&value)),
            None if optional => {}
            None => return Err(ProxyError::Template(format!("unresolved reference `{expr}`"))),
        }
        last = m.end();
    }
    result.push_str(&s[last..]);
    Ok(Value::String(result))
}

pub fn render(template: &Value, ctx: &HashMap<String, Value>) -> Result<Value, ProxyError> {
    match template {
        Value::String(s) => render_string(s, ctx),
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|v| render(v, ctx))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                rendered.insert(key.clone(), render(value, ctx)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> HashMap<String, Value> {
        let mut ctx = HashMap::new();
        ctx.insert("request".to_owned(), json!({"path": {"to": {"value": 42}}}));
        ctx.insert("createOrder".to_owned(), json!({"items": ["a", "b"]}));
        ctx
    }

    #[test]
    fn whole_string_match_inserts_json_value_not_a_string() {
        let rendered = render(&json!("{{$request.path.to.value}}"), &ctx()).unwrap();
        assert_eq!(rendered, json!(42));
    }

    #[test]
    fn step_reference_resolves_with_or_without_the_dollar_prefix() {
        let with_dollar = render(&json!("{{$createOrder.items.0}}"), &ctx()).unwrap();
        let bare = render(&json!("{{createOrder.items.0}}"), &ctx()).unwrap();
        assert_eq!(with_dollar, bare);
    }

    #[test]
    fn numeric_segment_indexes_an_array() {
        let rendered = render(&json!("{{$createOrder.items.1}}"), &ctx()).unwrap();
        assert_eq!(rendered, json!("b"));
    }

    #[test]
    fn embedded_reference_interpolates_as_text() {
        let rendered = render(&json!("value is {{$request.path.to.value}}!"), &ctx()).unwrap();
        assert_eq!(rendered, json!("value is 42!"));
    }

    #[test]
    fn missing_reference_without_optional_marker_fails_fast() {
        assert!(render(&json!("{{$missing.field}}"), &ctx()).is_err());
    }

    #[test]
    fn missing_reference_with_optional_marker_yields_null() {
        let rendered = render(&json!("{{?$missing.field}}"), &ctx()).unwrap();
        assert_eq!(rendered, Value::Null);
    }

    #[test]
    fn nested_objects_and_arrays_are_rendered_recursively() {
        let template = json!({"id": "{{$request.path.to.value}}", "tags": ["{{$createOrder.items.0}}"]});
        let rendered = render(&template, &ctx()).unwrap();
        assert_eq!(rendered, json!({"id": 42, "tags": ["a"]}));
    }
}
