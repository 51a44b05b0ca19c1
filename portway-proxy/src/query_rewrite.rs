//! Query-string rewriting for proxied `GET` requests (`spec.md` §4.F):
//! `$top` defaults to 10 when absent, and `$filter`/`$orderby`/`$select`
//! are translated from the endpoint's declared aliases to the upstream's
//! own field names when `AllowedColumns` is non-empty.

use portway_odata::{ast::Expr, parse_filter, ColumnMap, Literal};

fn render_literal(value: &Literal) -> String {
    match value {
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
        Literal::Number(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Literal::DateTime(s) | Literal::Guid(s) => s.clone(),
        Literal::Null => "null".to_owned(),
        Literal::Bool(b) => b.to_string(),
    }
}

/// Re-emits `expr` as OData text (not SQL) with every field identifier
/// renamed from its alias to the upstream's own column name.
fn render_expr(expr: &Expr, columns: &ColumnMap) -> String {
    match expr {
        Expr::Compare { field, op, value } => {
            let upstream_field = columns.db_column(field).unwrap_or(field);
            format!(
                "{upstream_field} {} {}",
                match op {
                    portway_odata::CompareOp::Eq => "eq",
                    portway_odata::CompareOp::Ne => "ne",
                    portway_odata::CompareOp::Lt => "lt",
                    portway_odata::CompareOp::Le => "le",
                    portway_odata::CompareOp::Gt => "gt",
                    portway_odata::CompareOp::Ge => "ge",
                },
                render_literal(value)
            )
        }
        Expr::And(a, b) => format!("({} and {})", render_expr(a, columns), render_expr(b, columns)),
        Expr::Or(a, b) => format!("({} or {})", render_expr(a, columns), render_expr(b, columns)),
        Expr::Not(a) => format!("not ({})", render_expr(a, columns)),
    }
}

pub fn translate_filter(raw: &str, columns: &ColumnMap) -> Result<String, portway_odata::ODataError> {
    let expr = parse_filter(raw)?;
    Ok(render_expr(&expr, columns))
}

pub fn translate_csv_fields(raw: &str, columns: &ColumnMap) -> String {
    raw.split(',')
        .map(str::trim)
        .map(|term| {
            let mut parts = term.splitn(2, char::is_whitespace);
            let field = parts.next().unwrap_or("");
            let rest = parts.next();
            let translated = columns.db_column(field).unwrap_or(field);
            match rest {
                Some(suffix) => format!("{translated} {suffix}"),
                None => translated.to_owned(),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Rewrites a proxied `GET` request's query pairs: `$top` defaults to 10,
/// and `$filter`/`$orderby`/`$select` are alias-translated when `columns`
/// is non-empty.
pub fn rewrite_query(
    pairs: &[(String, String)],
    columns: &ColumnMap,
) -> Result<Vec<(String, String)>, portway_odata::ODataError> {
    let has_top = pairs.iter().any(|(k, _)| k == "$top");
    let translate = columns.aliases().next().is_some();

    let mut out = Vec::with_capacity(pairs.len() + 1);
    for (key, value) in pairs {
        let rewritten = match key.as_str() {
            "$filter" if translate => translate_filter(value, columns)?,
            "$select" | "$orderby" if translate => translate_csv_fields(value, columns),
            _ => value.clone(),
        };
        out.push((key.clone(), rewritten));
    }
    if !has_top {
        out.push(("$top".to_owned(), "10".to_owned()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> ColumnMap {
        ColumnMap::new([("Code".to_owned(), "ItemCode".to_owned())])
    }

    #[test]
    fn defaults_top_to_ten_when_absent() {
        let out = rewrite_query(&[], &ColumnMap::new(Vec::<(String, String)>::new())).unwrap();
        assert_eq!(out, vec![("$top".to_owned(), "10".to_owned())]);
    }

    #[test]
    fn leaves_top_alone_when_present() {
        let pairs = vec![("$top".to_owned(), "5".to_owned())];
        let out = rewrite_query(&pairs, &ColumnMap::new(Vec::<(String, String)>::new())).unwrap();
        assert_eq!(out, pairs);
    }

    #[test]
    fn translates_filter_field_names_when_columns_declared() {
        let pairs = vec![("$filter".to_owned(), "Code eq 'A1'".to_owned())];
        let out = rewrite_query(&pairs, &columns()).unwrap();
        assert_eq!(out[0].1, "ItemCode eq 'A1'");
    }

    #[test]
    fn passes_filter_through_unchanged_without_column_aliases() {
        let pairs = vec![("$filter".to_owned(), "Code eq 'A1'".to_owned())];
        let out = rewrite_query(&pairs, &ColumnMap::new(Vec::<(String, String)>::new())).unwrap();
        assert_eq!(out[0].1, "Code eq 'A1'");
    }
}
