//! Client-side evaluation of an already-parsed `$filter`/`$orderby`/`$select`
//! query over a JSON array, for `Static` endpoints with `EnableFiltering`
//! (`spec.md` §4.H). The SQL endpoints compile the same AST to SQL text
//! (`portway_odata::compiler`); here there is no database, so the AST is
//! interpreted directly against each row.

use portway_odata::{CompareOp, Expr, Literal, ODataQuery, SortDirection};
use serde_json::Value;

fn literal_matches(row_value: Option<&Value>, op: CompareOp, literal: &Literal) -> bool {
    let row_value = match row_value {
        Some(v) => v,
        None => return matches!((op, literal), (CompareOp::Eq, Literal::Null)),
    };

    match literal {
        Literal::Null => match op {
            CompareOp::Eq => row_value.is_null(),
            CompareOp::Ne => !row_value.is_null(),
            _ => false,
        },
        Literal::Bool(b) => row_value.as_bool().map(|rv| compare_bool(rv, op, *b)).unwrap_or(false),
        Literal::Number(n) => row_value.as_f64().map(|rv| compare_f64(rv, op, *n)).unwrap_or(false),
        Literal::String(s) | Literal::DateTime(s) | Literal::Guid(s) => {
            row_value.as_str().map(|rv| compare_str(rv, op, s)).unwrap_or(false)
        }
    }
}

fn compare_bool(a: bool, op: CompareOp, b: bool) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        _ => false,
    }
}

fn compare_f64(a: f64, op: CompareOp, b: f64) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    }
}

fn compare_str(a: &str, op: CompareOp, b: &str) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    }
}

fn eval(expr: &Expr, row: &Value) -> bool {
    match expr {
        Expr::Compare { field, op, value } => literal_matches(row.get(field), *op, value),
        Expr::And(a, b) => eval(a, row) && eval(b, row),
        Expr::Or(a, b) => eval(a, row) || eval(b, row),
        Expr::Not(a) => !eval(a, row),
    }
}

fn project(row: &Value, select: &[String]) -> Value {
    if select.is_empty() {
        return row.clone();
    }
    let mut out = serde_json::Map::new();
    for field in select {
        if let Some(v) = row.get(field) {
            out.insert(field.clone(), v.clone());
        }
    }
    Value::Object(out)
}

/// Applies `$filter`/`$orderby`/`$select`/`$top`/`$skip` to a top-level JSON
/// array, in that order. Rows with a missing sort field sort last.
pub fn apply(rows: &[Value], query: &ODataQuery) -> Vec<Value> {
    let mut filtered: Vec<&Value> = match &query.filter {
        Some(expr) => rows.iter().filter(|row| eval(expr, row)).collect(),
        None => rows.iter().collect(),
    };

    for term in query.orderby.iter().rev() {
        filtered.sort_by(|a, b| {
            let av = a.get(&term.field);
            let bv = b.get(&term.field);
            let ordering = compare_json_opt(av, bv);
            match term.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }

    let skip = query.skip.unwrap_or(0) as usize;
    let page: Vec<&Value> = filtered.into_iter().skip(skip).collect();
    let page: Vec<&Value> = match query.top {
        Some(top) => page.into_iter().take(top as usize).collect(),
        None => page,
    };

    page.into_iter().map(|row| project(row, &query.select)).collect()
}

fn compare_json_opt(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            } else {
                a.as_str().unwrap_or_default().cmp(b.as_str().unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portway_odata::parse_filter;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"Code": "A1", "Price": 10}),
            json!({"Code": "B2", "Price": 30}),
            json!({"Code": "C3", "Price": 20}),
        ]
    }

    #[test]
    fn filters_by_equality() {
        let mut query = ODataQuery::default();
        query.filter = Some(parse_filter("Code eq 'B2'").unwrap());
        let result = apply(&rows(), &query);
        assert_eq!(result, vec![json!({"Code": "B2", "Price": 30})]);
    }

    #[test]
    fn orders_and_pages_results() {
        let mut query = ODataQuery::default();
        query.orderby = vec![portway_odata::OrderByTerm {
            field: "Price".to_owned(),
            direction: SortDirection::Asc,
        }];
        query.top = Some(2);
        let result = apply(&rows(), &query);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["Code"], json!("A1"));
        assert_eq!(result[1]["Code"], json!("C3"));
    }

    #[test]
    fn projects_only_the_selected_fields() {
        let mut query = ODataQuery::default();
        query.select = vec!["Code".to_owned()];
        let result = apply(&rows(), &query);
        assert_eq!(result[0], json!({"Code": "A1"}));
    }
}
