//! Alias-checked, parameterised SQL emission (`spec.md` §4.D). Takes the
//! `Expr` AST plus the endpoint's `alias -> db` column map and produces SQL
//! text with `@p0, @p1, …` placeholders alongside an ordered parameter
//! list — never a spliced string.

use crate::ast::{Expr, Literal};
use crate::error::ODataError;
use crate::query::{OrderByTerm, SortDirection};

/// `alias -> db` and `db -> alias` built from an endpoint's `AllowedColumns`.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    alias_to_db: Vec<(String, String)>,
}

impl ColumnMap {
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            alias_to_db: pairs.into_iter().collect(),
        }
    }

    pub fn db_column(&self, alias: &str) -> Option<&str> {
        self.alias_to_db
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, db)| db.as_str())
    }

    pub fn alias(&self, db: &str) -> Option<&str> {
        self.alias_to_db
            .iter()
            .find(|(_, d)| d == db)
            .map(|(a, _)| a.as_str())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.alias_to_db.iter().map(|(a, _)| a.as_str())
    }
}

#[derive(Debug)]
pub struct CompiledFilter {
    pub sql: String,
    pub params: Vec<Literal>,
}

/// Emits a `WHERE`-clause fragment (no leading `WHERE`) plus the ordered
/// parameter list, validating every field against `columns` first so an
/// unmapped reference fails with [`ODataError::UnknownField`] instead of
/// reaching the driver.
pub fn compile_filter(expr: &Expr, columns: &ColumnMap) -> Result<CompiledFilter, ODataError> {
    for field in expr.field_names() {
        if columns.db_column(field).is_none() {
            return Err(ODataError::UnknownField(field.to_owned()));
        }
    }
    let mut params = Vec::new();
    let sql = emit_expr(expr, columns, &mut params)?;
    Ok(CompiledFilter { sql, params })
}

fn emit_expr(
    expr: &Expr,
    columns: &ColumnMap,
    params: &mut Vec<Literal>,
) -> Result<String, ODataError> {
    match expr {
        Expr::Compare { field, op, value } => {
            let db = columns
                .db_column(field)
                .ok_or_else(|| ODataError::UnknownField(field.clone()))?;
            if matches!(value, Literal::Null) {
                let operator = match op.sql_operator() {
                    "=" => "IS NULL",
                    "<>" => "IS NOT NULL",
                    _ => {
                        return Err(ODataError::FilterSyntax(
                            "null only supports eq/ne".to_owned(),
                        ))
                    }
                };
                return Ok(format!("[{db}] {operator}"));
            }
            let placeholder = format!("@p{}", params.len());
            params.push(value.clone());
            Ok(format!("[{db}] {} {placeholder}", op.sql_operator()))
        }
        Expr::And(a, b) => Ok(format!(
            "({} AND {})",
            emit_expr(a, columns, params)?,
            emit_expr(b, columns, params)?
        )),
        Expr::Or(a, b) => Ok(format!(
            "({} OR {})",
            emit_expr(a, columns, params)?,
            emit_expr(b, columns, params)?
        )),
        Expr::Not(a) => Ok(format!("(NOT {})", emit_expr(a, columns, params)?)),
    }
}

/// `SELECT [db] AS [alias], …` projection list. Empty `$select` projects
/// every mapped column.
pub fn compile_projection(
    select: &[String],
    columns: &ColumnMap,
) -> Result<String, ODataError> {
    let aliases: Vec<&str> = if select.is_empty() {
        columns.aliases().collect()
    } else {
        for alias in select {
            if columns.db_column(alias).is_none() {
                return Err(ODataError::UnknownField(alias.clone()));
            }
        }
        select.iter().map(String::as_str).collect()
    };
    Ok(aliases
        .into_iter()
        .map(|alias| {
            let db = columns.db_column(alias).expect("validated above");
            format!("[{db}] AS [{alias}]")
        })
        .collect::<Vec<_>>()
        .join(", "))
}

/// `ORDER BY [db], …`; falls back to `fallback_pk` (the primary key's db
/// column) when `terms` is empty, so paging stays stable.
pub fn compile_orderby(
    terms: &[OrderByTerm],
    columns: &ColumnMap,
    fallback_pk: Option<&str>,
) -> Result<String, ODataError> {
    if terms.is_empty() {
        return Ok(match fallback_pk {
            Some(pk) => format!("ORDER BY [{pk}]"),
            None => String::new(),
        });
    }
    let mut parts = Vec::with_capacity(terms.len());
    for term in terms {
        let db = columns
            .db_column(&term.field)
            .ok_or_else(|| ODataError::UnknownField(term.field.clone()))?;
        let direction = match term.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        parts.push(format!("[{db}] {direction}"));
    }
    Ok(format!("ORDER BY {}", parts.join(", ")))
}

/// `OFFSET $skip ROWS FETCH NEXT $top ROWS ONLY`, with `$top` clamped to
/// `max_rows`.
pub fn compile_paging(top: Option<u32>, skip: Option<u32>, max_rows: u32) -> (String, u32, u32) {
    let effective_top = top.unwrap_or(max_rows).min(max_rows);
    let effective_skip = skip.unwrap_or(0);
    (
        format!("OFFSET {effective_skip} ROWS FETCH NEXT {effective_top} ROWS ONLY"),
        effective_top,
        effective_skip,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompareOp;
    use crate::parser::parse_filter;

    fn items_columns() -> ColumnMap {
        ColumnMap::new([
            ("Code".to_owned(), "ItemCode".to_owned()),
            ("Desc".to_owned(), "Description".to_owned()),
        ])
    }

    #[test]
    fn compiles_equality_filter_with_projection_and_paging() {
        let expr = parse_filter("Code eq 'A1'").unwrap();
        let columns = items_columns();
        let filter = compile_filter(&expr, &columns).unwrap();
        assert_eq!(filter.sql, "[ItemCode] = @p0");
        assert_eq!(filter.params, vec![Literal::String("A1".to_owned())]);

        let projection = compile_projection(&["Code".to_owned()], &columns).unwrap();
        assert_eq!(projection, "[ItemCode] AS [Code]");

        let orderby = compile_orderby(&[], &columns, Some("ItemCode")).unwrap();
        assert_eq!(orderby, "ORDER BY [ItemCode]");

        let (paging, top, skip) = compile_paging(Some(2), None, 1000);
        assert_eq!(paging, "OFFSET 0 ROWS FETCH NEXT 2 ROWS ONLY");
        assert_eq!((top, skip), (2, 0));
    }

    #[test]
    fn unknown_field_is_rejected_before_any_sql_is_emitted() {
        let expr = Expr::Compare {
            field: "NotMapped".to_owned(),
            op: CompareOp::Eq,
            value: Literal::Number(1.0),
        };
        let err = compile_filter(&expr, &items_columns()).unwrap_err();
        assert_eq!(err, ODataError::UnknownField("NotMapped".to_owned()));
    }

    #[test]
    fn every_placeholder_has_a_bound_parameter_p2() {
        let expr = parse_filter("Code eq 'A1' and Desc eq 'B2'").unwrap();
        let filter = compile_filter(&expr, &items_columns()).unwrap();
        let placeholder_count = filter.sql.matches('@').count();
        assert_eq!(placeholder_count, filter.params.len());
    }

    #[test]
    fn top_is_clamped_to_max_rows() {
        let (_, top, _) = compile_paging(Some(5000), None, 1000);
        assert_eq!(top, 1000);
    }
}
