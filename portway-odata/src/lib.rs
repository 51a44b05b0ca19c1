//! OData Parser & SQL Compiler (`spec.md` §4.D): parses `$select`,
//! `$filter`, `$orderby`, `$top`, `$skip`, type-checks field references
//! against an endpoint's declared column aliases, and emits parameterised
//! SQL. Never performs a text rewrite of user input.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod parser;
pub mod query;
pub mod tvf;

pub use ast::{CompareOp, Expr, Literal};
pub use compiler::{compile_filter, compile_orderby, compile_paging, compile_projection,
    ColumnMap, CompiledFilter};
pub use error::ODataError;
pub use parser::parse_filter;
pub use query::{parse_orderby, parse_select, parse_skip, parse_top, OrderByTerm, SortDirection};
pub use tvf::{compile_call, CompiledCall, ParamValue, SqlType, TvfParamSpec};

/// The full set of OData query options accepted on a list request, already
/// parsed but not yet compiled against a particular endpoint's columns.
#[derive(Debug, Default)]
pub struct ODataQuery {
    pub select: Vec<String>,
    pub filter: Option<Expr>,
    pub orderby: Vec<OrderByTerm>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
}

impl ODataQuery {
    /// Parses from the raw `$`-prefixed query-string pairs; unrecognised
    /// keys are ignored so non-OData query parameters (e.g. TVF inputs)
    /// can share the same string.
    pub fn parse(pairs: &[(String, String)]) -> Result<ODataQuery, ODataError> {
        let mut query = ODataQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "$select" => query.select = parse_select(value),
                "$filter" => query.filter = Some(parse_filter(value)?),
                "$orderby" => query.orderby = parse_orderby(value)?,
                "$top" => query.top = Some(parse_top(value)?),
                "$skip" => query.skip = Some(parse_skip(value)?),
                _ => {}
            }
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_query_string() {
        let pairs = vec![
            ("$select".to_owned(), "Code".to_owned()),
            ("$top".to_owned(), "2".to_owned()),
            ("$filter".to_owned(), "Code eq 'A1'".to_owned()),
        ];
        let query = ODataQuery::parse(&pairs).unwrap();
        assert_eq!(query.select, vec!["Code".to_owned()]);
        assert_eq!(query.top, Some(2));
        assert!(query.filter.is_some());
    }

    #[test]
    fn unknown_query_keys_are_ignored() {
        let pairs = vec![("year".to_owned(), "2024".to_owned())];
        let query = ODataQuery::parse(&pairs).unwrap();
        assert!(query.filter.is_none());
    }
}
