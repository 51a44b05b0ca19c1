//! Parsing for the non-`$filter` query options: `$select`, `$orderby`,
//! `$top`, `$skip`.

use crate::error::ODataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByTerm {
    pub field: String,
    pub direction: SortDirection,
}

pub fn parse_select(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn parse_orderby(raw: &str) -> Result<Vec<OrderByTerm>, ODataError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|term| {
            let mut parts = term.split_whitespace();
            let field = parts
                .next()
                .ok_or_else(|| ODataError::OrderBySyntax(term.to_owned()))?
                .to_owned();
            let direction = match parts.next() {
                None => SortDirection::Asc,
                Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                Some(other) => {
                    return Err(ODataError::OrderBySyntax(format!(
                        "unknown sort direction `{other}`"
                    )))
                }
            };
            if parts.next().is_some() {
                return Err(ODataError::OrderBySyntax(term.to_owned()));
            }
            Ok(OrderByTerm { field, direction })
        })
        .collect()
}

pub fn parse_top(raw: &str) -> Result<u32, ODataError> {
    raw.parse::<u32>().map_err(|_| ODataError::InvalidTop)
}

pub fn parse_skip(raw: &str) -> Result<u32, ODataError> {
    raw.parse::<u32>().map_err(|_| ODataError::InvalidSkip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select_list() {
        assert_eq!(
            parse_select(" Id, Name ,Code"),
            vec!["Id".to_owned(), "Name".to_owned(), "Code".to_owned()]
        );
    }

    #[test]
    fn parses_orderby_with_explicit_and_default_direction() {
        let terms = parse_orderby("Name desc, Id").unwrap();
        assert_eq!(
            terms,
            vec![
                OrderByTerm {
                    field: "Name".to_owned(),
                    direction: SortDirection::Desc
                },
                OrderByTerm {
                    field: "Id".to_owned(),
                    direction: SortDirection::Asc
                },
            ]
        );
    }

    #[test]
    fn rejects_bad_top_and_skip() {
        assert_eq!(parse_top("-1"), Err(ODataError::InvalidTop));
        assert_eq!(parse_skip("abc"), Err(ODataError::InvalidSkip));
    }
}
