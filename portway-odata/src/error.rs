use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ODataError {
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("invalid $filter syntax: {0}")]
    FilterSyntax(String),
    #[error("invalid $orderby syntax: {0}")]
    OrderBySyntax(String),
    #[error("$top must be a non-negative integer")]
    InvalidTop,
    #[error("$skip must be a non-negative integer")]
    InvalidSkip,
}
