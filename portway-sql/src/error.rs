use portway_common::PortwayError;
use portway_odata::ODataError;
use serde::Serialize;
use thiserror::Error;

/// One `AllowedColumns`/`RequiredColumns`/`ColumnValidation` failure, shaped
/// for the `details` array of `spec.md` §8 scenario 2's response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("odata: {0}")]
    OData(#[from] ODataError),
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("primary key required for this operation")]
    PrimaryKeyRequired,
    #[error("not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    Conflict(String),
    #[error("driver timeout")]
    Timeout,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for SqlError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => SqlError::Timeout,
            sqlx::Error::RowNotFound => SqlError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                    SqlError::Conflict(sanitize(db_err.message()))
                } else {
                    SqlError::Storage(sanitize(db_err.message()))
                }
            }
            other => SqlError::Storage(other.to_string()),
        }
    }
}

/// Constraint-violation messages from the driver can embed raw values from
/// the failed statement; keep only the shape of the error, not the data.
fn sanitize(message: &str) -> String {
    message
        .split_whitespace()
        .take(12)
        .collect::<Vec<_>>()
        .join(" ")
}

impl From<SqlError> for PortwayError {
    fn from(err: SqlError) -> Self {
        match err {
            SqlError::OData(ODataError::UnknownField(f)) => {
                PortwayError::bad_request(format!("unknown field {f}"))
            }
            SqlError::OData(other) => PortwayError::bad_request(other.to_string()),
            SqlError::Validation(fields) => PortwayError::unprocessable("Validation failed")
                .with_details(serde_json::to_value(fields).unwrap_or(serde_json::Value::Null)),
            SqlError::PrimaryKeyRequired => {
                PortwayError::bad_request("primary key required for this operation")
            }
            SqlError::NotFound => PortwayError::not_found("resource not found"),
            SqlError::Conflict(msg) => PortwayError::conflict(msg),
            SqlError::Timeout => PortwayError::unavailable("database unavailable"),
            SqlError::Storage(msg) => PortwayError::internal(msg),
        }
    }
}
