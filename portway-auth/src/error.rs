use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("management record is locked until {0}")]
    Locked(i64),
    #[error("invalid passphrase")]
    InvalidPassphrase,
    #[error("token not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<diesel::result::Error> for AuthError {
    fn from(e: diesel::result::Error) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for AuthError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        AuthError::Storage(e.to_string())
    }
}
