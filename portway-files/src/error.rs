use portway_common::PortwayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("extension not allowed: {0}")]
    ExtensionNotAllowed(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("file not found")]
    NotFound,
    #[error("file already exists; pass overwrite=true to replace it")]
    AlreadyExists,
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Filter(#[from] portway_odata::ODataError),
}

impl From<std::io::Error> for FileError {
    fn from(e: std::io::Error) -> Self {
        FileError::Storage(e.to_string())
    }
}

impl From<FileError> for PortwayError {
    fn from(e: FileError) -> Self {
        match e {
            FileError::ExtensionNotAllowed(ext) => {
                PortwayError::forbidden(format!("extension not allowed: {ext}"))
            }
            FileError::PayloadTooLarge => PortwayError::payload_too_large(e.to_string()),
            FileError::NotFound => PortwayError::not_found(e.to_string()),
            FileError::AlreadyExists => PortwayError::conflict(e.to_string()),
            FileError::Storage(msg) => PortwayError::internal(msg),
            FileError::Filter(odata) => PortwayError::bad_request(odata.to_string()),
        }
    }
}
