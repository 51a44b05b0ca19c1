use thiserror::Error;

/// Errors that can fail loading a single descriptor. These never abort the
/// registry walk (`spec.md` §4.C): the offending endpoint is skipped and the
/// error recorded against its path.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor: {0}")]
    Io(String),
    #[error("invalid descriptor JSON: {0}")]
    Parse(String),
    #[error("required column `{0}` is not a known alias")]
    UnknownRequiredColumn(String),
    #[error("primary key must be set for endpoints supporting DELETE")]
    MissingPrimaryKeyForDelete,
    #[error("composite step names must be unique within an endpoint, duplicate: {0}")]
    DuplicateStepName(String),
    #[error("composite dependency graph has a cycle involving step `{0}`")]
    DependencyCycle(String),
    #[error("composite step `{0}` depends on unknown step `{1}`")]
    UnknownDependency(String, String),
    #[error("TVF path parameter positions must be 1-based and contiguous")]
    NonContiguousPathParameters,
}
