use thiserror::Error;

/// Failure to retrieve or understand a remote file's metadata.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("metadata endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("metadata endpoint returned status {0}")]
    Status(u16),

    #[error("malformed metadata: {0}")]
    Malformed(String),
}

/// A record type was registered for dispatch with an unusable configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("record type name must not be empty")]
    EmptyTypeName,

    #[error("no attachment field configured for {0}")]
    MissingAttachment(String),

    #[error("no change keys configured for {0}")]
    NoChangeKeys(String),

    #[error("{0} is already registered")]
    DuplicateType(String),
}
