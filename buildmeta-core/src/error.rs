//! Error types for buildmeta core.

use std::{error::Error, fmt};

/// Error type for metadata operations.
///
/// Lookups that find nothing are not errors: they come back as `None` or an
/// empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The caller passed a value the operation cannot act on.
    InvalidInput(String),
    /// The backing store could not be reached or failed to run a statement.
    StorageUnavailable(String),
    /// A write was rejected by a constraint or could not be committed.
    IntegrityViolation(String),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::StorageUnavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::IntegrityViolation(message) => write!(f, "integrity violation: {message}"),
        }
    }
}

impl Error for MetadataError {}

/// Convenience result type for buildmeta core.
pub type Result<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::MetadataError;

    #[test]
    fn invalid_input_formats_message() {
        let error = MetadataError::InvalidInput("user name is empty".to_string());
        assert_eq!(format!("{error}"), "invalid input: user name is empty");
    }

    #[test]
    fn storage_errors_format_message() {
        let error = MetadataError::StorageUnavailable("connection refused".to_string());
        assert_eq!(format!("{error}"), "storage unavailable: connection refused");

        let error = MetadataError::IntegrityViolation("issue 4 does not exist".to_string());
        assert_eq!(format!("{error}"), "integrity violation: issue 4 does not exist");
    }
}
