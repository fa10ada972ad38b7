//! Error types for query operations

use thiserror::Error;

/// Main error type for cube query operations
#[derive(Error, Debug)]
pub enum Error {
    /// The caller supplied an invalid request: unknown axis, out-of-range
    /// lineno, malformed fence point, unsupported vertical unit and so on.
    #[error("{0}")]
    BadRequest(String),

    /// The backing store or a downstream computation failed at runtime.
    #[error("{0}")]
    Runtime(String),

    /// An engine invariant was breached. Indicates a programming error, not
    /// a problem with the request or the data.
    #[error("{0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Specialized Result type for query operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// HTTP status code the surrounding service should map this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::BadRequest(_) => 400,
            _ => 500,
        }
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::BadRequest(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::bad_request("Invalid lineno: 7").http_status(), 400);
        assert_eq!(
            Error::runtime("Failed to read from volume source").http_status(),
            500
        );
        assert_eq!(Error::internal("offset table out of sync").http_status(), 500);
    }

    #[test]
    fn test_message_passthrough() {
        let err = Error::bad_request("Invalid lineno: 7, valid range: [1:5:2]");
        assert_eq!(err.to_string(), "Invalid lineno: 7, valid range: [1:5:2]");
    }
}
