//! Error types for bqlite.

use std::fmt;

use crate::wire::ErrorProto;

/// The main error type for bqlite operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// JSON encoding/decoding error
    Serialization(String),

    /// Source SQL could not be parsed in the warehouse dialect
    Parse(String),

    /// The embedded engine rejected a statement
    Engine(String),

    /// A referenced dataset, table or job does not exist
    NotFound(String),

    /// A dataset or table with the same name already exists
    AlreadyExists(String),

    /// Malformed request, schema or parameter
    InvalidInput(String),

    /// Statement shape this emulator does not support
    InvalidOperation(String),
}

impl Error {
    /// Warehouse error reason reported on the wire for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Parse(_) | Error::Engine(_) | Error::InvalidOperation(_) => "invalidQuery",
            Error::NotFound(_) => "notFound",
            Error::AlreadyExists(_) => "duplicate",
            Error::InvalidInput(_) => "invalid",
            Error::Io(_) | Error::Serialization(_) => "internalError",
        }
    }

    /// HTTP status a REST boundary should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::AlreadyExists(_) => 409,
            Error::Io(_) | Error::Serialization(_) => 500,
            _ => 400,
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Io(e) => e.to_string(),
            Error::Serialization(msg)
            | Error::Parse(msg)
            | Error::Engine(msg)
            | Error::NotFound(msg)
            | Error::AlreadyExists(msg)
            | Error::InvalidInput(msg)
            | Error::InvalidOperation(msg) => msg.clone(),
        }
    }

    /// Converts the error into a wire-format error entry.
    pub fn to_error_proto(&self) -> ErrorProto {
        ErrorProto {
            reason: self.reason().to_string(),
            location: String::new(),
            debug_info: String::new(),
            message: self.message(),
        }
    }

    /// True for errors that belong inside a query response rather than
    /// failing the request.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Error::Parse(_) | Error::Engine(_) | Error::InvalidOperation(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Parse(msg) => write!(f, "Syntax error: {}", msg),
            Error::Engine(msg) => write!(f, "Engine error: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::AlreadyExists(msg) => write!(f, "Already Exists: {}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Engine(err.to_string())
    }
}

/// A specialized `Result` type for bqlite operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_mapping() {
        assert_eq!(Error::Parse("x".into()).reason(), "invalidQuery");
        assert_eq!(Error::Engine("x".into()).reason(), "invalidQuery");
        assert_eq!(Error::NotFound("x".into()).reason(), "notFound");
        assert_eq!(Error::AlreadyExists("x".into()).reason(), "duplicate");
        assert_eq!(Error::NotFound("x".into()).http_status(), 404);
        assert_eq!(Error::AlreadyExists("x".into()).http_status(), 409);
    }

    #[test]
    fn test_error_proto() {
        let proto = Error::NotFound("Table p:d.t".into()).to_error_proto();
        assert_eq!(proto.reason, "notFound");
        assert_eq!(proto.message, "Table p:d.t");
        assert!(proto.location.is_empty());
    }

    #[test]
    fn test_display() {
        let err = Error::AlreadyExists("Table p:d.t".into());
        assert_eq!(err.to_string(), "Already Exists: Table p:d.t");
        assert!(Error::Engine("no such table".into()).is_query_error());
        assert!(!Error::NotFound("x".into()).is_query_error());
    }
}
