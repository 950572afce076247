//! Error types for xmldbms
//!
//! This module defines all error types used throughout the library.
//! Every failure is wrapped into [`Error`] and propagated to the caller;
//! nothing is retried or partially recovered.

use std::fmt;
use thiserror::Error;

/// Result type alias using the xmldbms Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmldbms operations
#[derive(Error, Debug)]
pub enum Error {
    /// DTD or DDML could not be parsed
    #[error("DTD error: {0}")]
    Dtd(#[from] DtdError),

    /// The map cannot be built, or a map document is inconsistent
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// Actions document error
    #[error("actions error: {0}")]
    Actions(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Configuration (properties) error
    #[error("configuration error: {0}")]
    Config(String),

    /// Database error reported by a connection
    #[error("database error: {0}")]
    Database(String),

    /// Operation not available for this database
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// No pooled object is available
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing or writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap any displayable XML library error
    pub fn xml(err: impl fmt::Display) -> Self {
        Error::Xml(err.to_string())
    }
}

/// DTD parsing error with context
#[derive(Debug, Clone)]
pub struct DtdError {
    /// Error message
    pub message: String,
    /// Resource the declaration came from
    pub location: Option<String>,
    /// Declaration text that caused the error
    pub declaration: Option<String>,
}

impl DtdError {
    /// Create a new DTD error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            declaration: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the offending declaration
    pub fn with_declaration(mut self, declaration: impl Into<String>) -> Self {
        self.declaration = Some(declaration.into());
        self
    }
}

impl fmt::Display for DtdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        if let Some(ref decl) = self.declaration {
            write!(f, "\n\nDeclaration:\n{}", decl)?;
        }

        Ok(())
    }
}

impl std::error::Error for DtdError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtd_error_display() {
        let err = DtdError::new("Element type 'foo' declared more than once")
            .with_location("orders.dtd")
            .with_declaration("<!ELEMENT foo (#PCDATA)>");

        let msg = format!("{}", err);
        assert!(msg.contains("declared more than once"));
        assert!(msg.contains("Location: orders.dtd"));
        assert!(msg.contains("Declaration:"));
    }

    #[test]
    fn test_error_conversion() {
        let dtd_err = DtdError::new("test");
        let err: Error = dtd_err.into();
        assert!(matches!(err, Error::Dtd(_)));
    }

    #[test]
    fn test_xml_helper() {
        let err = Error::xml("unexpected end of input");
        assert_eq!(err.to_string(), "XML error: unexpected end of input");
    }
}
