//! Error types for pvedisk

use thiserror::Error;

/// Result type alias using the pvedisk Error
pub type Result<T> = std::result::Result<T, Error>;

/// pvedisk error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Malformed identifier {id:?}: {reason}")]
    MalformedId { id: String, reason: String },

    #[error("Missing required argument: {0}")]
    MissingAttribute(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("Cannot update a {kind} in-place")]
    UpdateNotSupported { kind: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the remote side reported that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Http(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn malformed_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_attribute(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidAttribute {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The attribute this error refers to, if any
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Error::MissingAttribute(name) => Some(name),
            Error::InvalidAttribute { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(Error::not_found("datastore file", "local:vm-1-a").is_not_found());
        assert!(!Error::Api {
            status: 500,
            message: "boom".to_string()
        }
        .is_not_found());
        assert!(!Error::Internal("x".to_string()).is_not_found());
    }

    #[test]
    fn test_update_message() {
        let err = Error::UpdateNotSupported {
            kind: "disk".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot update a disk in-place");
    }

    #[test]
    fn test_attribute_of_validation_errors() {
        assert_eq!(
            Error::MissingAttribute("size".to_string()).attribute(),
            Some("size")
        );
        assert_eq!(
            Error::invalid_attribute("vm_id", "must be positive").attribute(),
            Some("vm_id")
        );
        assert_eq!(Error::Internal("x".to_string()).attribute(), None);
    }
}
