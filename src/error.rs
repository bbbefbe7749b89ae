//! Error handling for the LexCRM client

use std::fmt;
use thiserror::Error;

/// Coarse classification of a failed API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 400 and 422: the request body or parameters were rejected
    Validation,
    /// 401
    Authentication,
    /// 403
    Authorization,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// 429
    RateLimited,
    /// 5xx
    Server,
    /// Any other non-success status
    Other,
}

impl ErrorKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Other,
        }
    }
}

/// Unified error type for the LexCRM client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JWT decoding errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Session store errors
    #[error("Storage error: {0}")]
    Storage(#[from] lexcrm_storage::StorageError),

    /// The server answered with a non-success status
    #[error("{message}")]
    Api {
        status: u16,
        kind: ErrorKind,
        message: String,
    },

    /// Authentication errors that did not come from an HTTP status
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The operation needs a session and there is none
    #[error("Not logged in")]
    MissingSession,

    /// A record was not found in the demo dataset
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend is unreachable and demo fallback is disabled
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create an API error for `status`
    pub fn api<T: fmt::Display>(status: u16, msg: T) -> Self {
        Error::Api {
            status,
            kind: ErrorKind::from_status(status),
            message: msg.to_string(),
        }
    }

    /// The API error class, if this error came from an HTTP status
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Api { kind, .. } => Some(*kind),
            Error::NotFound(_) => Some(ErrorKind::NotFound),
            Error::Auth(_) | Error::MissingSession => Some(ErrorKind::Authentication),
            _ => None,
        }
    }

    /// The HTTP status, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure was a transport-level connection failure
    pub fn is_unreachable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect(),
            Error::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Authentication);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Authorization);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::Other);
    }

    #[test]
    fn test_api_error_display_is_message() {
        let err = Error::api(403, "Доступ заборонено");
        assert_eq!(err.to_string(), "Доступ заборонено");
        assert_eq!(err.kind(), Some(ErrorKind::Authorization));
        assert_eq!(err.status(), Some(403));
    }
}
