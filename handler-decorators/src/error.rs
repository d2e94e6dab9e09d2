//! Error types and HTTP response conversion
//!
//! Two families live here:
//!
//! - [`ServerError`]: a classified, request-time failure produced by a handler or
//!   one of the decorator layers. Carries an [`ErrorKind`] that maps to a fixed
//!   HTTP status.
//! - [`Error`]: setup and infrastructure failures (configuration, secret loading,
//!   Redis pool creation) raised while wiring a chain together.

use std::{fmt, sync::Arc};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity recorded on errors raised without a resolved caller
pub const UNKNOWN_WHO: &str = "unknown";

/// Classification of a request-time failure
///
/// Each variant has a fixed transport status and display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unclassified internal failure (500)
    MissingErrorCode,
    /// Malformed caller input (400)
    BadRequest,
    /// Missing or invalid credential (401)
    Unauthorized,
    /// Valid credential, insufficient privilege (403)
    Forbidden,
    /// Resource not found (404)
    NotFound,
}

impl ErrorKind {
    /// HTTP status code for this kind
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::MissingErrorCode => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Fixed display name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MissingErrorCode => "MissingErrorCode",
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "NotFound",
        }
    }

    fn response_code(&self) -> &'static str {
        match self {
            Self::MissingErrorCode => "INTERNAL_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Underlying cause attached to a [`ServerError`]
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A classified request-time error
///
/// Immutable once built. `when` is stamped at construction and `who` falls back
/// to `"unknown"` when no caller identity was resolved.
#[derive(Debug, Clone)]
pub struct ServerError {
    when: DateTime<Utc>,
    what: String,
    who: String,
    code: ErrorKind,
    source: Option<ErrorSource>,
}

impl ServerError {
    /// Create a new error without an underlying cause
    pub fn new(what: impl Into<String>, who: Option<&str>, code: ErrorKind) -> Self {
        let who = match who {
            Some(w) if !w.is_empty() => w.to_string(),
            _ => UNKNOWN_WHO.to_string(),
        };

        Self {
            when: Utc::now(),
            what: what.into(),
            who,
            code,
            source: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Shorthand for a `BadRequest` error
    pub fn bad_request(what: impl Into<String>, who: Option<&str>) -> Self {
        Self::new(what, who, ErrorKind::BadRequest)
    }

    /// Shorthand for an `Unauthorized` error
    pub fn unauthorized(what: impl Into<String>, who: Option<&str>) -> Self {
        Self::new(what, who, ErrorKind::Unauthorized)
    }

    /// Shorthand for a `Forbidden` error
    pub fn forbidden(what: impl Into<String>, who: Option<&str>) -> Self {
        Self::new(what, who, ErrorKind::Forbidden)
    }

    /// Shorthand for a `NotFound` error
    pub fn not_found(what: impl Into<String>, who: Option<&str>) -> Self {
        Self::new(what, who, ErrorKind::NotFound)
    }

    /// Shorthand for an unclassified internal error
    pub fn internal(what: impl Into<String>, who: Option<&str>) -> Self {
        Self::new(what, who, ErrorKind::MissingErrorCode)
    }

    pub fn when(&self) -> DateTime<Utc> {
        self.when
    }

    pub fn what(&self) -> &str {
        &self.what
    }

    pub fn who(&self) -> &str {
        &self.who
    }

    pub fn code(&self) -> ErrorKind {
        self.code
    }

    /// Transport status for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Error {} for user '{}' -- {}",
            self.when.to_rfc3339(),
            self.code,
            self.who,
            self.what
        )?;
        if let Some(source) = &self.source {
            write!(f, " -- {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.http_status();

        // Internal details stay in the logs
        let message = match self.code {
            ErrorKind::MissingErrorCode => {
                tracing::error!(who = %self.who, "{}", self);
                "Internal server error".to_string()
            }
            _ => {
                tracing::debug!(who = %self.who, code = %self.code, "{}", self.what);
                self.what
            }
        };

        let body = ErrorResponse::with_code(status, self.code.response_code(), message);
        (status, Json(body)).into_response()
    }
}

/// Result type alias using the framework error
pub type Result<T> = std::result::Result<T, Error>;

/// Setup and infrastructure errors
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// JWT error
    #[error("JWT error: {0}")]
    Jwt(Box<jsonwebtoken::errors::Error>),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Jwt(Box::new(err))
    }
}
