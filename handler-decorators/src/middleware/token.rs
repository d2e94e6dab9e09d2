//! Bearer credential abstraction
//!
//! Claims carried by a credential, the verifier seam used by the
//! [`Auth`](super::Auth) decorator, and `Authorization` header extraction.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Role value granting administrative access
pub const ADMIN_ROLE: &str = "Admin";

/// Name of the header carrying the credential
pub const AUTHORIZATION_HEADER: &str = "Authorization";

const BEARER_PREFIX: &str = "Bearer ";

/// Claims decoded from a verified credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Caller identity propagated to inner handlers
    pub username: String,

    /// Caller role, compared against [`ADMIN_ROLE`]
    #[serde(default, alias = "type")]
    pub role: String,

    /// Expiration time (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not before (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Token ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl Claims {
    /// Claims for `username` with `role` and no timing fields
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
            exp: None,
            iat: None,
            nbf: None,
            jti: None,
            iss: None,
            sub: None,
        }
    }

    pub fn with_expiry(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Verifies a credential and decodes its claims
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, Error>;
}

/// Credential carried in the `Authorization` header
///
/// A leading `Bearer ` is stripped when present; anything else is returned as
/// is. Missing, empty or non-UTF-8 headers yield `None`.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let raw = header?;
    let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);
    (!token.is_empty()).then_some(token)
}
