//! Bearer credential decorator
//!
//! Resolves the caller identity from the `Authorization` header and hands it to
//! the wrapped handler. Usually listed last so it runs before every other layer.
//!
//! | policy      | no / bad credential        | valid credential                        |
//! |-------------|----------------------------|-----------------------------------------|
//! | `Public`    | keep incoming identity     | use credential username                 |
//! | `Protected` | `Unauthorized`             | use credential username                 |
//! | `Admin`     | `Unauthorized`             | `Forbidden` unless role is `Admin`      |

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    jwt::JwtVerifier,
    token::{bearer_token, Claims, TokenVerifier, AUTHORIZATION_HEADER},
};
use crate::{
    config::AuthConfig,
    decorate::Decorator,
    error::{Error, ServerError},
    handler::{BoxedHandler, Handler},
    request::{ApiRequest, Params},
};

/// How strictly a credential is required
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Resolve identity when a valid credential is present, never fail
    Public,
    /// Require a valid credential
    Protected,
    /// Require a valid credential carrying the admin role
    Admin,
}

/// Authentication decorator
#[derive(Clone)]
pub struct Auth {
    policy: AuthPolicy,
    verifier: Arc<dyn TokenVerifier>,
}

impl Auth {
    pub fn new<V>(policy: AuthPolicy, verifier: V) -> Self
    where
        V: TokenVerifier + 'static,
    {
        Self {
            policy,
            verifier: Arc::new(verifier),
        }
    }

    /// Optional resolution: anonymous callers pass through
    pub fn public<V: TokenVerifier + 'static>(verifier: V) -> Self {
        Self::new(AuthPolicy::Public, verifier)
    }

    /// Required resolution
    pub fn protected<V: TokenVerifier + 'static>(verifier: V) -> Self {
        Self::new(AuthPolicy::Protected, verifier)
    }

    /// Required resolution plus admin role check
    pub fn admin<V: TokenVerifier + 'static>(verifier: V) -> Self {
        Self::new(AuthPolicy::Admin, verifier)
    }

    /// Decorator using a [`JwtVerifier`] built from configuration
    pub fn from_config(policy: AuthPolicy, config: &AuthConfig) -> Result<Self, Error> {
        Ok(Self::new(policy, JwtVerifier::from_config(config)?))
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    fn verify(&self, token: &str) -> Option<Claims> {
        match self.verifier.verify(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(policy = ?self.policy, "Rejected bearer credential: {}", e);
                None
            }
        }
    }
}

impl<T: Send + 'static> Decorator<T> for Auth {
    fn decorate(&self, inner: BoxedHandler<T>) -> BoxedHandler<T> {
        Arc::new(AuthHandler {
            auth: self.clone(),
            inner,
        })
    }
}

struct AuthHandler<T> {
    auth: Auth,
    inner: BoxedHandler<T>,
}

#[async_trait]
impl<T: Send + 'static> Handler<T> for AuthHandler<T> {
    async fn call(
        &self,
        request: &ApiRequest,
        params: &Params,
        identity: Option<String>,
    ) -> Result<T, ServerError> {
        let token = bearer_token(request.header(AUTHORIZATION_HEADER));

        if self.auth.policy == AuthPolicy::Public {
            let identity = match token.and_then(|t| self.auth.verify(t)) {
                Some(claims) => Some(claims.username),
                None => identity,
            };
            return self.inner.call(request, params, identity).await;
        }

        let claims = token
            .and_then(|t| self.auth.verify(t))
            .ok_or_else(|| ServerError::unauthorized("Unauthorized access", None))?;

        if self.auth.policy == AuthPolicy::Admin && !claims.is_admin() {
            return Err(ServerError::forbidden(
                format!("User {} is not admin", claims.username),
                Some(&claims.username),
            ));
        }

        self.inner.call(request, params, Some(claims.username)).await
    }
}
