//! # handler-decorators
//!
//! Composable enhancement layers for API-style HTTP handlers. A core
//! [`Handler`](handler::Handler) produces a value; decorators wrap it without
//! either side knowing about the other.
//!
//! ## Layers
//!
//! - **Auth**: resolve or require a caller identity from an HMAC-signed JWT bearer credential
//! - **Cache**: read-through, write-back caching with type-directed decoding, fail-open on backend faults
//! - **Search**: case-sensitive substring filter over named string attributes
//! - **Paginate**: time-window and count limits, validated before the core runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use handler_decorators::{endpoint, prelude::*};
//!
//! #[derive(Clone, Default, Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     email: String,
//!     registered: chrono::DateTime<chrono::Utc>,
//! }
//!
//! impl StringFields for User {
//!     fn string_field(&self, name: &str) -> Option<&str> {
//!         match name {
//!             "name" => Some(&self.name),
//!             "email" => Some(&self.email),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl DateTimeFields for User {
//!     fn datetime_field(&self, name: &str) -> Option<chrono::DateTime<chrono::Utc>> {
//!         (name == "registered").then_some(self.registered)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let users = handler_fn(|_: ApiRequest, _: Params, _: Option<String>| async {
//!         Ok::<Vec<User>, ServerError>(vec![])
//!     });
//!
//!     // first listed is innermost
//!     let users = Decorated::new(users)
//!         .with(Cache::<Vec<User>>::new(InMemoryCache::new(), Duration::from_secs(60)))
//!         .with(Search::new(["name", "email"]))
//!         .with(Paginate::new("registered"))
//!         .with(Auth::from_config(AuthPolicy::Public, &config.auth)?)
//!         .build();
//!
//!     let app = axum::Router::new().route("/users", endpoint::get(users));
//!     let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.service.port)).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod decorate;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod observability;
pub mod record;
pub mod request;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheBackend, CacheError, InMemoryCache};

    #[cfg(feature = "redis")]
    pub use crate::cache::RedisCache;

    pub use crate::codec::{Codec, CodecError, JsonCodec};
    pub use crate::config::{AuthConfig, CacheConfig, Config, RedisConfig, ServiceConfig};

    pub use crate::decorate::{decorate, decorator_fn, Decorated, Decorator};
    pub use crate::error::{Error, ErrorKind, Result, ServerError};
    pub use crate::handler::{handler_fn, BoxedHandler, Handler};
    pub use crate::middleware::{
        Auth, AuthPolicy, Cache, CacheValue, Claims, JwtVerifier, Paginate, Search, TokenVerifier,
    };
    pub use crate::observability::init_tracing;
    pub use crate::record::{DateTimeFields, StringFields};
    pub use crate::request::{ApiRequest, Params};

    // Re-export commonly used external types
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}
