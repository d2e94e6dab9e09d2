//! Decorator layers for authentication, caching, search and pagination

// Token abstraction layer
pub mod token;

// JWT verification
pub mod jwt;

pub mod auth;
pub mod cache;
pub mod paginate;
pub mod search;

// Token abstraction exports
pub use token::{bearer_token, Claims, TokenVerifier, ADMIN_ROLE, AUTHORIZATION_HEADER};

pub use jwt::JwtVerifier;

// Decorator exports
pub use auth::{Auth, AuthPolicy};
pub use cache::{path_key, Cache, CacheKeyFn, CacheValue, IGNORE_CACHE_PARAM};
pub use paginate::{PageQuery, Paginate, LIMIT_PARAM, TIMESTAMP_PARAM};
pub use search::{filter_by_term, Search, SEARCH_PARAM};
