//! Read-through, write-back response cache decorator
//!
//! Per request:
//!
//! 1. `ignore_cache=true` calls the inner handler and returns its result. The
//!    backend is neither read nor written.
//! 2. The key is derived (default: request path without query string). A key
//!    error is returned as is.
//! 3. On a miss the inner handler runs and a successful value is stored with the
//!    configured TTL. Store failures are logged and ignored.
//! 4. On any other backend failure the inner handler runs and nothing else
//!    touches the backend.
//! 5. On a hit the stored bytes are decoded into `T`. An encoded null becomes an
//!    empty value for collections (see [`CacheValue`]) and a decode error for
//!    anything else.
//!
//! Concurrent misses on one key are not coalesced: each runs the inner handler
//! and writes the entry, the last write wins.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::Hash,
    marker::PhantomData,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    cache::{CacheBackend, CacheError},
    codec::{Codec, JsonCodec},
    decorate::Decorator,
    error::ServerError,
    handler::{BoxedHandler, Handler},
    request::{ApiRequest, Params},
};

/// Query parameter that bypasses the cache when set to `true`
pub const IGNORE_CACHE_PARAM: &str = "ignore_cache";

/// Values a [`Cache`] can store and decode
///
/// `from_null` is what a stored null decodes to. Collections answer with an
/// empty value; other types keep the default `None`, which turns a null entry
/// into a decode error. Record types opt in with an empty impl:
///
/// ```rust
/// use handler_decorators::prelude::*;
///
/// #[derive(Serialize, Deserialize)]
/// struct Profile {
///     name: String,
/// }
///
/// impl CacheValue for Profile {}
/// ```
pub trait CacheValue: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn from_null() -> Option<Self> {
        None
    }
}

macro_rules! strict_cache_value {
    ($($ty:ty),* $(,)?) => {
        $(impl CacheValue for $ty {})*
    };
}

strict_cache_value!(bool, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, String);

impl<R> CacheValue for Vec<R>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn from_null() -> Option<Self> {
        Some(Vec::new())
    }
}

impl<R> CacheValue for VecDeque<R>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn from_null() -> Option<Self> {
        Some(VecDeque::new())
    }
}

impl<R> CacheValue for HashSet<R>
where
    R: Serialize + DeserializeOwned + Eq + Hash + Send + Sync + 'static,
{
    fn from_null() -> Option<Self> {
        Some(HashSet::new())
    }
}

impl<R> CacheValue for BTreeSet<R>
where
    R: Serialize + DeserializeOwned + Ord + Send + Sync + 'static,
{
    fn from_null() -> Option<Self> {
        Some(BTreeSet::new())
    }
}

impl<K, V> CacheValue for HashMap<K, V>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn from_null() -> Option<Self> {
        Some(HashMap::new())
    }
}

impl<K, V> CacheValue for BTreeMap<K, V>
where
    K: Serialize + DeserializeOwned + Ord + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn from_null() -> Option<Self> {
        Some(BTreeMap::new())
    }
}

impl<T: CacheValue> CacheValue for Option<T> {
    fn from_null() -> Option<Self> {
        Some(None)
    }
}

impl CacheValue for serde_json::Value {
    fn from_null() -> Option<Self> {
        Some(serde_json::Value::Null)
    }
}

/// Derives a cache key from the request, route parameters and caller identity
pub type CacheKeyFn =
    Arc<dyn Fn(&ApiRequest, &Params, Option<&str>) -> Result<String, ServerError> + Send + Sync>;

/// Default key: the request path, query string excluded
pub fn path_key(
    request: &ApiRequest,
    _params: &Params,
    _identity: Option<&str>,
) -> Result<String, ServerError> {
    Ok(request.path().to_string())
}

/// Caching decorator for handlers producing `T`
///
/// `T` is fixed when the decorator is built; hits are decoded straight into it.
pub struct Cache<T, C = JsonCodec> {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    key_fn: CacheKeyFn,
    codec: Arc<C>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Cache<T, JsonCodec> {
    /// Cache keyed by request path, JSON-encoded
    pub fn new<B>(backend: B, ttl: Duration) -> Self
    where
        B: CacheBackend + 'static,
    {
        Self {
            backend: Arc::new(backend),
            ttl,
            key_fn: Arc::new(path_key),
            codec: Arc::new(JsonCodec),
            _value: PhantomData,
        }
    }
}

impl<T, C: Codec> Cache<T, C> {
    /// Replace the key derivation, e.g. to cache per caller
    pub fn with_key<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&ApiRequest, &Params, Option<&str>) -> Result<String, ServerError>
            + Send
            + Sync
            + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }

    /// Replace the serialization strategy
    pub fn with_codec<C2: Codec>(self, codec: C2) -> Cache<T, C2> {
        Cache {
            backend: self.backend,
            ttl: self.ttl,
            key_fn: self.key_fn,
            codec: Arc::new(codec),
            _value: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<T, C> Clone for Cache<T, C> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            ttl: self.ttl,
            key_fn: self.key_fn.clone(),
            codec: self.codec.clone(),
            _value: PhantomData,
        }
    }
}

impl<T, C> Decorator<T> for Cache<T, C>
where
    T: CacheValue,
    C: Codec,
{
    fn decorate(&self, inner: BoxedHandler<T>) -> BoxedHandler<T> {
        Arc::new(CacheHandler {
            cache: self.clone(),
            inner,
        })
    }
}

struct CacheHandler<T, C> {
    cache: Cache<T, C>,
    inner: BoxedHandler<T>,
}

impl<T, C> CacheHandler<T, C>
where
    T: CacheValue,
    C: Codec,
{
    fn decode(&self, bytes: &[u8], who: Option<&str>) -> Result<T, ServerError> {
        let decoded: Option<T> = self.cache.codec.decode(bytes).map_err(|e| {
            ServerError::internal(format!("Conversion from byte array failed: {}", e), who)
                .with_source(e)
        })?;

        decoded.or_else(T::from_null).ok_or_else(|| {
            ServerError::internal("Conversion from byte array failed: stored value is null", who)
        })
    }

    fn encode(&self, value: &T, who: Option<&str>) -> Result<Vec<u8>, ServerError> {
        self.cache.codec.encode(value).map_err(|e| {
            ServerError::internal(format!("Conversion to byte array failed: {}", e), who)
                .with_source(e)
        })
    }
}

#[async_trait]
impl<T, C> Handler<T> for CacheHandler<T, C>
where
    T: CacheValue,
    C: Codec,
{
    async fn call(
        &self,
        request: &ApiRequest,
        params: &Params,
        identity: Option<String>,
    ) -> Result<T, ServerError> {
        if request.query_param(IGNORE_CACHE_PARAM) == Some("true") {
            tracing::debug!(path = request.path(), "Cache bypassed");
            return self.inner.call(request, params, identity).await;
        }

        let key = (self.cache.key_fn)(request, params, identity.as_deref())?;

        match self.cache.backend.get(&key).await {
            Ok(bytes) => {
                tracing::debug!(key = %key, "Cache hit");
                self.decode(&bytes, identity.as_deref())
            }
            Err(CacheError::Miss) => {
                tracing::debug!(key = %key, "Cache miss");
                let response = self.inner.call(request, params, identity.clone()).await?;
                let bytes = self.encode(&response, identity.as_deref())?;

                if let Err(e) = self.cache.backend.set(&key, bytes, self.cache.ttl).await {
                    tracing::warn!("Error setting key '{}': {}", key, e);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::warn!("Error getting key '{}': {}", key, e);
                self.inner.call(request, params, identity).await
            }
        }
    }
}
