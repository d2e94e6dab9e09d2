//! The handler contract
//!
//! A [`Handler`] is the unit of work every decorator wraps: given a request, the
//! route parameters and the caller identity resolved so far, it produces a value
//! or a classified [`ServerError`]. Handlers hold no per-request state and may
//! be invoked concurrently.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::ServerError,
    request::{ApiRequest, Params},
};

/// A request handler producing values of type `T`
#[async_trait]
pub trait Handler<T>: Send + Sync {
    /// Handle one request
    ///
    /// `identity` is the caller resolved by outer layers, `None` for anonymous.
    async fn call(
        &self,
        request: &ApiRequest,
        params: &Params,
        identity: Option<String>,
    ) -> Result<T, ServerError>;
}

/// Shared, type-erased handler as stored inside a decorator chain
pub type BoxedHandler<T> = Arc<dyn Handler<T>>;

#[async_trait]
impl<T, H> Handler<T> for Arc<H>
where
    H: Handler<T> + ?Sized,
    T: Send + 'static,
{
    async fn call(
        &self,
        request: &ApiRequest,
        params: &Params,
        identity: Option<String>,
    ) -> Result<T, ServerError> {
        (**self).call(request, params, identity).await
    }
}

/// Handler backed by an async closure, see [`handler_fn`]
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`Handler`]
///
/// The closure receives owned copies of the request and parameters so the
/// returned future does not borrow from the caller.
///
/// ```rust
/// use handler_decorators::prelude::*;
///
/// let hello = handler_fn(|_request: ApiRequest, _params: Params, who: Option<String>| async move {
///     Ok::<_, ServerError>(format!("hello {}", who.unwrap_or_default()))
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

#[async_trait]
impl<T, F, Fut> Handler<T> for HandlerFn<F>
where
    F: Fn(ApiRequest, Params, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ServerError>> + Send + 'static,
    T: Send + 'static,
{
    async fn call(
        &self,
        request: &ApiRequest,
        params: &Params,
        identity: Option<String>,
    ) -> Result<T, ServerError> {
        (self.f)(request.clone(), params.clone(), identity).await
    }
}
