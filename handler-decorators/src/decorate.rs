//! Decorator composition
//!
//! [`decorate`] folds an ordered list of decorators around a core handler:
//! `decorate(core, [d1, d2, ..., dn])` builds `dn(...d2(d1(core)))`.
//!
//! - `d1` sits nearest the core (innermost), `dn` is outermost.
//! - Work a decorator does *before* delegating runs outer to inner (`dn` first).
//! - Work it does *after* its inner call returns runs inner to outer (`d1` first).
//! - Any decorator may short-circuit and answer without calling its inner handler.
//!
//! The usual listing is `[Cache, Search, Paginate, Auth]`: the cache stores raw
//! core output, search filters the full (possibly cached) dataset, pagination
//! trims the filtered result, and auth runs before everything else.

use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};

/// A transformation from one handler into an enhanced handler
///
/// Decorator values are immutable configuration; `decorate` is called once per
/// chain, at setup time.
pub trait Decorator<T>: Send + Sync {
    fn decorate(&self, inner: BoxedHandler<T>) -> BoxedHandler<T>;
}

/// Decorator backed by a closure, see [`decorator_fn`]
pub struct DecoratorFn<F> {
    f: F,
}

/// Wrap a `BoxedHandler<T> -> BoxedHandler<T>` closure as a [`Decorator`]
pub fn decorator_fn<F>(f: F) -> DecoratorFn<F> {
    DecoratorFn { f }
}

impl<T, F> Decorator<T> for DecoratorFn<F>
where
    F: Fn(BoxedHandler<T>) -> BoxedHandler<T> + Send + Sync,
{
    fn decorate(&self, inner: BoxedHandler<T>) -> BoxedHandler<T> {
        (self.f)(inner)
    }
}

/// Apply `decorators` to `core`, first element innermost
pub fn decorate<T>(core: BoxedHandler<T>, decorators: &[Box<dyn Decorator<T>>]) -> BoxedHandler<T> {
    decorators
        .iter()
        .fold(core, |inner, decorator| decorator.decorate(inner))
}

/// Builder collecting decorators in nesting order
///
/// ```rust
/// use std::time::Duration;
/// use handler_decorators::prelude::*;
///
/// # #[derive(Clone, Default, Serialize, Deserialize)]
/// # struct User { name: String }
/// # impl StringFields for User {
/// #     fn string_field(&self, name: &str) -> Option<&str> {
/// #         (name == "name").then_some(self.name.as_str())
/// #     }
/// # }
/// let core = handler_fn(|_: ApiRequest, _: Params, _: Option<String>| async {
///     Ok::<Vec<User>, ServerError>(vec![])
/// });
///
/// let handler = Decorated::new(core)
///     .with(Cache::<Vec<User>>::new(InMemoryCache::new(), Duration::from_secs(60)))
///     .with(Search::new(["name"]))
///     .build();
/// ```
pub struct Decorated<T> {
    core: BoxedHandler<T>,
    decorators: Vec<Box<dyn Decorator<T>>>,
}

impl<T: 'static> Decorated<T> {
    pub fn new<H>(core: H) -> Self
    where
        H: Handler<T> + 'static,
    {
        Self {
            core: Arc::new(core),
            decorators: Vec::new(),
        }
    }

    /// Add the next decorator, outside of every decorator added so far
    pub fn with<D>(mut self, decorator: D) -> Self
    where
        D: Decorator<T> + 'static,
    {
        self.decorators.push(Box::new(decorator));
        self
    }

    /// Compose the chain
    pub fn build(self) -> BoxedHandler<T> {
        decorate(self.core, &self.decorators)
    }
}
