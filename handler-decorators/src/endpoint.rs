//! Axum adapter for decorated handlers
//!
//! Turns a [`BoxedHandler`] into an axum route. The chain is invoked with the
//! request head, the captured path parameters and no identity; a successful
//! value is rendered as JSON and a [`ServerError`] through its `IntoResponse`
//! impl, which maps the error kind to its HTTP status.
//!
//! ```rust,no_run
//! use axum::Router;
//! use handler_decorators::{endpoint, prelude::*};
//!
//! # fn app(users: BoxedHandler<Vec<String>>) -> Router {
//! Router::new().route("/users", endpoint::get(users))
//! # }
//! ```

use std::collections::HashMap;

use axum::{
    extract::Path,
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Json,
};
use serde::Serialize;

use crate::{
    handler::BoxedHandler,
    request::{ApiRequest, Params},
};

/// Invoke `handler` and render its outcome as an HTTP response
pub async fn respond<T>(handler: &BoxedHandler<T>, request: &ApiRequest, params: &Params) -> Response
where
    T: Serialize,
{
    match handler.call(request, params, None).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            tracing::info!(
                path = request.path(),
                status = e.http_status().as_u16(),
                who = e.who(),
                "Handler chain returned an error"
            );
            e.into_response()
        }
    }
}

/// `GET` route serving a decorated handler
pub fn get<T, S>(handler: BoxedHandler<T>) -> MethodRouter<S>
where
    T: Serialize + Send + 'static,
    S: Clone + Send + Sync + 'static,
{
    axum::routing::get(
        move |path: Option<Path<HashMap<String, String>>>, uri: Uri, headers: HeaderMap| {
            let handler = handler.clone();
            async move {
                let params = path.map(|Path(p)| Params::from(p)).unwrap_or_default();
                let request = ApiRequest::new(uri, headers);
                respond(&handler, &request, &params).await
            }
        },
    )
}
