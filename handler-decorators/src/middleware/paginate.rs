//! Time-window and count pagination decorator
//!
//! Reads two optional query parameters:
//!
//! - `limit`: non-negative integer, `0` or absent means unbounded
//! - `timestamp`: RFC3339 date-time, only records strictly before it are kept
//!
//! Both are validated before the wrapped handler runs. With a timestamp the
//! records are windowed first and the limit truncates the survivors; with only
//! a limit the first `limit` records are returned.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    decorate::Decorator,
    error::ServerError,
    handler::{BoxedHandler, Handler},
    record::{require_datetime, DateTimeFields},
    request::{ApiRequest, Params},
};

/// Query parameter carrying the maximum number of records
pub const LIMIT_PARAM: &str = "limit";

/// Query parameter carrying the exclusive upper bound of the time window
pub const TIMESTAMP_PARAM: &str = "timestamp";

/// Validated pagination parameters of one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    /// `0` means unbounded
    pub limit: usize,
    pub before: Option<DateTime<Utc>>,
}

impl PageQuery {
    /// Parse `limit` and `timestamp` from the request query
    ///
    /// Empty values read as absent. `who` is attached to the `BadRequest`
    /// error returned for malformed input.
    pub fn from_request(request: &ApiRequest, who: Option<&str>) -> Result<Self, ServerError> {
        let limit = match request.query_param(LIMIT_PARAM).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                ServerError::bad_request(
                    format!("Parameter '{}' has invalid value: {}. Error: {}", LIMIT_PARAM, raw, e),
                    who,
                )
                .with_source(e)
            })?,
            None => 0,
        };

        let before = match request.query_param(TIMESTAMP_PARAM).filter(|v| !v.is_empty()) {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        ServerError::bad_request(
                            format!(
                                "Parameter '{}' has invalid value: {}. Error: {}",
                                TIMESTAMP_PARAM, raw, e
                            ),
                            who,
                        )
                        .with_source(e)
                    })?,
            ),
            None => None,
        };

        Ok(Self { limit, before })
    }

    /// Neither parameter was supplied
    pub fn is_unbounded(&self) -> bool {
        self.limit == 0 && self.before.is_none()
    }

    /// Apply the window and the limit to `records`, keeping their order
    ///
    /// # Panics
    ///
    /// If a timestamp is set and a record does not expose `attribute`.
    pub fn apply<R: DateTimeFields>(&self, records: Vec<R>, attribute: &str) -> Vec<R> {
        let mut page: Vec<R> = match self.before {
            Some(before) => records
                .into_iter()
                .filter(|record| require_datetime(record, attribute) < before)
                .collect(),
            None => records,
        };

        if self.limit > 0 {
            page.truncate(self.limit);
        }
        page
    }
}

/// Pagination decorator windowing on a date-time attribute
#[derive(Debug, Clone)]
pub struct Paginate {
    attribute: Arc<str>,
}

impl Paginate {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: Arc::from(attribute.into()),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl<R> Decorator<Vec<R>> for Paginate
where
    R: DateTimeFields + Send + Sync + 'static,
{
    fn decorate(&self, inner: BoxedHandler<Vec<R>>) -> BoxedHandler<Vec<R>> {
        Arc::new(PaginateHandler {
            attribute: self.attribute.clone(),
            inner,
        })
    }
}

struct PaginateHandler<R> {
    attribute: Arc<str>,
    inner: BoxedHandler<Vec<R>>,
}

#[async_trait]
impl<R> Handler<Vec<R>> for PaginateHandler<R>
where
    R: DateTimeFields + Send + Sync + 'static,
{
    async fn call(
        &self,
        request: &ApiRequest,
        params: &Params,
        identity: Option<String>,
    ) -> Result<Vec<R>, ServerError> {
        let query = PageQuery::from_request(request, identity.as_deref())?;

        let response = self.inner.call(request, params, identity).await?;
        if query.is_unbounded() {
            return Ok(response);
        }

        let page = query.apply(response, &self.attribute);
        tracing::debug!(
            limit = query.limit,
            before = ?query.before,
            returned = page.len(),
            "Pagination applied"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        decorate::Decorated,
        error::ErrorKind,
        testing::{counting_handler, names, ten_users, User},
    };

    fn paginated(calls: Arc<AtomicUsize>) -> BoxedHandler<Vec<User>> {
        Decorated::new(counting_handler(ten_users(), calls))
            .with(Paginate::new("Registered"))
            .build()
    }

    async fn page(uri: &str) -> (Result<Vec<User>, ServerError>, usize) {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = paginated(calls.clone());
        let request = ApiRequest::get(uri).unwrap();
        let result = handler
            .call(&request, &Params::new(), Some("alice".to_string()))
            .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_window_then_limit() {
        // midnight before user6 registered
        let (result, calls) = page("/users?limit=3&timestamp=2017-07-06T00:00:00Z").await;
        assert_eq!(names(&result.unwrap()), vec!["user1", "user2", "user3"]);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_window_is_strictly_before() {
        let (result, _) = page("/users?timestamp=2017-07-03T12:00:00Z").await;
        assert_eq!(names(&result.unwrap()), vec!["user1", "user2"]);
    }

    #[tokio::test]
    async fn test_window_honours_offset() {
        // 2017-07-04T12:00:00Z expressed in UTC+2
        let (result, _) = page("/users?timestamp=2017-07-04T14:00:00%2B02:00").await;
        assert_eq!(names(&result.unwrap()), vec!["user1", "user2", "user3"]);
    }

    #[tokio::test]
    async fn test_window_without_limit_keeps_every_match() {
        let (result, _) = page("/users?limit=0&timestamp=2017-07-08T00:00:00Z").await;
        assert_eq!(result.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_limit_only_takes_prefix() {
        let (result, _) = page("/users?limit=3").await;
        assert_eq!(names(&result.unwrap()), vec!["user1", "user2", "user3"]);
    }

    #[tokio::test]
    async fn test_limit_beyond_length_returns_all() {
        let (result, _) = page("/users?limit=25").await;
        assert_eq!(result.unwrap(), ten_users());
    }

    #[tokio::test]
    async fn test_no_parameters_returns_input() {
        let (result, calls) = page("/users").await;
        assert_eq!(result.unwrap(), ten_users());
        assert_eq!(calls, 1);

        let (result, _) = page("/users?limit=&timestamp=").await;
        assert_eq!(result.unwrap(), ten_users());
    }

    #[tokio::test]
    async fn test_invalid_limit_fails_before_inner_call() {
        let (result, calls) = page("/users?limit=abc").await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorKind::BadRequest);
        assert_eq!(err.who(), "alice");
        assert!(err.what().starts_with("Parameter 'limit' has invalid value: abc"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_negative_limit_is_bad_request() {
        let (result, calls) = page("/users?limit=-1").await;
        assert_eq!(result.unwrap_err().code(), ErrorKind::BadRequest);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_invalid_timestamp_fails_before_inner_call() {
        let (result, calls) = page("/users?limit=3&timestamp=2017-07-25%2016:11:46").await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorKind::BadRequest);
        assert!(err.what().starts_with("Parameter 'timestamp' has invalid value"));
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_inner_error_propagates() {
        let handler = Decorated::new(crate::handler::handler_fn(
            |_: ApiRequest, _: Params, _: Option<String>| async {
                Err::<Vec<User>, _>(ServerError::forbidden("nope", Some("bob")))
            },
        ))
        .with(Paginate::new("Registered"))
        .build();

        let request = ApiRequest::get("/users?limit=2").unwrap();
        let err = handler.call(&request, &Params::new(), None).await.unwrap_err();
        assert_eq!(err.code(), ErrorKind::Forbidden);
        assert_eq!(err.who(), "bob");
    }

    #[tokio::test]
    #[should_panic(expected = "does not expose date-time field `Updated`")]
    async fn test_unknown_attribute_panics() {
        let handler = Decorated::new(counting_handler(ten_users(), Arc::new(AtomicUsize::new(0))))
            .with(Paginate::new("Updated"))
            .build();

        let request = ApiRequest::get("/users?timestamp=2017-07-06T00:00:00Z").unwrap();
        let _ = handler.call(&request, &Params::new(), None).await;
    }

    #[test]
    fn test_page_query_defaults() {
        let request = ApiRequest::get("/users?search=x").unwrap();
        let query = PageQuery::from_request(&request, None).unwrap();
        assert!(query.is_unbounded());
        assert_eq!(query, PageQuery::default());
    }
}
