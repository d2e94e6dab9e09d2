//! Free-text search decorator
//!
//! Filters a `Vec<R>` response down to the records where at least one of the
//! configured string attributes contains the `search` query term. Matching is a
//! case-sensitive substring test; the term is trimmed and an empty term leaves
//! the response untouched. Survivors keep their original order.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    decorate::Decorator,
    error::ServerError,
    handler::{BoxedHandler, Handler},
    record::{require_string, StringFields},
    request::{ApiRequest, Params},
};

/// Query parameter carrying the search term
pub const SEARCH_PARAM: &str = "search";

/// Search decorator over the given record attributes
#[derive(Debug, Clone)]
pub struct Search {
    attributes: Arc<[String]>,
}

impl Search {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
}

/// Keep the records where any of `attributes` contains `term`
///
/// # Panics
///
/// If a record does not expose one of `attributes`.
pub fn filter_by_term<R: StringFields>(records: Vec<R>, attributes: &[String], term: &str) -> Vec<R> {
    records
        .into_iter()
        .filter(|record| {
            // every attribute is read so a missing one fails on the first record
            attributes
                .iter()
                .map(|attribute| require_string(record, attribute).contains(term))
                .fold(false, |matched, hit| matched || hit)
        })
        .collect()
}

impl<R> Decorator<Vec<R>> for Search
where
    R: StringFields + Send + Sync + 'static,
{
    fn decorate(&self, inner: BoxedHandler<Vec<R>>) -> BoxedHandler<Vec<R>> {
        Arc::new(SearchHandler {
            attributes: self.attributes.clone(),
            inner,
        })
    }
}

struct SearchHandler<R> {
    attributes: Arc<[String]>,
    inner: BoxedHandler<Vec<R>>,
}

#[async_trait]
impl<R> Handler<Vec<R>> for SearchHandler<R>
where
    R: StringFields + Send + Sync + 'static,
{
    async fn call(
        &self,
        request: &ApiRequest,
        params: &Params,
        identity: Option<String>,
    ) -> Result<Vec<R>, ServerError> {
        let response = self.inner.call(request, params, identity).await?;

        let term = request.query_param(SEARCH_PARAM).map(str::trim).unwrap_or("");
        if term.is_empty() {
            return Ok(response);
        }

        let before = response.len();
        let filtered = filter_by_term(response, &self.attributes, term);
        tracing::debug!(term, before, after = filtered.len(), "Search applied");
        Ok(filtered)
    }
}
