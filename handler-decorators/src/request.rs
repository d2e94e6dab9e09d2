//! Request abstraction consumed by handlers and decorators

use std::collections::HashMap;

use http::{request::Parts, HeaderMap, Uri};

/// Route parameters captured by the surrounding router (e.g. `/users/{id}`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a captured parameter by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, String>> for Params {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The request view handed through a decorator chain
///
/// Exposes the path, the query string as a name/value lookup and the request
/// headers. Query values are decoded once at construction; for repeated names
/// the first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    uri: Uri,
    headers: HeaderMap,
    query: HashMap<String, String>,
}

impl ApiRequest {
    pub fn new(uri: Uri, headers: HeaderMap) -> Self {
        let mut query = HashMap::new();
        if let Some(raw) = uri.query() {
            for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                query
                    .entry(name.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }

        Self { uri, headers, query }
    }

    /// Build from the head of an HTTP request
    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.uri.clone(), parts.headers.clone())
    }

    /// Build a request for a path-and-query string with no headers
    ///
    /// Returns `None` if the string is not a valid URI.
    pub fn get(path_and_query: &str) -> Option<Self> {
        let uri = path_and_query.parse::<Uri>().ok()?;
        Some(Self::new(uri, HeaderMap::new()))
    }

    /// Add a header, replacing any previous value
    ///
    /// Values that are not valid header names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// First value of a query parameter, if present
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Header value as a string; non-UTF-8 values read as absent
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
