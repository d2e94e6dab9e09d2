//! Shared fixtures for unit tests

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    cache::{CacheBackend, CacheError, InMemoryCache},
    error::ServerError,
    handler::{handler_fn, Handler},
    record::{DateTimeFields, StringFields},
    request::{ApiRequest, Params},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub registered: DateTime<Utc>,
}

impl User {
    pub fn new(name: &str, email: &str, registered: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            registered,
        }
    }
}

impl StringFields for User {
    fn string_field(&self, name: &str) -> Option<&str> {
        match name {
            "Name" | "name" => Some(&self.name),
            "Email" | "email" => Some(&self.email),
            _ => None,
        }
    }
}

impl DateTimeFields for User {
    fn datetime_field(&self, name: &str) -> Option<DateTime<Utc>> {
        match name {
            "Registered" | "registered" => Some(self.registered),
            _ => None,
        }
    }
}

/// `day`-th of July 2017, noon UTC
pub fn july(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 7, day, 12, 0, 0).unwrap()
}

/// Ten users registered on consecutive days, `user1` on July 1st
pub fn ten_users() -> Vec<User> {
    (1..=10)
        .map(|i| {
            User::new(
                &format!("user{}", i),
                &format!("user{}@example.com", i),
                july(i),
            )
        })
        .collect()
}

/// Core handler returning `users` and counting invocations
pub fn counting_handler(users: Vec<User>, calls: Arc<AtomicUsize>) -> impl Handler<Vec<User>> {
    handler_fn(move |_: ApiRequest, _: Params, _: Option<String>| {
        let users = users.clone();
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ServerError>(users)
        }
    })
}

pub fn names(users: &[User]) -> Vec<&str> {
    users.iter().map(|u| u.name.as_str()).collect()
}

/// In-memory backend that counts traffic and can be told to fail
#[derive(Clone, Default)]
pub struct SpyCache {
    pub store: InMemoryCache,
    pub gets: Arc<AtomicUsize>,
    pub sets: Arc<AtomicUsize>,
    pub fail_get: bool,
    pub fail_set: bool,
}

impl SpyCache {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackend for SpyCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get {
            return Err(CacheError::Backend("connection refused".to_string()));
        }
        self.store.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_set {
            return Err(CacheError::Backend("read-only replica".to_string()));
        }
        self.store.set(key, value, ttl).await
    }
}
