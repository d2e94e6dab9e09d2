//! Users listing service
//!
//! Serves an in-memory user directory through decorated handlers:
//!
//! - `GET /users`: public listing with caching, `search`, `limit` and `timestamp`
//! - `GET /users/{name}`: single user, cached per path, bearer credential required
//! - `GET /admin/users`: full listing, admin role required, never cached
//!
//! Run with a shared secret, e.g.
//!
//! ```bash
//! DECORATORS_AUTH_SECRET=dev-secret cargo run --example users-api
//! curl 'localhost:8080/users?search=ali&limit=2'
//! ```
//!
//! With `[cache.redis]` configured the listing is cached in Redis, otherwise in
//! process memory.

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use handler_decorators::{endpoint, prelude::*};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    name: String,
    email: String,
    company: String,
    registered: DateTime<Utc>,
}

impl StringFields for User {
    fn string_field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "email" => Some(&self.email),
            "company" => Some(&self.company),
            _ => None,
        }
    }
}

impl CacheValue for User {}

impl DateTimeFields for User {
    fn datetime_field(&self, name: &str) -> Option<DateTime<Utc>> {
        (name == "registered").then_some(self.registered)
    }
}

fn directory() -> Vec<User> {
    let people = [
        ("alice", "alice@acme.example", "Acme", (2017, 3, 14)),
        ("bob", "bob@globex.example", "Globex", (2017, 5, 2)),
        ("carol", "carol@initech.example", "Initech", (2017, 6, 21)),
        ("natalia", "natalia@acme.example", "Acme", (2017, 7, 9)),
        ("dave", "dave@umbrella.example", "Umbrella", (2017, 7, 25)),
    ];

    people
        .into_iter()
        .filter_map(|(name, email, company, (y, m, d))| {
            Some(User {
                name: name.to_string(),
                email: email.to_string(),
                company: company.to_string(),
                registered: Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).single()?,
            })
        })
        .collect()
}

async fn cache_backend(config: &CacheConfig) -> anyhow::Result<Arc<dyn CacheBackend>> {
    #[cfg(feature = "redis")]
    if let Some(redis) = &config.redis {
        info!("Caching in Redis at {}", redis.url);
        return Ok(Arc::new(RedisCache::connect(redis).await?));
    }

    info!("Caching in process memory, ttl {}s", config.ttl_secs);
    Ok(Arc::new(InMemoryCache::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    let users = Arc::new(directory());
    let backend = cache_backend(&config.cache).await?;

    let list_users = {
        let users = users.clone();
        handler_fn(move |_: ApiRequest, _: Params, who: Option<String>| {
            let users = users.clone();
            async move {
                debug!(who = who.as_deref().unwrap_or("anonymous"), "Listing users");
                Ok::<_, ServerError>(users.as_ref().clone())
            }
        })
    };

    let get_user = {
        let users = users.clone();
        handler_fn(move |_: ApiRequest, params: Params, who: Option<String>| {
            let users = users.clone();
            async move {
                let name = params.get("name").unwrap_or_default();
                users
                    .iter()
                    .find(|u| u.name == name)
                    .cloned()
                    .ok_or_else(|| ServerError::not_found(format!("No user named {}", name), who.as_deref()))
            }
        })
    };

    let public_listing = Decorated::new(list_users.clone())
        .with(Cache::<Vec<User>>::new(backend.clone(), config.cache.ttl()))
        .with(Search::new(["name", "email"]))
        .with(Paginate::new("registered"))
        .with(Auth::from_config(AuthPolicy::Public, &config.auth)?)
        .build();

    let single_user = Decorated::new(get_user)
        .with(Cache::<User>::new(backend.clone(), config.cache.ttl()))
        .with(Auth::from_config(AuthPolicy::Protected, &config.auth)?)
        .build();

    let admin_listing = Decorated::new(list_users)
        .with(Search::new(["name", "email", "company"]))
        .with(Auth::from_config(AuthPolicy::Admin, &config.auth)?)
        .build();

    let app = Router::new()
        .route("/users", endpoint::get(public_listing))
        .route("/users/{name}", endpoint::get(single_user))
        .route("/admin/users", endpoint::get(admin_listing));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.service.port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
