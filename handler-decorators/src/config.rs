//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: DECORATORS_, e.g. `DECORATORS_CACHE_TTL_SECS`,
//!    `DECORATORS_CACHE_REDIS_URL`)
//! 2. Current working directory: ./config.toml
//! 3. System directory: /etc/handler-decorators/config.toml
//! 4. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Uncased, UncasedStr},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Bearer credential verification
    pub auth: AuthConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Shared-secret JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret
    #[serde(default)]
    pub secret: Option<String>,

    /// File holding the shared secret; takes precedence over `secret`
    #[serde(default)]
    pub secret_path: Option<PathBuf>,

    /// JWT algorithm (HS256, HS384, HS512)
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,

    /// Clock skew tolerance for `exp`/`nbf` in seconds
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

impl AuthConfig {
    /// Resolve the shared secret
    pub fn secret_bytes(&self) -> Result<Vec<u8>> {
        if let Some(path) = &self.secret_path {
            let secret = std::fs::read(path).map_err(|e| {
                Error::Config(Box::new(figment::Error::from(format!(
                    "Failed to read JWT secret from path '{}': {}",
                    path.display(),
                    e
                ))))
            })?;
            return Ok(trim_trailing_newline(secret));
        }

        match &self.secret {
            Some(secret) if !secret.is_empty() => Ok(secret.as_bytes().to_vec()),
            _ => Err(Error::Config(Box::new(figment::Error::from(
                "No JWT secret configured: set auth.secret or auth.secret_path".to_string(),
            )))),
        }
    }
}

fn trim_trailing_newline(mut bytes: Vec<u8>) -> Vec<u8> {
    while matches!(bytes.last(), Some(b'\n' | b'\r')) {
        bytes.pop();
    }
    bytes
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for cached responses in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Redis backend (in-process cache when absent)
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            redis: None,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: usize,

    /// Maximum retry attempts for establishing Redis connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Prefix prepended to every cache key
    #[serde(default)]
    pub key_prefix: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_leeway_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_redis_max_connections() -> usize {
    20
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

const ENV_PREFIX: &str = "DECORATORS_";

/// `DECORATORS_` variables with the section split off the field name
///
/// Only the first `_` separates the section (`CACHE_TTL_SECS` is
/// `cache.ttl_secs`); `CACHE_REDIS_*` nests one level further.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(env_key)
}

fn env_key(key: &UncasedStr) -> Uncased<'_> {
    let key = key.as_str().to_ascii_lowercase();
    let key = match key.split_once('_') {
        Some((section, field)) => format!("{}.{}", section, field),
        None => key,
    };

    match key.strip_prefix("cache.redis_") {
        Some(field) => format!("cache.redis.{}", field).into(),
        None => key.into(),
    }
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Reads `/etc/handler-decorators/config.toml` then `./config.toml` (the
    /// latter wins), then applies `DECORATORS_` environment overrides.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        for path in Self::config_paths().iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config = figment.merge(env_provider()).extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Useful for testing or non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(env_provider())
            .extract()?;

        Ok(config)
    }

    /// Config file locations, highest priority first
    fn config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from("config.toml"),
            PathBuf::from("/etc/handler-decorators/config.toml"),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "handler-decorators".to_string(),
                port: default_port(),
                log_level: default_log_level(),
            },
            auth: AuthConfig {
                secret: None,
                secret_path: None,
                algorithm: default_jwt_algorithm(),
                leeway_secs: default_leeway_secs(),
            },
            cache: CacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.auth.algorithm, "HS256");
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert!(config.cache.redis.is_none());
    }

    #[test]
    fn test_load_from_file() {
        // jailed so env overrides set by other tests cannot leak in
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "users.toml",
                r#"
[service]
name = "users"

[auth]
secret = "s3cret"
algorithm = "HS512"

[cache]
ttl_secs = 30

[cache.redis]
url = "redis://localhost:6379"
key_prefix = "users:"
"#,
            )?;

            let config = Config::load_from("users.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.service.name, "users");
            assert_eq!(config.service.port, 8080);
            assert_eq!(config.auth.algorithm, "HS512");
            assert_eq!(
                config.auth.secret_bytes().map_err(|e| e.to_string())?,
                b"s3cret".to_vec()
            );
            assert_eq!(config.cache.ttl_secs, 30);

            let redis = config.cache.redis.ok_or("redis section missing")?;
            assert_eq!(redis.key_prefix, "users:");
            assert_eq!(redis.max_connections, 20);
            Ok(())
        });
    }

    #[test]
    fn test_secret_path_wins_and_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        let auth = AuthConfig {
            secret: Some("inline".to_string()),
            secret_path: Some(file.path().to_path_buf()),
            algorithm: default_jwt_algorithm(),
            leeway_secs: 0,
        };
        assert_eq!(auth.secret_bytes().unwrap(), b"from-file".to_vec());
    }

    #[test]
    fn test_env_key_mapping() {
        let key = |k: &str| env_key(UncasedStr::new(k)).as_str().to_string();
        assert_eq!(key("CACHE_TTL_SECS"), "cache.ttl_secs");
        assert_eq!(key("AUTH_SECRET_PATH"), "auth.secret_path");
        assert_eq!(key("SERVICE_LOG_LEVEL"), "service.log_level");
        assert_eq!(key("CACHE_REDIS_MAX_CONNECTIONS"), "cache.redis.max_connections");
    }

    #[test]
    fn test_env_overrides_snake_case_keys() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("secret.txt", "from-env-file")?;
            jail.create_file(
                "config.toml",
                r#"
[auth]
secret = "inline"

[cache]
ttl_secs = 120
"#,
            )?;
            jail.set_env("DECORATORS_CACHE_TTL_SECS", "30");
            jail.set_env("DECORATORS_AUTH_SECRET_PATH", "secret.txt");
            jail.set_env("DECORATORS_AUTH_LEEWAY_SECS", "5");
            jail.set_env("DECORATORS_SERVICE_LOG_LEVEL", "debug");

            let config = Config::load_from("config.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.cache.ttl_secs, 30);
            assert_eq!(config.auth.leeway_secs, 5);
            assert_eq!(config.service.log_level, "debug");
            assert_eq!(
                config.auth.secret_bytes().map_err(|e| e.to_string())?,
                b"from-env-file".to_vec()
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_redis_keys() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", "")?;
            jail.set_env("DECORATORS_CACHE_REDIS_URL", "redis://cache:6379");
            jail.set_env("DECORATORS_CACHE_REDIS_KEY_PREFIX", "users:");

            let config = Config::load_from("config.toml").map_err(|e| e.to_string())?;
            let redis = config.cache.redis.ok_or("redis section missing")?;
            assert_eq!(redis.url, "redis://cache:6379");
            assert_eq!(redis.key_prefix, "users:");
            assert_eq!(redis.max_connections, 20);
            Ok(())
        });
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let auth = Config::default().auth;
        assert!(matches!(auth.secret_bytes(), Err(Error::Config(_))));
    }
}
