use std::{str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string; takes precedence over the discrete fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url).context("parse DATABASE_URL");
        }
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// `APP_ENV` value that turns on error detail in 5xx bodies and text logs.
pub const DEVELOPMENT: &str = "development";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Deployment mode from `APP_ENV`, `production` unless set.
    pub environment: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cors_origin: String,
    pub api_version: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            host: or("DB_HOST", "localhost"),
            port: parse_or(&lookup, "DB_PORT", 5432)?,
            user: or("DB_USER", "postgres"),
            password: or("DB_PASSWORD", ""),
            name: or("DB_NAME", "userhub"),
            max_connections: parse_or(&lookup, "DB_POOL_SIZE", 10)?,
            acquire_timeout_secs: parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 5)?,
        };

        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: or("JWT_ISSUER", "userhub"),
            audience: or("JWT_AUDIENCE", "userhub-clients"),
            ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", 60)?,
        };

        Ok(Self {
            environment: or("APP_ENV", "production"),
            database,
            jwt,
            cors_origin: or("CORS_ORIGIN", "http://localhost:5173"),
            api_version: or("API_VERSION", "v1"),
            host: or("APP_HOST", "0.0.0.0"),
            port: parse_or(&lookup, "PORT", 5000)?,
        })
    }

    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version.trim_matches('/'))
    }

    pub fn is_development(&self) -> bool {
        self.environment == DEVELOPMENT
    }
}

/// Whether logs go out as JSON. An explicit `LOG_FORMAT` wins; otherwise
/// development gets human-readable text and every other mode JSON.
pub fn json_logs(app_env: Option<&str>, log_format: Option<&str>) -> bool {
    match log_format {
        Some(format) => format.eq_ignore_ascii_case("json"),
        None => app_env != Some(DEVELOPMENT),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
