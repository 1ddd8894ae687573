use std::sync::Arc;

use anyhow::Context;

use crate::{
    config::{AppConfig, DatabaseConfig, JwtConfig},
    db::ConnectionPool,
    users::{
        memory::MemoryUserStore,
        repo::{PgUserRepository, UserStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects, probes and prepares the schema. Any failure here is fatal.
    pub async fn init(config: AppConfig) -> anyhow::Result<(Self, ConnectionPool)> {
        let pool = ConnectionPool::connect_lazy(&config.database)?;
        pool.probe().await.context("database unreachable at startup")?;

        let repo = PgUserRepository::new(pool.clone());
        repo.ensure_schema().await.context("ensure users schema")?;

        let state = Self::from_parts(Arc::new(repo), Arc::new(config));
        Ok((state, pool))
    }

    pub fn from_parts(users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { users, config }
    }

    /// State backed by [`MemoryUserStore`] with fixed test settings.
    pub fn in_memory() -> Self {
        let config = AppConfig {
            environment: "test".into(),
            database: DatabaseConfig {
                url: None,
                host: "localhost".into(),
                port: 5432,
                user: "postgres".into(),
                password: String::new(),
                name: "userhub".into(),
                max_connections: 10,
                acquire_timeout_secs: 5,
            },
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            cors_origin: "http://localhost:5173".into(),
            api_version: "v1".into(),
            host: "127.0.0.1".into(),
            port: 0,
        };
        Self::from_parts(Arc::new(MemoryUserStore::new()), Arc::new(config))
    }
}
