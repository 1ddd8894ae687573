use anyhow::Context;
use sqlx::{
    pool::PoolConnection,
    postgres::{PgPool, PgPoolOptions},
    Postgres,
};
use tracing::{info, instrument};

use crate::{config::DatabaseConfig, error::RepoError};

/// Bounded set of PostgreSQL connections shared by all requests.
///
/// A connection handed out by [`ConnectionPool::acquire`] goes back to the
/// pool when the handle is dropped, so release happens exactly once on every
/// exit path.
#[derive(Clone, Debug)]
pub struct ConnectionPool {
    inner: PgPool,
}

impl ConnectionPool {
    /// Builds the pool without opening any connection yet; call
    /// [`probe`](Self::probe) to verify reachability.
    pub fn connect_lazy(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let options = cfg.connect_options()?;
        let inner = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(cfg.acquire_timeout())
            .connect_lazy_with(options);
        Ok(Self { inner })
    }

    pub fn from_pool(inner: PgPool) -> Self {
        Self { inner }
    }

    /// Checks out one connection, waiting up to the configured acquire
    /// timeout when every connection is busy.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, RepoError> {
        self.inner.acquire().await.map_err(RepoError::Connection)
    }

    /// One acquire/query/release round trip. Startup must abort if this fails.
    #[instrument(skip(self))]
    pub async fn probe(&self) -> anyhow::Result<()> {
        let mut conn = self
            .inner
            .acquire()
            .await
            .context("acquire connection for startup probe")?;
        sqlx::query("SELECT 1")
            .execute(&mut *conn)
            .await
            .context("run startup probe query")?;
        info!(
            max_connections = self.inner.options().get_max_connections(),
            "database reachable"
        );
        Ok(())
    }

    pub fn size(&self) -> u32 {
        self.inner.size()
    }

    pub async fn close(&self) {
        self.inner.close().await;
        info!("database pool closed");
    }
}
