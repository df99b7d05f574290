pub mod models;

use std::time::Duration;

use anyhow::Result;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use self::models::NewReading;

/// Failure talking to the reading store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached: refused, closed, or no pooled
    /// connection became free in time.
    #[error("Database connection failed: {0}")]
    Transport(#[source] sqlx::Error),
    #[error("Database query failed: {0}")]
    Fault(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Transport(e),
            other => Self::Fault(other),
        }
    }
}

impl StoreError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Sole gateway to the reading store.
///
/// Cloning is cheap: all clones share one bounded pool. Connections handed
/// out by [`Store::connect`] go back to the pool when dropped, so every exit
/// path (including `?` early returns) releases them.
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `readings` table and its index if absent. Safe to call
    /// any number of times.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Acquires one connection from the pool.
    pub async fn connect(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        self.pool.acquire().await.map_err(StoreError::Transport)
    }

    /// Appends one reading and returns the id the store assigned to it.
    pub async fn insert(&self, reading: &NewReading) -> Result<i64, StoreError> {
        let mut conn = self.connect().await?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO readings (temperature, humidity, illuminance, recorded_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.illuminance)
        .bind(reading.recorded_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(id)
    }

    /// Round-trips a trivial query to prove the store is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}
