//! One connection pool per process, shared by every repository (§4.4).

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseSection;

const MAX_IDLE_TIME: Duration = Duration::from_secs(30);

/// `test_before_acquire` stands in for the health-check cadence called
/// for in §4.4 — sqlx validates a connection with a cheap round trip
/// before handing it out rather than polling on a fixed period.
pub async fn connect(db: &DatabaseSection) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(db.max_connections)
        .min_connections(db.max_idle_connections)
        .max_lifetime(Duration::from_secs(db.connection_max_lifetime))
        .idle_timeout(MAX_IDLE_TIME)
        .test_before_acquire(true)
        .connect(&db.connection_string())
        .await
        .context("failed to connect to the database pool")
}
