//! Readiness probe consumed by the external health endpoint. The core
//! does not serve HTTP itself; it just answers whether the store is
//! reachable.

use rusqlite::Connection;
use serde::Serialize;

use crate::config::APP_VERSION;

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// Probe database connectivity and report overall status.
pub fn check(conn: &Connection) -> HealthStatus {
    match conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
        Ok(_) => HealthStatus {
            status: "healthy",
            database: "connected",
            version: APP_VERSION,
        },
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            HealthStatus {
                status: "unhealthy",
                database: "unreachable",
                version: APP_VERSION,
            }
        }
    }
}
