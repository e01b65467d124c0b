//! Schema versioning for the SQLite store.
//!
//! `schema_version` holds one row per applied step. Each step runs inside its
//! own transaction together with its version row, so a failed step leaves the
//! store at the previous version.

use crate::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[Step {
    version: 1,
    name: "kv_store",
    sql: include_str!("../../migrations/001_kv_store.sql"),
}];

/// Latest schema version this build knows about.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Bring the schema up to `latest_version`, returning the version found before.
///
/// # Errors
///
/// `MigrationFailed` when the store is newer than this build or a step fails.
pub async fn run(conn: &Connection) -> Result<u32, Error> {
    conn.call(|conn| -> Result<u32, Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let found: u32 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))?;
        if found > latest_version() {
            return Err(Error::MigrationFailed(format!(
                "store is at schema version {found}, this build supports up to {}",
                latest_version()
            )));
        }

        for step in STEPS.iter().filter(|step| step.version > found) {
            apply(conn, step).map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", step.version, step.name)))?;
            tracing::debug!(version = step.version, name = step.name, "applied storage schema step");
        }
        Ok(found)
    })
    .await
    .map_err(Error::from)
}

fn apply(conn: &mut rusqlite::Connection, step: &Step) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(step.sql)?;
    tx.execute(
        "INSERT INTO schema_version (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![step.version, step.name, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.commit()
}
