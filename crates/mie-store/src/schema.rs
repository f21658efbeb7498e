use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 2;

pub fn initialize(conn: &Connection) -> Result<()> {
    // Fails on anything that is not a SQLite database, before any DDL runs.
    conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))?;

    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Errors are non-fatal: in-memory databases and fresh files fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::info!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS artifacts (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            distribution_kind TEXT    NOT NULL,
            n_particle_r      REAL    NOT NULL,
            n_particle_j      REAL    NOT NULL,
            n_host            REAL    NOT NULL,
            distribution_a    REAL    NOT NULL,
            distribution_b    REAL    NOT NULL,
            effective_model   INTEGER NOT NULL,
            wavelen_n         INTEGER NOT NULL,
            wavelen_max       REAL    NOT NULL,
            wavelen_min       REAL    NOT NULL,
            particle_n        INTEGER NOT NULL,
            particle_max      REAL    NOT NULL,
            particle_min      REAL    NOT NULL,
            filename          TEXT    NOT NULL,
            created_at        TEXT    NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_artifacts_key ON artifacts(
            n_particle_r, n_particle_j, n_host, distribution_a, distribution_b,
            wavelen_n, particle_n
        );
        ",
    )?;

    if let Some(found) = get_schema_version(conn)?
        && found > SCHEMA_VERSION
    {
        return Err(StoreError::InvalidData(format!(
            "index schema version {found} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    import_legacy_table(conn)?;
    set_metadata(conn, "schema_version", &SCHEMA_VERSION.to_string())?;

    Ok(())
}

/// Copy rows from a pre-existing legacy `data` table into
/// `artifacts`. That layout had no distribution kind, so rows are taken as
/// log-normal. Runs once per database.
fn import_legacy_table(conn: &Connection) -> Result<()> {
    let has_legacy: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'data'",
            [],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
    if !has_legacy {
        return Ok(());
    }

    if get_metadata(conn, "legacy_imported")?.is_some() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    let count = tx.execute(
        "INSERT INTO artifacts (
            distribution_kind, n_particle_r, n_particle_j, n_host,
            distribution_a, distribution_b, effective_model,
            wavelen_n, wavelen_max, wavelen_min,
            particle_n, particle_max, particle_min, filename
         )
         SELECT 'lognormal', n_particle_r, n_particle_j, n_host,
                particle_mu, particle_sigma, effective_model,
                wavelen_n, wavelen_max, wavelen_min,
                particle_n, particle_max, particle_min, filename
         FROM data ORDER BY rowid",
        [],
    )?;
    set_metadata(&tx, "legacy_imported", &count.to_string())?;
    tx.commit()?;

    tracing::info!("imported {count} legacy index rows");
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    Ok(get_metadata(conn, "schema_version")?.and_then(|v| v.parse::<i64>().ok()))
}

fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}
