use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use mie_core::{DistributionKind, GridRange, ScenarioKey};

use crate::error::{Result, StoreError};
use crate::schema;

const KEY_MATCH: &str = "distribution_kind = ?1 AND n_particle_r = ?2 AND n_particle_j = ?3
     AND n_host = ?4 AND distribution_a = ?5 AND distribution_b = ?6
     AND effective_model = ?7 AND wavelen_n = ?8 AND wavelen_max = ?9
     AND wavelen_min = ?10 AND particle_n = ?11 AND particle_max = ?12
     AND particle_min = ?13";

const ENTRY_COLUMNS: &str = "id, distribution_kind, n_particle_r, n_particle_j, n_host,
     distribution_a, distribution_b, effective_model,
     wavelen_n, wavelen_max, wavelen_min,
     particle_n, particle_max, particle_min, filename, created_at";

/// One row of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub id: i64,
    pub key: ScenarioKey,
    /// As registered; relative paths are relative to the data directory.
    pub path: PathBuf,
    pub created_at: String,
}

/// SQLite table mapping scenario keys to artifact paths.
///
/// Several rows may share a key after a forced recompute; lookups return the
/// most recently inserted one.
pub struct CacheIndex {
    conn: Connection,
}

impl CacheIndex {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InvalidData(format!(
                    "cannot create index directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- Lookup ---

    /// Path of the newest entry whose key equals `key` field for field.
    pub fn lookup(&self, key: &ScenarioKey) -> Result<Option<PathBuf>> {
        lookup_on(&self.conn, key)
    }

    /// All entries, newest first.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM artifacts ORDER BY id DESC"
        ))?;
        let rows: Vec<RawEntry> = stmt
            .query_map([], RawEntry::from_row)?
            .collect::<std::result::Result<_, _>>()?;
        rows.into_iter().map(RawEntry::into_entry).collect()
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*) FROM artifacts", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // --- Insert ---

    /// Register `path` under `key`.
    ///
    /// Without `force`, an existing entry for the same key is an error and
    /// nothing is written. With `force`, a new row is appended and shadows
    /// the older ones.
    pub fn insert(&mut self, key: &ScenarioKey, path: &Path, force: bool) -> Result<()> {
        let filename = path
            .to_str()
            .ok_or_else(|| StoreError::InvalidData(format!("non-UTF-8 path {}", path.display())))?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !force && let Some(existing) = lookup_on(&tx, key)? {
            return Err(StoreError::DuplicateKey { existing });
        }
        tx.execute(
            "INSERT INTO artifacts (
                distribution_kind, n_particle_r, n_particle_j, n_host,
                distribution_a, distribution_b, effective_model,
                wavelen_n, wavelen_max, wavelen_min,
                particle_n, particle_max, particle_min, filename
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                key.distribution_kind.as_str(),
                key.n_particle_re,
                key.n_particle_im,
                key.n_host,
                key.distribution_a,
                key.distribution_b,
                key.effective_model as i64,
                key.wavelengths.n as i64,
                key.wavelengths.max,
                key.wavelengths.min,
                key.diameters.n as i64,
                key.diameters.max,
                key.diameters.min,
                filename,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    // --- Maintenance ---

    pub fn checkpoint_truncate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

impl Drop for CacheIndex {
    fn drop(&mut self) {
        if let Err(e) = self.checkpoint_truncate() {
            tracing::warn!("WAL checkpoint on close failed: {e}");
        }
    }
}

fn lookup_on(conn: &Connection, key: &ScenarioKey) -> Result<Option<PathBuf>> {
    let filename: Option<String> = conn
        .query_row(
            &format!("SELECT filename FROM artifacts WHERE {KEY_MATCH} ORDER BY id DESC LIMIT 1"),
            params![
                key.distribution_kind.as_str(),
                key.n_particle_re,
                key.n_particle_im,
                key.n_host,
                key.distribution_a,
                key.distribution_b,
                key.effective_model as i64,
                key.wavelengths.n as i64,
                key.wavelengths.max,
                key.wavelengths.min,
                key.diameters.n as i64,
                key.diameters.max,
                key.diameters.min,
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(filename.map(PathBuf::from))
}

struct RawEntry {
    id: i64,
    kind: String,
    floats: [f64; 9],
    effective: i64,
    wavelen_n: i64,
    particle_n: i64,
    filename: String,
    created_at: String,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            floats: [
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(9)?,
                row.get(10)?,
                row.get(12)?,
                row.get(13)?,
            ],
            effective: row.get(7)?,
            wavelen_n: row.get(8)?,
            particle_n: row.get(11)?,
            filename: row.get(14)?,
            created_at: row.get(15)?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry> {
        let kind = DistributionKind::parse(&self.kind).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown distribution kind '{}'", self.kind))
        })?;
        let count = |n: i64, what: &str| {
            usize::try_from(n)
                .map_err(|_| StoreError::InvalidData(format!("negative {what} count {n}")))
        };
        let [re, im, host, a, b, wmax, wmin, pmax, pmin] = self.floats;
        Ok(CacheEntry {
            id: self.id,
            key: ScenarioKey {
                n_particle_re: re,
                n_particle_im: im,
                n_host: host,
                distribution_kind: kind,
                distribution_a: a,
                distribution_b: b,
                effective_model: self.effective != 0,
                wavelengths: GridRange::new(wmin, wmax, count(self.wavelen_n, "wavelength")?),
                diameters: GridRange::new(pmin, pmax, count(self.particle_n, "diameter")?),
            },
            path: PathBuf::from(self.filename),
            created_at: self.created_at,
        })
    }
}
