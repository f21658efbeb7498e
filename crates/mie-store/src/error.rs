use std::path::PathBuf;

use mie_core::MieError;
use thiserror::Error;

/// Cache Index failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    /// An entry already exists for this key and no recompute was forced.
    #[error("scenario already indexed at {}", existing.display())]
    DuplicateKey { existing: PathBuf },
}

/// Artifact file failures, on write or on read-back.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("invalid artifact: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Everything a cache request can surface to its caller. Nothing is retried.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Rejected scenario; no computation was started.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A kernel evaluation failed; the batch was abandoned.
    #[error("kernel error at diameter {diameter}, wavelength {wavelength}: {reason}")]
    Kernel {
        diameter: f64,
        wavelength: f64,
        reason: String,
    },

    #[error("cache index error: {0}")]
    Store(#[from] StoreError),

    /// Artifact could not be written; nothing was registered.
    #[error("artifact write error: {0}")]
    Write(#[from] ArtifactError),

    /// A registered artifact could not be loaded back.
    #[error("artifact read error: {0}")]
    Read(#[source] ArtifactError),

    /// A worker thread panicked while solving or while holding a lock.
    #[error("solve interrupted: {0}")]
    Interrupted(String),
}

impl From<MieError> for RequestError {
    fn from(e: MieError) -> Self {
        match e {
            MieError::Configuration(msg) => RequestError::Configuration(msg),
            MieError::Kernel {
                diameter,
                wavelength,
                reason,
            } => RequestError::Kernel {
                diameter,
                wavelength,
                reason,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
