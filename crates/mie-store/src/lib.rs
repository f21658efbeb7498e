//! Durable scenario cache for `mie-core`.
//!
//! A SQLite [`CacheIndex`] maps exact scenario keys to artifact files; the
//! [`MieDatabase`] service resolves requests against it, computing and
//! registering an artifact on a miss.

pub mod artifact;
pub mod config;
pub mod database;
pub mod error;
pub mod index;
pub mod schema;
pub mod solver;

pub use artifact::{Artifact, Matrix, ParticleGroup};
pub use config::{MieConfig, load_scenario};
pub use database::MieDatabase;
pub use error::{ArtifactError, ConfigError, RequestError, Result, StoreError};
pub use index::{CacheEntry, CacheIndex};
pub use solver::{MieSolver, SolveHandle};
