use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::{Deserialize, Serialize};

use mie_core::ScenarioRequest;

use crate::error::ConfigError;

/// Default base directory for the index and artifacts.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".mie-cache")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Locations and the worker budget. Every field has a default, so an empty
/// TOML file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MieConfig {
    pub data_dir: PathBuf,
    /// Index database file name inside `data_dir`.
    pub index_file: String,
    /// Artifact directory; relative paths are taken from `data_dir`.
    pub artifact_dir: PathBuf,
    /// Fixed worker pool size shared by all requests.
    pub workers: usize,
}

impl Default for MieConfig {
    fn default() -> Self {
        Self {
            data_dir: default_base_dir(),
            index_file: "mie_database.db".to_string(),
            artifact_dir: PathBuf::from("MieDataFiles"),
            workers: 10,
        }
    }
}

impl MieConfig {
    /// Read from `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => read_toml(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.data_dir.join(&self.artifact_dir)
    }
}

/// Parse a scenario request from a TOML file.
pub fn load_scenario(path: &Path) -> Result<ScenarioRequest, ConfigError> {
    read_toml(path)
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
