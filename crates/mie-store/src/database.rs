//! The cache service: lookup, compute on miss, write, register.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use mie_core::{ComputeEngine, ScatteringKernel, ScenarioKey, ScenarioRequest, compute};

use crate::artifact::{self, Artifact};
use crate::config::MieConfig;
use crate::error::{RequestError, StoreError};
use crate::index::{CacheEntry, CacheIndex};
use crate::solver::SolveHandle;

type Slot = Arc<Mutex<()>>;

/// Scenario cache backed by one index, one artifact directory and one shared
/// worker pool.
///
/// At most one computation runs per key at a time: a second caller for the
/// same key waits for the first and then sees its entry.
pub struct MieDatabase {
    index: Mutex<CacheIndex>,
    engine: ComputeEngine,
    data_dir: PathBuf,
    artifact_dir: PathBuf,
    inflight: Mutex<HashMap<String, Slot>>,
}

fn poisoned(what: &str) -> RequestError {
    RequestError::Interrupted(format!("{what} lock poisoned"))
}

impl MieDatabase {
    pub fn open(config: &MieConfig) -> Result<Self, RequestError> {
        let engine = ComputeEngine::new(config.workers)?;
        Self::with_engine(config, engine)
    }

    /// Same as [`MieDatabase::open`] with a substitute kernel.
    pub fn with_kernel(
        config: &MieConfig,
        kernel: Arc<dyn ScatteringKernel>,
    ) -> Result<Self, RequestError> {
        let engine = ComputeEngine::with_kernel(config.workers, kernel)?;
        Self::with_engine(config, engine)
    }

    fn with_engine(config: &MieConfig, engine: ComputeEngine) -> Result<Self, RequestError> {
        let index = CacheIndex::open(&config.index_path())?;
        let entries = index.count()?;
        tracing::debug!(
            index = %config.index_path().display(),
            entries,
            workers = engine.workers(),
            "cache opened"
        );
        Ok(Self {
            index: Mutex::new(index),
            engine,
            data_dir: config.data_dir.clone(),
            artifact_dir: config.artifact_path(),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    pub fn engine(&self) -> &ComputeEngine {
        &self.engine
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Path of an artifact for `request`, computing and registering one if
    /// the key is not yet indexed or a recompute is forced.
    pub fn resolve(&self, request: &ScenarioRequest) -> Result<PathBuf, RequestError> {
        request.validate()?;
        let key = request.key();
        let canonical = key.canonical();

        let slot = self.acquire_slot(&canonical)?;
        // The slot guards no data; a poisoned lock is still usable.
        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            self.resolve_locked(request, &key)
        };
        self.release_slot(&canonical, slot);
        result
    }

    fn resolve_locked(
        &self,
        request: &ScenarioRequest,
        key: &ScenarioKey,
    ) -> Result<PathBuf, RequestError> {
        if !request.force_recompute
            && let Some(path) = self.lookup(key)?
        {
            tracing::info!(path = %path.display(), "cache hit");
            return Ok(path);
        }
        tracing::info!(
            forced = request.force_recompute,
            diameters = key.diameters.n,
            wavelengths = key.wavelengths.n,
            "cache miss, computing"
        );
        let started = Instant::now();

        let computed = compute(&self.engine, request)?;
        let artifact = Artifact::from_computed(&computed)?;
        let path = artifact.write(&self.artifact_dir, &artifact::file_name(key))?;

        let registered = self.index()?.insert(key, &self.stored_path(&path), request.force_recompute);
        match registered {
            Ok(()) => {
                tracing::info!(
                    path = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "artifact registered"
                );
                Ok(path)
            }
            // Another process registered the key first; keep its artifact.
            Err(StoreError::DuplicateKey { existing }) => {
                discard(&path);
                Ok(self.absolute(existing))
            }
            Err(e) => {
                discard(&path);
                Err(e.into())
            }
        }
    }

    /// Indexed path for `key`, without computing.
    pub fn lookup(&self, key: &ScenarioKey) -> Result<Option<PathBuf>, RequestError> {
        let found = self.index()?.lookup(key)?;
        Ok(found.map(|p| self.absolute(p)))
    }

    /// Every index entry, newest first, with absolute paths.
    pub fn entries(&self) -> Result<Vec<CacheEntry>, RequestError> {
        let mut entries = self.index()?.entries()?;
        for entry in &mut entries {
            entry.path = self.absolute(std::mem::take(&mut entry.path));
        }
        Ok(entries)
    }

    /// Resolve `request` on a new thread.
    pub fn spawn(self: &Arc<Self>, request: ScenarioRequest) -> Result<SolveHandle, RequestError> {
        let db = Arc::clone(self);
        SolveHandle::spawn(move || db.resolve(&request))
    }

    fn index(&self) -> Result<MutexGuard<'_, CacheIndex>, RequestError> {
        self.index.lock().map_err(|_| poisoned("cache index"))
    }

    fn acquire_slot(&self, canonical: &str) -> Result<Slot, RequestError> {
        let mut inflight = self.inflight.lock().map_err(|_| poisoned("in-flight table"))?;
        Ok(Arc::clone(inflight.entry(canonical.to_string()).or_default()))
    }

    fn release_slot(&self, canonical: &str, slot: Slot) {
        let Ok(mut inflight) = self.inflight.lock() else {
            return;
        };
        // The map and `slot` are the only holders: nobody else is waiting.
        if Arc::strong_count(&slot) <= 2 {
            inflight.remove(canonical);
        }
    }

    /// Paths under the data directory are registered relative to it.
    fn stored_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.data_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    fn absolute(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.data_dir.join(path)
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), "failed to remove unregistered artifact: {e}");
    }
}
