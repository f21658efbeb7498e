//! Background solves and the application-facing solver wrapper.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mie_core::ScenarioRequest;

use crate::artifact::{Artifact, Matrix};
use crate::database::MieDatabase;
use crate::error::RequestError;

type Outcome = Result<PathBuf, RequestError>;

/// A request being resolved on its own thread.
pub struct SolveHandle {
    handle: JoinHandle<Outcome>,
}

impl SolveHandle {
    pub(crate) fn spawn<F>(f: F) -> Result<Self, RequestError>
    where
        F: FnOnce() -> Outcome + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("mie-solve".to_string())
            .spawn(f)
            .map_err(|e| RequestError::Interrupted(format!("cannot start solve thread: {e}")))?;
        Ok(Self { handle })
    }

    pub fn is_solved(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the solve finishes.
    pub fn wait(self) -> Outcome {
        self.handle.join().unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "solve thread panicked".to_string());
            Err(RequestError::Interrupted(reason))
        })
    }
}

/// One scenario bound to a database, stepping from unsolved to a loaded
/// artifact.
pub struct MieSolver {
    db: Arc<MieDatabase>,
    request: ScenarioRequest,
    pending: Option<SolveHandle>,
    path: Option<PathBuf>,
    artifact: Option<Artifact>,
}

impl MieSolver {
    pub fn new(db: Arc<MieDatabase>, request: ScenarioRequest) -> Self {
        Self {
            db,
            request,
            pending: None,
            path: None,
            artifact: None,
        }
    }

    /// Start (or, in the foreground, run) a solve. Does nothing while a
    /// background solve is still in flight.
    pub fn solve_step(&mut self, run_in_background: bool) -> Result<(), RequestError> {
        if self.pending.is_some() {
            return Ok(());
        }
        if run_in_background {
            self.pending = Some(self.db.spawn(self.request.clone())?);
            return Ok(());
        }
        let path = self.db.resolve(&self.request)?;
        self.load(path)
    }

    /// Block on a background solve, if any, and load its artifact.
    pub fn wait(&mut self) -> Result<(), RequestError> {
        match self.pending.take() {
            Some(handle) => {
                let path = handle.wait()?;
                self.load(path)
            }
            None => Ok(()),
        }
    }

    pub fn is_solved(&self) -> bool {
        self.artifact.is_some() || self.pending.as_ref().is_some_and(SolveHandle::is_solved)
    }

    fn load(&mut self, path: PathBuf) -> Result<(), RequestError> {
        let artifact = Artifact::read(&path).map_err(RequestError::Read)?;
        self.artifact = Some(artifact);
        self.path = Some(path);
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn wavelengths(&self) -> Option<&[f64]> {
        self.artifact.as_ref().map(|a| a.wavelengths.as_slice())
    }

    /// Cross sections of particle group 0.
    pub fn cross_sections(&self) -> Option<&[f64]> {
        self.artifact
            .as_ref()
            .and_then(|a| a.group(0))
            .map(|g| g.cross_sections.as_slice())
    }

    /// Inverse CDF of particle group 0.
    pub fn inverse_cdf(&self) -> Option<&Matrix> {
        self.artifact
            .as_ref()
            .and_then(|a| a.group(0))
            .map(|g| &g.inverse_cdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_becomes_interrupted() {
        let handle = SolveHandle::spawn(|| panic!("kernel exploded")).unwrap();
        match handle.wait() {
            Err(RequestError::Interrupted(reason)) => assert_eq!(reason, "kernel exploded"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_handle_reports_completion() {
        let handle = SolveHandle::spawn(|| Ok(PathBuf::from("done.mie"))).unwrap();
        while !handle.is_solved() {
            thread::yield_now();
        }
        assert_eq!(handle.wait().unwrap(), PathBuf::from("done.mie"));
    }
}
