//! Mie scattering data pipeline.
//!
//! Expands a scattering scenario (particle and host refractive indices, a
//! particle-size distribution and a wavelength range) into independent
//! (diameter, wavelength) work items, evaluates a spherical scattering kernel
//! over them on a bounded worker pool, and aggregates the per-item results
//! either per diameter ("raw") or as one size-distribution-weighted
//! representative particle ("effective").
//!
//! Zero I/O. Persistence and caching live in `mie-store`.

pub mod aggregate;
pub mod constants;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod pipeline;
pub mod scenario;

pub use aggregate::{Aggregated, DiameterGroup, EffectiveRecord, OutputMode, aggregate};
pub use constants::{MIN_EFFECTIVE_DIAMETERS, Sampling, WEIGHT_SUM_TOLERANCE};
pub use distribution::{DiameterWeights, lognormal_pdf};
pub use engine::{ComputeEngine, ResultRecord, cumulative_distribution, evaluate, invert_cdf};
pub use error::{MieError, Result};
pub use grid::{SampleGrid, WorkItem, build, linspace};
pub use kernel::{Amplitudes, BhMie, ScatteringKernel};
pub use pipeline::{Computed, compute};
pub use scenario::{Distribution, DistributionKind, GridRange, ScenarioKey, ScenarioRequest};
