//! Sample grid expansion: scenario → ordered (diameter, wavelength) work items.

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;

use crate::constants::Sampling;
use crate::error::Result;
use crate::scenario::ScenarioRequest;

/// `n` evenly spaced values from `min` to `max` inclusive.
///
/// `n == 1` yields `[min]`; the last sample is pinned to `max` exactly.
pub fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| min + i as f64 * step).collect();
            out[n - 1] = max;
            out
        }
    }
}

/// One independent kernel evaluation.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub diameter: f64,
    pub wavelength: f64,
    pub n_particle: Complex64,
    pub n_host: f64,
    /// Scattering angles in radians, shared by every item of a batch.
    pub theta: Arc<[f64]>,
    pub random_variates: usize,
}

impl WorkItem {
    /// Half-range angle count handed to the kernel.
    pub fn theta_angles(&self) -> usize {
        self.theta.len().div_ceil(2)
    }
}

/// Sample points of a validated scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    pub diameters: Vec<f64>,
    pub wavelengths: Vec<f64>,
    pub sampling: Sampling,
}

impl SampleGrid {
    pub fn from_scenario(scenario: &ScenarioRequest) -> Result<Self> {
        scenario.validate()?;
        Ok(Self {
            diameters: scenario.diameters.samples(),
            wavelengths: scenario.wavelengths.samples(),
            sampling: Sampling::for_mode(scenario.effective_model),
        })
    }

    pub fn len(&self) -> usize {
        self.diameters.len() * self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Theta grid over [0, π] for this sampling.
    pub fn theta(&self) -> Vec<f64> {
        linspace(0.0, PI, self.sampling.theta_points())
    }

    /// Cartesian product, diameter-major and wavelength-minor.
    pub fn work_items(&self, scenario: &ScenarioRequest) -> Vec<WorkItem> {
        let theta: Arc<[f64]> = self.theta().into();
        let n_particle = scenario.n_particle();
        let mut items = Vec::with_capacity(self.len());
        for &diameter in &self.diameters {
            for &wavelength in &self.wavelengths {
                items.push(WorkItem {
                    diameter,
                    wavelength,
                    n_particle,
                    n_host: scenario.n_host,
                    theta: Arc::clone(&theta),
                    random_variates: self.sampling.random_variates,
                });
            }
        }
        items
    }
}

/// Expand a scenario into its work items.
pub fn build(scenario: &ScenarioRequest) -> Result<Vec<WorkItem>> {
    let grid = SampleGrid::from_scenario(scenario)?;
    Ok(grid.work_items(scenario))
}
