//! Per-diameter weights for the effective model.

use std::f64::consts::PI;

use crate::constants::WEIGHT_SUM_TOLERANCE;
use crate::error::{MieError, Result};
use crate::scenario::Distribution;

/// Log-normal probability density with log-mean `mu` and log-deviation `sigma`.
///
/// Same parameterisation as a log-normal with shape `sigma` and scale `e^mu`.
pub fn lognormal_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let z = (x.ln() - mu) / sigma;
    (-0.5 * z * z).exp() / (x * sigma * (2.0 * PI).sqrt())
}

/// Normalized weight for each grid diameter.
///
/// Weights are looked up by exact diameter value, never by position.
#[derive(Debug, Clone, PartialEq)]
pub struct DiameterWeights {
    /// Sorted ascending by diameter.
    entries: Vec<(f64, f64)>,
}

impl DiameterWeights {
    /// Pair `weights` with `diameters` and normalize them to sum to 1.
    ///
    /// Weights already summing to 1 within [`WEIGHT_SUM_TOLERANCE`] are kept
    /// bit-for-bit; anything else is divided by its sum. A zero sum is
    /// rejected.
    pub fn normalized(diameters: &[f64], weights: &[f64]) -> Result<Self> {
        if diameters.len() != weights.len() {
            return Err(MieError::config(format!(
                "{} weights supplied for {} diameters",
                weights.len(),
                diameters.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(MieError::config(format!(
                "weights must be finite and non-negative, got {w}"
            )));
        }

        let sum: f64 = weights.iter().sum();
        if sum == 0.0 {
            return Err(MieError::config("weights sum to zero"));
        }
        let scale = if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
            None
        } else {
            Some(sum)
        };

        let mut entries: Vec<(f64, f64)> = diameters
            .iter()
            .zip(weights)
            .map(|(&d, &w)| (d, scale.map_or(w, |s| w / s)))
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { entries })
    }

    /// Weights for `diameters` drawn from `distribution`.
    ///
    /// Log-normal weights are the density evaluated at each grid point and
    /// renormalized over the grid: a discretization of the continuous
    /// density, not its integral over each grid cell.
    pub fn from_distribution(distribution: &Distribution, diameters: &[f64]) -> Result<Self> {
        match distribution {
            Distribution::LogNormal { mu, sigma } => {
                let pdf: Vec<f64> = diameters
                    .iter()
                    .map(|&d| lognormal_pdf(d, *mu, *sigma))
                    .collect();
                Self::normalized(diameters, &pdf)
            }
            Distribution::Arbitrary { weights, .. } => Self::normalized(diameters, weights),
        }
    }

    pub fn get(&self, diameter: f64) -> Option<f64> {
        self.entries
            .binary_search_by(|(d, _)| d.total_cmp(&diameter))
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }
}
