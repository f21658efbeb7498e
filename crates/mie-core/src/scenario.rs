//! Scenario description and the exact-match cache key derived from it.
//!
//! Diameters and wavelengths share one length unit chosen by the caller.
//! Nothing in the pipeline converts units.

use std::fmt::Write as _;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::constants::MIN_EFFECTIVE_DIAMETERS;
use crate::error::{MieError, Result};
use crate::grid::linspace;

/// Inclusive, linearly spaced sampling range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridRange {
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl GridRange {
    pub fn new(min: f64, max: f64, n: usize) -> Self {
        Self { min, max, n }
    }

    pub fn samples(&self) -> Vec<f64> {
        linspace(self.min, self.max, self.n)
    }

    fn validate(&self, what: &str) -> Result<()> {
        if self.n == 0 {
            return Err(MieError::config(format!("{what} grid has zero points")));
        }
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(MieError::config(format!("{what} bounds must be finite")));
        }
        if self.min <= 0.0 {
            return Err(MieError::config(format!(
                "{what} lower bound must be positive, got {}",
                self.min
            )));
        }
        if self.min > self.max {
            return Err(MieError::config(format!(
                "{what} lower bound {} exceeds upper bound {}",
                self.min, self.max
            )));
        }
        if self.n > 1 && self.min == self.max {
            return Err(MieError::config(format!(
                "{what} grid has {} points but min equals max ({})",
                self.n, self.min
            )));
        }
        Ok(())
    }
}

/// Particle-size distribution used to weight diameters in effective mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Log-normal density with log-mean `mu` and log-deviation `sigma`.
    LogNormal { mu: f64, sigma: f64 },
    /// Caller-supplied per-diameter weights. Only `id_1` and `id_2` take part
    /// in the cache key; they catalogue the distribution, the weights do not.
    Arbitrary {
        id_1: f64,
        id_2: f64,
        #[serde(default)]
        weights: Vec<f64>,
    },
}

impl Distribution {
    pub fn kind(&self) -> DistributionKind {
        match self {
            Distribution::LogNormal { .. } => DistributionKind::LogNormal,
            Distribution::Arbitrary { .. } => DistributionKind::Arbitrary,
        }
    }

    /// The two numbers that identify this distribution in the key.
    pub fn descriptor(&self) -> (f64, f64) {
        match self {
            Distribution::LogNormal { mu, sigma } => (*mu, *sigma),
            Distribution::Arbitrary { id_1, id_2, .. } => (*id_1, *id_2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    LogNormal,
    Arbitrary,
}

impl DistributionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionKind::LogNormal => "lognormal",
            DistributionKind::Arbitrary => "arbitrary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lognormal" => Some(DistributionKind::LogNormal),
            "arbitrary" => Some(DistributionKind::Arbitrary),
            _ => None,
        }
    }
}

/// Exact-match cache key. Two keys are equal iff every field compares equal
/// with plain `==`; no tolerance is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioKey {
    pub n_particle_re: f64,
    pub n_particle_im: f64,
    pub n_host: f64,
    pub distribution_kind: DistributionKind,
    /// `mu` for log-normal, `id_1` for arbitrary.
    pub distribution_a: f64,
    /// `sigma` for log-normal, `id_2` for arbitrary.
    pub distribution_b: f64,
    pub effective_model: bool,
    pub wavelengths: GridRange,
    pub diameters: GridRange,
}

impl ScenarioKey {
    /// Stable textual form of the key, equal for keys that compare equal.
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(160);
        let _ = write!(
            out,
            "{}|{}|{}",
            self.distribution_kind.as_str(),
            self.effective_model as u8,
            self.wavelengths.n
        );
        let _ = write!(out, "|{}", self.diameters.n);
        for v in [
            self.n_particle_re,
            self.n_particle_im,
            self.n_host,
            self.distribution_a,
            self.distribution_b,
            self.wavelengths.min,
            self.wavelengths.max,
            self.diameters.min,
            self.diameters.max,
        ] {
            let _ = write!(out, "|{:016x}", canonical_bits(v));
        }
        out
    }
}

/// Bit pattern of `v`, with -0.0 folded onto 0.0 so that `==` and the
/// canonical form agree.
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 { 0 } else { v.to_bits() }
}

fn default_effective() -> bool {
    true
}

/// A request for scattering data, as received from the application wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub n_particle_re: f64,
    #[serde(default)]
    pub n_particle_im: f64,
    pub n_host: f64,
    pub distribution: Distribution,
    #[serde(default = "default_effective")]
    pub effective_model: bool,
    pub wavelengths: GridRange,
    pub diameters: GridRange,
    /// Compute a fresh artifact even if one is already indexed.
    #[serde(default)]
    pub force_recompute: bool,
}

impl ScenarioRequest {
    pub fn log_normal(
        n_particle: Complex64,
        n_host: f64,
        mu: f64,
        sigma: f64,
        wavelengths: GridRange,
        diameters: GridRange,
    ) -> Self {
        Self {
            n_particle_re: n_particle.re,
            n_particle_im: n_particle.im,
            n_host,
            distribution: Distribution::LogNormal { mu, sigma },
            effective_model: true,
            wavelengths,
            diameters,
            force_recompute: false,
        }
    }

    pub fn n_particle(&self) -> Complex64 {
        Complex64::new(self.n_particle_re, self.n_particle_im)
    }

    pub fn key(&self) -> ScenarioKey {
        let (distribution_a, distribution_b) = self.distribution.descriptor();
        ScenarioKey {
            n_particle_re: self.n_particle_re,
            n_particle_im: self.n_particle_im,
            n_host: self.n_host,
            distribution_kind: self.distribution.kind(),
            distribution_a,
            distribution_b,
            effective_model: self.effective_model,
            wavelengths: self.wavelengths,
            diameters: self.diameters,
        }
    }

    /// Reject scenarios that cannot produce a meaningful artifact.
    ///
    /// Runs before any work is dispatched; every failure is a
    /// [`MieError::Configuration`].
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("particle refractive index (real)", self.n_particle_re),
            ("particle refractive index (imaginary)", self.n_particle_im),
            ("host refractive index", self.n_host),
        ] {
            if !v.is_finite() {
                return Err(MieError::config(format!("{name} must be finite")));
            }
        }
        if self.n_host <= 0.0 {
            return Err(MieError::config(format!(
                "host refractive index must be positive, got {}",
                self.n_host
            )));
        }

        self.diameters.validate("particle diameter")?;
        self.wavelengths.validate("wavelength")?;

        let (a, b) = self.distribution.descriptor();
        if !a.is_finite() || !b.is_finite() {
            return Err(MieError::config("distribution descriptor must be finite"));
        }

        if !self.effective_model {
            return Ok(());
        }

        let distinct = distinct_count(&self.diameters.samples());
        if distinct < MIN_EFFECTIVE_DIAMETERS {
            return Err(MieError::config(format!(
                "effective model needs at least {MIN_EFFECTIVE_DIAMETERS} distinct diameters, grid has {distinct}"
            )));
        }

        match &self.distribution {
            Distribution::LogNormal { sigma, .. } if *sigma <= 0.0 => Err(MieError::config(
                format!("log-normal sigma must be positive, got {sigma}"),
            )),
            Distribution::Arbitrary { weights, .. } if weights.len() != self.diameters.n => {
                Err(MieError::config(format!(
                    "{} weights supplied for {} diameters",
                    weights.len(),
                    self.diameters.n
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Count distinct values in an ascending sequence.
pub(crate) fn distinct_count(sorted: &[f64]) -> usize {
    if sorted.is_empty() {
        return 0;
    }
    1 + sorted.windows(2).filter(|w| w[0] != w[1]).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ScenarioRequest {
        ScenarioRequest::log_normal(
            Complex64::new(1.83, 0.0),
            1.55,
            2.4849,
            0.3878,
            GridRange::new(0.4, 0.8, 10),
            GridRange::new(1.0, 20.0, 20),
        )
    }

    #[test]
    fn test_valid_request_passes() {
        request().validate().unwrap();
    }

    #[test]
    fn test_zero_count_grid_rejected() {
        let mut req = request();
        req.wavelengths.n = 0;
        assert!(matches!(req.validate(), Err(MieError::Configuration(_))));
    }

    #[test]
    fn test_effective_needs_ten_diameters() {
        let mut req = request();
        req.diameters = GridRange::new(1.0, 5.0, 5);
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("at least 10"), "got: {err}");

        req.effective_model = false;
        req.validate().unwrap();
    }

    #[test]
    fn test_effective_counts_distinct_diameters() {
        let mut req = request();
        req.diameters = GridRange::new(3.0, 3.0, 12);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_repeated_point_grid_rejected() {
        let mut req = request();
        req.wavelengths = GridRange::new(0.5, 0.5, 2);
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("min equals max"), "got: {err}");

        let mut req = request();
        req.effective_model = false;
        req.diameters = GridRange::new(1.0, 1.0, 3);
        assert!(matches!(req.validate(), Err(MieError::Configuration(_))));

        req.diameters = GridRange::new(1.0, 1.0, 1);
        req.wavelengths = GridRange::new(0.5, 0.5, 1);
        req.validate().unwrap();
    }

    #[test]
    fn test_arbitrary_weight_length_checked() {
        let mut req = request();
        req.distribution = Distribution::Arbitrary {
            id_1: 1.0,
            id_2: 2.0,
            weights: vec![1.0; 19],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_non_positive_bounds_rejected() {
        let mut req = request();
        req.wavelengths.min = 0.0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.n_host = -1.0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.diameters.min = 30.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_key_ignores_force_flag_and_weights() {
        let mut a = request();
        a.distribution = Distribution::Arbitrary {
            id_1: 1.0,
            id_2: 2.0,
            weights: vec![1.0; 20],
        };
        let mut b = a.clone();
        b.force_recompute = true;
        b.distribution = Distribution::Arbitrary {
            id_1: 1.0,
            id_2: 2.0,
            weights: vec![2.0; 20],
        };
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().canonical(), b.key().canonical());
    }

    #[test]
    fn test_key_discriminates_every_field() {
        let base = request().key();
        let mut variants = Vec::new();

        let mut k = base;
        k.n_particle_re = 1.84;
        variants.push(k);
        let mut k = base;
        k.n_particle_im = 0.01;
        variants.push(k);
        let mut k = base;
        k.n_host = 1.56;
        variants.push(k);
        let mut k = base;
        k.distribution_kind = DistributionKind::Arbitrary;
        variants.push(k);
        let mut k = base;
        k.distribution_a = 2.5;
        variants.push(k);
        let mut k = base;
        k.distribution_b = 0.4;
        variants.push(k);
        let mut k = base;
        k.effective_model = false;
        variants.push(k);
        let mut k = base;
        k.wavelengths.n = 11;
        variants.push(k);
        let mut k = base;
        k.wavelengths.min = 0.41;
        variants.push(k);
        let mut k = base;
        k.wavelengths.max = 0.81;
        variants.push(k);
        let mut k = base;
        k.diameters.n = 21;
        variants.push(k);
        let mut k = base;
        k.diameters.min = 1.5;
        variants.push(k);
        let mut k = base;
        k.diameters.max = 21.0;
        variants.push(k);

        for v in variants {
            assert_ne!(v, base);
            assert_ne!(v.canonical(), base.canonical());
        }
    }

    #[test]
    fn test_canonical_folds_negative_zero() {
        let mut a = request().key();
        let mut b = a;
        a.n_particle_im = 0.0;
        b.n_particle_im = -0.0;
        assert_eq!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }
}
