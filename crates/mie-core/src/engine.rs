//! Parallel kernel evaluation over a fixed-size worker pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{MieError, Result};
use crate::grid::{WorkItem, linspace};
use crate::kernel::{BhMie, ScatteringKernel};

/// Kernel output for one work item. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub diameter: f64,
    pub wavelength: f64,
    pub size_parameter: f64,
    /// Extinction cross section, Q_ext · π (d/2)².
    pub cross_section: f64,
    /// Scattering angle in degrees for each uniformly spaced probability.
    pub inverse_cdf: Vec<f64>,
    pub phase_function: Vec<f64>,
    /// Normalized so the last value is exactly 1.
    pub cumulative_phase_function: Vec<f64>,
}

/// Trapezoidal running integral of `phase · sin θ` over `theta`, starting at 0.
pub fn cumulative_distribution(phase: &[f64], theta: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(theta.len());
    let mut acc = 0.0;
    out.push(acc);
    for i in 1..theta.len().min(phase.len()) {
        let a = phase[i - 1] * theta[i - 1].sin();
        let b = phase[i] * theta[i].sin();
        acc += 0.5 * (a + b) * (theta[i] - theta[i - 1]);
        out.push(acc);
    }
    out
}

/// Invert a non-decreasing cumulative curve at `n` uniformly spaced
/// probabilities in [0, 1].
///
/// Piecewise-linear between grid points. Where the curve is flat, the first
/// abscissa reaching the probability wins.
pub fn invert_cdf(xs: &[f64], cdf: &[f64], n: usize) -> Vec<f64> {
    linspace(0.0, 1.0, n)
        .into_iter()
        .map(|u| {
            let i = cdf.partition_point(|&c| c < u);
            if i == 0 {
                return xs[0];
            }
            if i >= cdf.len() {
                return xs[xs.len() - 1];
            }
            let (c0, c1) = (cdf[i - 1], cdf[i]);
            let t = (u - c0) / (c1 - c0);
            xs[i - 1] + t * (xs[i] - xs[i - 1])
        })
        .collect()
}

fn kernel_error(item: &WorkItem, reason: impl Into<String>) -> MieError {
    MieError::Kernel {
        diameter: item.diameter,
        wavelength: item.wavelength,
        reason: reason.into(),
    }
}

/// Evaluate one work item.
pub fn evaluate(kernel: &dyn ScatteringKernel, item: &WorkItem) -> Result<ResultRecord> {
    // Wavelength inside the host medium.
    let x = std::f64::consts::PI * item.diameter / (item.wavelength / item.n_host);
    let m = item.n_particle / item.n_host;
    let amp = kernel.scatter(x, m, item.theta_angles());

    if amp.s1.len() != item.theta.len() || amp.s2.len() != item.theta.len() {
        return Err(kernel_error(
            item,
            format!(
                "kernel returned {} angles, expected {}",
                amp.s1.len(),
                item.theta.len()
            ),
        ));
    }
    if !amp.q_ext.is_finite() || !amp.q_sca.is_finite() {
        return Err(kernel_error(item, "non-finite efficiency factor"));
    }
    if amp.q_sca <= 0.0 {
        return Err(kernel_error(
            item,
            format!("scattering efficiency {} is not positive", amp.q_sca),
        ));
    }

    let norm = amp.q_sca * x * x;
    let phase: Vec<f64> = amp
        .s1
        .iter()
        .zip(&amp.s2)
        .map(|(s1, s2)| (s1.norm_sqr() + s2.norm_sqr()) / norm)
        .collect();
    if phase.iter().any(|p| !p.is_finite()) {
        return Err(kernel_error(item, "non-finite phase function"));
    }

    let mut cumulative = cumulative_distribution(&phase, &item.theta);
    let total = cumulative[cumulative.len() - 1];
    if !(total.is_finite() && total > 0.0) {
        return Err(kernel_error(
            item,
            format!("cumulative phase function total {total} is not positive"),
        ));
    }
    for c in &mut cumulative {
        *c /= total;
    }

    let degrees: Vec<f64> = item.theta.iter().map(|t| t.to_degrees()).collect();
    let inverse_cdf = invert_cdf(&degrees, &cumulative, item.random_variates);

    Ok(ResultRecord {
        diameter: item.diameter,
        wavelength: item.wavelength,
        size_parameter: x,
        cross_section: amp.q_ext * std::f64::consts::PI * (item.diameter / 2.0).powi(2),
        inverse_cdf,
        phase_function: phase,
        cumulative_phase_function: cumulative,
    })
}

/// Bounded worker pool that applies a [`ScatteringKernel`] to work items.
///
/// One engine is meant to be shared by all concurrent requests so that the
/// pool size caps total CPU use.
pub struct ComputeEngine {
    pool: rayon::ThreadPool,
    kernel: Arc<dyn ScatteringKernel>,
    workers: usize,
    batches: AtomicUsize,
}

impl ComputeEngine {
    /// Engine with the default [`BhMie`] kernel.
    pub fn new(workers: usize) -> Result<Self> {
        Self::with_kernel(workers, Arc::new(BhMie))
    }

    pub fn with_kernel(workers: usize, kernel: Arc<dyn ScatteringKernel>) -> Result<Self> {
        if workers == 0 {
            return Err(MieError::config("worker pool size must be at least 1"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mie-worker-{i}"))
            .build()
            .map_err(|e| MieError::config(format!("failed to build worker pool: {e}")))?;
        Ok(Self {
            pool,
            kernel,
            workers,
            batches: AtomicUsize::new(0),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of batches dispatched through [`ComputeEngine::run`].
    pub fn batches_run(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Evaluate every item. One record per item; any kernel failure aborts
    /// the whole batch.
    pub fn run(&self, items: Vec<WorkItem>) -> Result<Vec<ResultRecord>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let expected = items.len();
        tracing::debug!(items = expected, workers = self.workers, "dispatching batch");
        let started = Instant::now();

        let kernel = self.kernel.as_ref();
        let records: Vec<ResultRecord> = self.pool.install(|| {
            items
                .par_iter()
                .map(|item| evaluate(kernel, item))
                .collect::<Result<Vec<_>>>()
        })?;

        if records.len() != expected {
            return Err(MieError::Kernel {
                diameter: f64::NAN,
                wavelength: f64::NAN,
                reason: format!("batch produced {} records for {expected} items", records.len()),
            });
        }

        tracing::info!(
            items = expected,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );
        Ok(records)
    }
}
