//! Integration tests exercising the full compute pipeline:
//! scenario → grid → engine → aggregate, across module boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use mie_core::{
    Aggregated, Amplitudes, BhMie, ComputeEngine, Distribution, GridRange, MieError,
    ScatteringKernel, ScenarioRequest, compute,
};
use num_complex::Complex64;

/// Kernel wrapper that counts evaluations.
struct Counting {
    calls: AtomicUsize,
}

impl ScatteringKernel for Counting {
    fn scatter(&self, x: f64, m: Complex64, theta_angles: usize) -> Amplitudes {
        self.calls.fetch_add(1, Ordering::SeqCst);
        BhMie.scatter(x, m, theta_angles)
    }
}

fn scenario(effective: bool, diameters: GridRange) -> ScenarioRequest {
    let mut s = ScenarioRequest::log_normal(
        Complex64::new(1.83, 0.0),
        1.55,
        0.7,
        0.4,
        GridRange::new(0.4, 0.8, 3),
        diameters,
    );
    s.effective_model = effective;
    s
}

/// Test 1: raw mode produces one group per diameter, each covering every wavelength.
#[test]
fn raw_pipeline_groups_every_diameter() {
    let engine = ComputeEngine::new(4).unwrap();
    let computed = compute(&engine, &scenario(false, GridRange::new(1.0, 2.0, 2))).unwrap();

    assert_eq!(computed.grid.diameters, vec![1.0, 2.0]);
    let Aggregated::Raw(groups) = computed.output else {
        panic!("expected raw output");
    };
    assert_eq!(groups.len(), 2);
    for g in &groups {
        assert_eq!(g.records.len(), 3);
        for r in &g.records {
            assert_eq!(r.inverse_cdf.len(), 1000);
            assert!(r.cross_section > 0.0);
        }
    }
}

/// Test 2: effective mode collapses diameters into one record per wavelength.
#[test]
fn effective_pipeline_one_record_per_wavelength() {
    let engine = ComputeEngine::new(4).unwrap();
    let computed = compute(&engine, &scenario(true, GridRange::new(1.0, 3.0, 10))).unwrap();

    let Aggregated::Effective(records) = computed.output else {
        panic!("expected effective output");
    };
    assert_eq!(records.len(), 3);
    for r in &records {
        assert_eq!(r.inverse_cdf.len(), 10_000);
        assert!(r.diameter >= 1.0 && r.diameter <= 3.0);
        // Weighted mix of monotone tables stays monotone.
        for w in r.inverse_cdf.windows(2) {
            assert!(w[0] <= w[1] + 1e-12);
        }
    }
}

/// Test 3: effective mode with too few diameters evaluates nothing.
#[test]
fn effective_guard_runs_no_kernel() {
    let kernel = Arc::new(Counting {
        calls: AtomicUsize::new(0),
    });
    let engine = ComputeEngine::with_kernel(2, kernel.clone()).unwrap();
    let err = compute(&engine, &scenario(true, GridRange::new(1.0, 5.0, 5))).unwrap_err();

    assert!(matches!(err, MieError::Configuration(_)));
    assert_eq!(kernel.calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.batches_run(), 0);
}

/// Test 4: zero-sum arbitrary weights are rejected before dispatch.
#[test]
fn zero_weights_rejected_before_dispatch() {
    let kernel = Arc::new(Counting {
        calls: AtomicUsize::new(0),
    });
    let engine = ComputeEngine::with_kernel(2, kernel.clone()).unwrap();
    let mut s = scenario(true, GridRange::new(1.0, 10.0, 10));
    s.distribution = Distribution::Arbitrary {
        id_1: 1.0,
        id_2: 1.0,
        weights: vec![0.0; 10],
    };

    assert!(matches!(
        compute(&engine, &s),
        Err(MieError::Configuration(_))
    ));
    assert_eq!(kernel.calls.load(Ordering::SeqCst), 0);
}

/// Test 5: every grid point is evaluated exactly once.
#[test]
fn each_item_evaluated_once() {
    let kernel = Arc::new(Counting {
        calls: AtomicUsize::new(0),
    });
    let engine = ComputeEngine::with_kernel(3, kernel.clone()).unwrap();
    compute(&engine, &scenario(false, GridRange::new(1.0, 2.0, 4))).unwrap();
    assert_eq!(kernel.calls.load(Ordering::SeqCst), 12);
}

/// Test 6: unnormalized arbitrary weights behave like their normalized form.
#[test]
fn arbitrary_weights_normalization_equivalence() {
    let engine = ComputeEngine::new(4).unwrap();
    let mut a = scenario(true, GridRange::new(1.0, 2.8, 10));
    a.wavelengths = GridRange::new(0.5, 0.5, 1);
    let mut b = a.clone();
    a.distribution = Distribution::Arbitrary {
        id_1: 0.0,
        id_2: 0.0,
        weights: vec![2.0; 10],
    };
    b.distribution = Distribution::Arbitrary {
        id_1: 0.0,
        id_2: 0.0,
        weights: vec![0.1; 10],
    };

    let (Aggregated::Effective(ra), Aggregated::Effective(rb)) = (
        compute(&engine, &a).unwrap().output,
        compute(&engine, &b).unwrap().output,
    ) else {
        panic!("expected effective output");
    };
    assert_relative_eq!(ra[0].cross_section, rb[0].cross_section, epsilon = 1e-12);
    assert_eq!(ra[0].inverse_cdf, rb[0].inverse_cdf);
}

/// Test 7: a multi-point grid with min == max is rejected before dispatch, in either mode.
#[test]
fn repeated_point_grids_run_no_kernel() {
    let kernel = Arc::new(Counting {
        calls: AtomicUsize::new(0),
    });
    let engine = ComputeEngine::with_kernel(2, kernel.clone()).unwrap();

    let mut effective = scenario(true, GridRange::new(0.2, 2.0, 10));
    effective.wavelengths = GridRange::new(0.5, 0.5, 2);
    assert!(matches!(
        compute(&engine, &effective),
        Err(MieError::Configuration(_))
    ));

    let raw = scenario(false, GridRange::new(1.0, 1.0, 3));
    assert!(matches!(
        compute(&engine, &raw),
        Err(MieError::Configuration(_))
    ));

    assert_eq!(kernel.calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.batches_run(), 0);
}
