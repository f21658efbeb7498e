//! Spherical scattering kernel.
//!
//! The pipeline treats the kernel as a pure function of the size parameter,
//! the relative refractive index and the angular resolution. [`BhMie`] is the
//! Bohren–Huffman series for a homogeneous sphere.
//!
//! # Reference
//! Bohren & Huffman, *Absorption and Scattering of Light by Small Particles* (1983),
//! Appendix A.

use std::f64::consts::FRAC_PI_2;

use num_complex::Complex64;

/// Scattering amplitudes and efficiency factors for one sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct Amplitudes {
    /// Perpendicular amplitude S1 over `2 * theta_angles - 1` angles in [0, π].
    pub s1: Vec<Complex64>,
    /// Parallel amplitude S2 on the same angles.
    pub s2: Vec<Complex64>,
    pub q_ext: f64,
    pub q_sca: f64,
    pub q_back: f64,
    /// Asymmetry parameter ⟨cos θ⟩.
    pub g: f64,
}

/// A spherical-scattering primitive.
///
/// Implementations must be deterministic; the engine calls them concurrently
/// from its worker pool.
pub trait ScatteringKernel: Send + Sync {
    /// `theta_angles` counts angles from 0 to π/2 inclusive; the returned
    /// amplitude vectors cover 0..=π with `2 * theta_angles - 1` points.
    fn scatter(&self, size_parameter: f64, relative_index: Complex64, theta_angles: usize)
    -> Amplitudes;
}

/// Bohren–Huffman `bhmie` series.
#[derive(Debug, Clone, Copy, Default)]
pub struct BhMie;

impl ScatteringKernel for BhMie {
    fn scatter(&self, x: f64, m: Complex64, theta_angles: usize) -> Amplitudes {
        let nang = theta_angles.max(2);
        let y = m * x;
        let xstop = x + 4.0 * x.cbrt() + 2.0;
        let nstop = xstop as usize;
        let nmx = xstop.max(y.norm()) as usize + 15;

        let dang = FRAC_PI_2 / (nang - 1) as f64;
        let amu: Vec<f64> = (0..nang).map(|j| (j as f64 * dang).cos()).collect();

        // Logarithmic derivative D_n(mx) by downward recurrence; d[n] is order n.
        let mut d = vec![Complex64::new(0.0, 0.0); nmx + 1];
        for n in (2..=nmx).rev() {
            let en = n as f64;
            d[n - 1] = en / y - 1.0 / (d[n] + en / y);
        }

        let nn = 2 * nang - 1;
        let mut s1 = vec![Complex64::new(0.0, 0.0); nn];
        let mut s2 = vec![Complex64::new(0.0, 0.0); nn];
        let mut pi0 = vec![0.0; nang];
        let mut pi1 = vec![1.0; nang];
        let mut pi = vec![0.0; nang];
        let mut tau = vec![0.0; nang];

        let mut psi0 = x.cos();
        let mut psi1 = x.sin();
        let mut chi0 = -x.sin();
        let mut chi1 = x.cos();
        let mut xi1 = Complex64::new(psi1, -chi1);

        let mut q_sca = 0.0;
        let mut g = 0.0;
        let mut p = -1.0;
        let mut an = Complex64::new(0.0, 0.0);
        let mut bn = Complex64::new(0.0, 0.0);

        for n in 1..=nstop.max(1) {
            let en = n as f64;
            let fn_ = (2.0 * en + 1.0) / (en * (en + 1.0));
            let psi = (2.0 * en - 1.0) * psi1 / x - psi0;
            let chi = (2.0 * en - 1.0) * chi1 / x - chi0;
            let xi = Complex64::new(psi, -chi);

            let an1 = an;
            let bn1 = bn;
            let da = d[n] / m + en / x;
            let db = d[n] * m + en / x;
            an = (da * psi - psi1) / (da * xi - xi1);
            bn = (db * psi - psi1) / (db * xi - xi1);

            q_sca += (2.0 * en + 1.0) * (an.norm_sqr() + bn.norm_sqr());
            g += fn_ * (an.re * bn.re + an.im * bn.im);
            if n > 1 {
                g += ((en - 1.0) * (en + 1.0) / en)
                    * (an1.re * an.re + an1.im * an.im + bn1.re * bn.re + bn1.im * bn.im);
            }

            for j in 0..nang {
                pi[j] = pi1[j];
                tau[j] = en * amu[j] * pi[j] - (en + 1.0) * pi0[j];
                s1[j] += fn_ * (an * pi[j] + bn * tau[j]);
                s2[j] += fn_ * (an * tau[j] + bn * pi[j]);
            }

            // Mirror onto the backward hemisphere: pi and tau have parity (-1)^(n-1) and (-1)^n.
            p = -p;
            for j in 0..nang - 1 {
                let jj = 2 * nang - 2 - j;
                s1[jj] += fn_ * p * (an * pi[j] - bn * tau[j]);
                s2[jj] += fn_ * p * (an * tau[j] - bn * pi[j]);
            }

            psi0 = psi1;
            psi1 = psi;
            chi0 = chi1;
            chi1 = chi;
            xi1 = Complex64::new(psi1, -chi1);

            for j in 0..nang {
                pi1[j] = ((2.0 * en + 1.0) * amu[j] * pi[j] - (en + 1.0) * pi0[j]) / en;
                pi0[j] = pi[j];
            }
        }

        g = 2.0 * g / q_sca;
        let q_sca = 2.0 / (x * x) * q_sca;
        let q_ext = 4.0 / (x * x) * s1[0].re;
        let q_back = (s1[nn - 1].norm() / x).powi(2) * 4.0;

        Amplitudes {
            s1,
            s2,
            q_ext,
            q_sca,
            q_back,
            g,
        }
    }
}
