/// Effective mode needs at least this many distinct diameters in the grid.
pub const MIN_EFFECTIVE_DIAMETERS: usize = 10;

/// Supplied weights whose sum is within this distance of 1 are used as-is.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Half-range angle count for raw (per-diameter) output.
pub const RAW_THETA_ANGLES: usize = 90;

/// Inverse-CDF table length for raw output.
pub const RAW_RANDOM_VARIATES: usize = 1000;

/// Half-range angle count for effective output.
pub const EFFECTIVE_THETA_ANGLES: usize = 91;

/// Inverse-CDF table length for effective output.
pub const EFFECTIVE_RANDOM_VARIATES: usize = 10_000;

/// Angular and probability resolution of one batch.
///
/// Fixed by the output mode so that a scenario key alone determines the
/// content of the artifact it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    /// Angles from 0 to π/2 inclusive; the full grid spans 0..=π with
    /// `2 * theta_angles - 1` points.
    pub theta_angles: usize,
    pub random_variates: usize,
}

impl Sampling {
    pub fn for_mode(effective_model: bool) -> Self {
        if effective_model {
            Self {
                theta_angles: EFFECTIVE_THETA_ANGLES,
                random_variates: EFFECTIVE_RANDOM_VARIATES,
            }
        } else {
            Self {
                theta_angles: RAW_THETA_ANGLES,
                random_variates: RAW_RANDOM_VARIATES,
            }
        }
    }

    /// Number of points in the full [0, π] theta grid.
    pub fn theta_points(&self) -> usize {
        2 * self.theta_angles - 1
    }
}
