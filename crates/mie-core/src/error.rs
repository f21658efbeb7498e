use thiserror::Error;

/// Failures raised by the compute pipeline.
#[derive(Debug, Error)]
pub enum MieError {
    /// The scenario was rejected before any computation started.
    #[error("invalid scenario: {0}")]
    Configuration(String),

    /// A kernel evaluation produced a non-finite or out-of-domain result.
    /// Fatal for the whole batch.
    #[error("kernel failed at diameter {diameter}, wavelength {wavelength}: {reason}")]
    Kernel {
        diameter: f64,
        wavelength: f64,
        reason: String,
    },
}

impl MieError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        MieError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MieError>;
