use thiserror::Error;

/// Configuration errors: fatal, surfaced at construction time.
///
/// Numerical degeneracy during integration (zero/NaN speed, degenerate
/// seeds) is deliberately *not* represented here: it terminates a branch
/// or drops a streamline and is otherwise silent. Cycle detection is a
/// normal return value, not an error.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("dimension mismatch: field is {expected}-dimensional, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("{coords} coordinates require a {required}-dimensional field, got {got}")]
    CoordinateMismatch {
        coords: &'static str,
        required: usize,
        got: usize,
    },

    #[error("unsupported integrator: {0:?}")]
    UnsupportedIntegrator(String),

    #[error("invalid axis scale: {0}")]
    InvalidScale(String),

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("invalid sweep: {0}")]
    InvalidSweep(String),

    #[error("invalid step size: {0}")]
    InvalidStep(f64),
}
