//! Error types for trajectory_optimizer

use thiserror::Error;

/// Main error type for the optimizer and its components
#[derive(Debug, Error)]
pub enum RoboticsError {
    /// Malformed polygon, outline or reference line
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Two keyframe polygons with different vertex counts
    #[error("Shape mismatch: expected {expected} vertices, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Matrix or bound widths incompatible with the selected model
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Result or report requested before a successful solve
    #[error("Optimizer has not been solved")]
    NotSolved,

    /// Damped normal equations could not be factorized
    #[error("Singular system: {0}")]
    SingularSystem(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Solve interrupted through the cancellation handle
    #[error("Solve cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Visualization error
    #[error("Visualization error: {0}")]
    Visualization(String),
}

impl RoboticsError {
    /// Shorthand for a [`RoboticsError::DimensionMismatch`].
    pub fn dimension(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Shorthand for a [`RoboticsError::InvalidGeometry`].
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }
}

/// Result type alias for optimizer operations
pub type RoboticsResult<T> = Result<T, RoboticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RoboticsError::dimension("control columns", 2, 3);
        assert_eq!(
            format!("{}", err),
            "Dimension mismatch for control columns: expected 2, got 3"
        );

        let err = RoboticsError::ShapeMismatch {
            expected: 4,
            actual: 5,
        };
        assert_eq!(
            format!("{}", err),
            "Shape mismatch: expected 4 vertices, got 5"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RoboticsError = io_err.into();
        assert!(matches!(err, RoboticsError::Io(_)));
    }
}
