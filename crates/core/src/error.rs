//! Error types for bare-earth reconstruction

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    /// Out-of-range or conflicting configuration value.
    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Unusable input surface (empty, entirely no-data).
    #[error("Invalid input: {0}")]
    Input(String),

    /// A percentile was requested over a metric with no finite values.
    #[error("Cannot derive a threshold for '{metric}': no finite values")]
    StatisticalDegeneracy { metric: &'static str },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message() {
        let e = Error::invalid("sigma", -1.0, "must be positive");
        assert_eq!(e.to_string(), "Invalid parameter: sigma = -1 (must be positive)");
    }

    #[test]
    fn test_degeneracy_message_names_metric() {
        let e = Error::StatisticalDegeneracy { metric: "slope" };
        assert!(e.to_string().contains("slope"));
    }
}
