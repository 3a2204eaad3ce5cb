use std::io;
use thiserror::Error;

/// Result type used throughout the gridding library.
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors raised by the gridding and filtering operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// A query needed at least one point but the index (or point set) is empty.
    #[error("insufficient points: {operation} requires at least one indexed point")]
    InsufficientPoints { operation: &'static str },

    /// A configuration value is outside of its valid range.
    #[error("invalid parameter '{name}' = {value}")]
    InvalidParameter { name: &'static str, value: String },

    /// A point lies outside of the extent of a grid it was looked up in.
    #[error("point ({x}, {y}) lies outside of the grid extent")]
    OutOfBoundsPoint { x: f64, y: f64 },

    /// A kernel is larger than the grid it is applied to.
    #[error("kernel of {kernel_rows}x{kernel_columns} cells does not fit a grid of {rows}x{columns} cells")]
    DimensionMismatch {
        kernel_rows: usize,
        kernel_columns: usize,
        rows: usize,
        columns: usize,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("error parsing {file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl GridError {
    /// Shorthand for an `InvalidParameter` error.
    pub fn invalid_parameter<V: ToString>(name: &'static str, value: V) -> GridError {
        GridError::InvalidParameter {
            name,
            value: value.to_string(),
        }
    }
}

impl From<GridError> for io::Error {
    fn from(err: GridError) -> io::Error {
        match err {
            GridError::Io(e) => e,
            GridError::InvalidParameter { .. } | GridError::DimensionMismatch { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
            }
            GridError::Parse { .. } => io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
            GridError::Cancelled => io::Error::new(io::ErrorKind::Interrupted, err.to_string()),
            _ => io::Error::new(io::ErrorKind::Other, err.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::GridError;
    use std::io;

    #[test]
    fn test_invalid_parameter_message_names_parameter() {
        let err = GridError::invalid_parameter("resolution", -1.5);
        assert_eq!(err.to_string(), "invalid parameter 'resolution' = -1.5");
    }

    #[test]
    fn test_conversion_to_io_error() {
        let err: io::Error = GridError::invalid_parameter("k", 0).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err: io::Error = GridError::Cancelled.into();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }
}
