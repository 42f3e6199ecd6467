//! Error types for segmr

use thiserror::Error;

/// Result type alias using segmr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in segmr operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local index beyond the logical size of a segment
    #[error("Local index {local} exceeds size {size} of segment {segment}")]
    CapacityExceeded {
        /// Segment index
        segment: usize,
        /// Requested local index
        local: usize,
        /// Logical size of the segment
        size: usize,
    },

    /// A matrix row has no free slot left for a new column
    #[error("Row {row} is full: no free slot for column {column} (capacity {capacity})")]
    RowCapacityExceeded {
        /// Row index
        row: usize,
        /// Column that could not be inserted
        column: usize,
        /// Number of slots the row owns
        capacity: usize,
    },

    /// A geometry value does not fit into the chosen index type
    #[error("Index overflow: {what} = {value} does not fit into {index_type}")]
    IndexOverflow {
        /// Which quantity overflowed (e.g. "storage size")
        what: &'static str,
        /// The value that did not fit
        value: u128,
        /// Name of the index type
        index_type: &'static str,
    },

    /// Operation is valid but not provided by the selected backend or layout
    #[error("{backend} does not support {operation}: {reason}")]
    UnsupportedOperation {
        /// Backend or layout name
        backend: &'static str,
        /// The operation being attempted
        operation: &'static str,
        /// Description of the limitation
        reason: String,
    },

    /// The requested execution device cannot be used
    #[error("Device {device} unavailable: {reason}")]
    DeviceUnavailable {
        /// Device description (e.g. "cuda:1")
        device: String,
        /// Why the device cannot be used
        reason: String,
    },

    /// A host/device copy did not complete
    #[error("Transfer failed after {completed_bytes} of {total_bytes} bytes: {reason}")]
    TransferFailure {
        /// Bytes copied before the failure
        completed_bytes: usize,
        /// Bytes requested
        total_bytes: usize,
        /// Underlying failure
        reason: String,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Valid range is `0..size`
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Buffer length mismatch
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// Persisted data describes a different layout, organization or dtype
    #[error("Incompatible layout: expected {expected}, found {found}")]
    IncompatibleLayout {
        /// What the reader expected
        expected: String,
        /// What the stream contains
        found: String,
    },

    /// Object used before it was sized or initialized
    #[error("{what} is not initialized")]
    NotInitialized {
        /// The uninitialized object
        what: &'static str,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// I/O error from persistence
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),
}

impl Error {
    /// Create an unsupported operation error
    pub fn unsupported(
        backend: &'static str,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedOperation {
            backend,
            operation,
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create an incompatible layout error
    pub fn incompatible(expected: impl ToString, found: impl ToString) -> Self {
        Self::IncompatibleLayout {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: usize, got: usize) -> Self {
        Self::ShapeMismatch { expected, got }
    }

    /// Create a device unavailable error
    pub fn device_unavailable(device: impl ToString, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device: device.to_string(),
            reason: reason.into(),
        }
    }
}
