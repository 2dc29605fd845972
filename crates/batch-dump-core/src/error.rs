//! Error types for batch-dump-core.
//!
//! [`DumpError`] covers the failures that stop an operation outright:
//! invalid configuration, sink I/O, a failed accelerator copy. Problems with
//! individual fields or parameters are not errors of the dump call; they are
//! reported as a [`SkipReason`] and the call moves on to the next name.
//!
//! # Examples
//!
//! ```rust
//! use batch_dump_core::{DumpError, LayoutError, SkipReason};
//!
//! let err = DumpError::InvalidInterval(0);
//! assert!(err.to_string().contains("interval"));
//!
//! let skip = SkipReason::InvalidLayout(LayoutError::Rank { actual: 3 });
//! assert!(skip.to_string().contains("rank"));
//! ```

use thiserror::Error;

/// Top-level error type for dump operations.
#[derive(Debug, Error)]
pub enum DumpError {
    /// The sampling interval was zero.
    ///
    /// Every sampling mode reduces its draw modulo the interval, so zero
    /// is rejected before any batch is processed.
    #[error("Invalid dump interval {0}: interval must be a positive integer")]
    InvalidInterval(u64),

    /// Configuration is invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The tensor holds no data yet.
    #[error("Tensor is not initialized")]
    Uninitialized,

    /// Copying accelerator memory to the host failed.
    #[error("Device to host copy failed: {0}")]
    DeviceCopy(String),

    /// Writing a finished line to the sink failed.
    #[error("Sink write failed: {0}")]
    Sink(#[from] std::io::Error),

    /// The receiving end of a channel sink is gone.
    #[error("Sink channel closed")]
    SinkClosed,
}

impl From<config::ConfigError> for DumpError {
    fn from(err: config::ConfigError) -> Self {
        DumpError::ConfigError(err.to_string())
    }
}

/// Result type alias for dump operations.
pub type DumpResult<T> = Result<T, DumpError>;

/// Why a field tensor cannot be sliced per sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Field tensors must be exactly `rows x columns`.
    #[error("expected rank 2, got rank {actual}")]
    Rank { actual: usize },

    /// A variable-length field needs one offset per sample plus one.
    #[error("lod has {actual} offsets, expected batch_size + 1 = {expected}")]
    LodLength { expected: usize, actual: usize },

    /// A fixed-size field needs exactly one row per sample.
    #[error("dim0 is {actual}, expected batch_size {expected}")]
    BatchRows { expected: usize, actual: usize },
}

/// Why a configured field or parameter contributed nothing to a dump.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("cannot be found in scope")]
    NotFound,

    #[error("is not initialized")]
    NotInitialized,

    #[error("cannot pass check ({0}); maybe the dimension is wrong")]
    InvalidLayout(LayoutError),

    #[error("could not be copied to host: {0}")]
    CopyFailed(String),
}

impl SkipReason {
    /// Map a materialization failure onto the skip it causes.
    pub(crate) fn from_materialize(err: &DumpError) -> Self {
        match err {
            DumpError::Uninitialized => SkipReason::NotInitialized,
            other => SkipReason::CopyFailed(other.to_string()),
        }
    }
}
