//! Error types for the convnet-core library.
//!
//! Every fallible operation returns `CnnResult<T>`. Shape and bounds checks
//! run before any output is touched, so an `Err` never leaves a partially
//! written matrix or tensor behind.

use thiserror::Error;

use crate::element::DType;

/// All possible error conditions in the convnet-core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CnnError {
    /// Zero or malformed dimensions at creation time.
    #[error("invalid shape {rows}x{cols}")]
    InvalidShape { rows: usize, cols: usize },

    /// A slice, row or column request exceeds the parent extent.
    #[error(
        "region at ({row}, {col}) of size {nrows}x{ncols} exceeds a {rows}x{cols} matrix"
    )]
    OutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
        rows: usize,
        cols: usize,
    },

    /// Operand shapes are incompatible.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Operand element types are incompatible.
    #[error("element type mismatch: {left:?} vs {right:?}")]
    DtypeMismatch { left: DType, right: DType },

    /// The stride does not evenly divide the sliding-window span.
    #[error("window {window} with stride {stride} does not tile an input of size {input}")]
    NonIntegralTiling {
        input: usize,
        window: usize,
        stride: usize,
    },

    /// A layer was configured with a zero stride.
    #[error("stride must be at least 1")]
    InvalidStride,

    /// The backing allocator is exhausted.
    #[error("allocation of {requested} bytes failed ({remaining} bytes remaining)")]
    AllocationFailure { requested: usize, remaining: usize },
}

/// Coarse error categories, one per failure class callers are expected to
/// handle differently.
///
/// Why a separate kind: `InvalidStride` and `DtypeMismatch` carry their own
/// detail but fall into the `InvalidShape` and `DimMismatch` categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidShape,
    OutOfBounds,
    DimMismatch,
    NonIntegralTiling,
    AllocationFailure,
}

impl CnnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CnnError::InvalidShape { .. } | CnnError::InvalidStride => ErrorKind::InvalidShape,
            CnnError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            CnnError::DimensionMismatch { .. } | CnnError::DtypeMismatch { .. } => {
                ErrorKind::DimMismatch
            }
            CnnError::NonIntegralTiling { .. } => ErrorKind::NonIntegralTiling,
            CnnError::AllocationFailure { .. } => ErrorKind::AllocationFailure,
        }
    }
}

pub type CnnResult<T> = Result<T, CnnError>;
