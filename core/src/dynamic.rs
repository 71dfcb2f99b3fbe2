//! Matrices whose element kind is chosen at runtime.
//!
//! [`AnyMatrix`] tags a heap matrix with its [`DType`]. Binary operations
//! between differently tagged operands fail with `DtypeMismatch` instead of
//! converting.

use core::fmt;

use crate::element::{DType, Element};
use crate::error::{CnnError, CnnResult};
use crate::matrix::Matrix;

/// A single value of one of the four element kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::F32(_) => DType::F32,
            Scalar::F64(_) => DType::F64,
            Scalar::I32(_) => DType::I32,
            Scalar::I64(_) => DType::I64,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Scalar::F32(v) => v as f64,
            Scalar::F64(v) => v,
            Scalar::I32(v) => v as f64,
            Scalar::I64(v) => v as f64,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
        }
    }
}

/// Heap matrix tagged with its element kind.
#[derive(Debug)]
pub enum AnyMatrix {
    F32(Matrix<'static, f32>),
    F64(Matrix<'static, f64>),
    I32(Matrix<'static, i32>),
    I64(Matrix<'static, i64>),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            AnyMatrix::F32($m) => $body,
            AnyMatrix::F64($m) => $body,
            AnyMatrix::I32($m) => $body,
            AnyMatrix::I64($m) => $body,
        }
    };
}

impl AnyMatrix {
    /// Zero-filled `rows x cols` matrix of the requested kind.
    pub fn zeros(rows: usize, cols: usize, dtype: DType) -> CnnResult<Self> {
        Ok(match dtype {
            DType::F32 => AnyMatrix::F32(Matrix::zeros(rows, cols)?),
            DType::F64 => AnyMatrix::F64(Matrix::zeros(rows, cols)?),
            DType::I32 => AnyMatrix::I32(Matrix::zeros(rows, cols)?),
            DType::I64 => AnyMatrix::I64(Matrix::zeros(rows, cols)?),
        })
    }

    pub fn dtype(&self) -> DType {
        dispatch!(self, m => m.dtype())
    }

    pub fn rows(&self) -> usize {
        dispatch!(self, m => m.rows())
    }

    pub fn cols(&self) -> usize {
        dispatch!(self, m => m.cols())
    }

    pub fn stride(&self) -> usize {
        dispatch!(self, m => m.stride())
    }

    pub fn owns_data(&self) -> bool {
        dispatch!(self, m => m.owns_data())
    }

    /// Fills with `value` converted to this matrix's kind.
    pub fn fill(&mut self, value: f64) {
        dispatch!(self, m => m.fill(Element::from_f64(value)))
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Scalar> {
        match self {
            AnyMatrix::F32(m) => m.get(row, col).map(Scalar::F32),
            AnyMatrix::F64(m) => m.get(row, col).map(Scalar::F64),
            AnyMatrix::I32(m) => m.get(row, col).map(Scalar::I32),
            AnyMatrix::I64(m) => m.get(row, col).map(Scalar::I64),
        }
    }

    /// Frobenius inner product, accumulated in the operands' own kind.
    pub fn dot(&self, other: &AnyMatrix) -> CnnResult<Scalar> {
        match (self, other) {
            (AnyMatrix::F32(a), AnyMatrix::F32(b)) => a.dot(b).map(Scalar::F32),
            (AnyMatrix::F64(a), AnyMatrix::F64(b)) => a.dot(b).map(Scalar::F64),
            (AnyMatrix::I32(a), AnyMatrix::I32(b)) => a.dot(b).map(Scalar::I32),
            (AnyMatrix::I64(a), AnyMatrix::I64(b)) => a.dot(b).map(Scalar::I64),
            _ => Err(CnnError::DtypeMismatch {
                left: self.dtype(),
                right: other.dtype(),
            }),
        }
    }

    /// Element-wise `self += other`.
    pub fn sum(&mut self, other: &AnyMatrix) -> CnnResult<()> {
        let (left, right) = (self.dtype(), other.dtype());
        match (self, other) {
            (AnyMatrix::F32(a), AnyMatrix::F32(b)) => a.sum(b),
            (AnyMatrix::F64(a), AnyMatrix::F64(b)) => a.sum(b),
            (AnyMatrix::I32(a), AnyMatrix::I32(b)) => a.sum(b),
            (AnyMatrix::I64(a), AnyMatrix::I64(b)) => a.sum(b),
            _ => Err(CnnError::DtypeMismatch { left, right }),
        }
    }
}
