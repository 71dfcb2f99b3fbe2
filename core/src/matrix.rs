//! Strided row-major matrices and zero-copy views.
//!
//! A [`Matrix`] either owns its buffer or exclusively borrows a region of a
//! parent's buffer (`slice_mut`, `row_mut`, `col_mut`). A [`MatrixView`] is a
//! shared, read-only borrow. Views keep the parent's `stride`, so element
//! `(i, j)` of any matrix lives at physical offset `i * stride + j` of its
//! data slice, and a view's rows are not contiguous when `cols < stride`.
//!
//! Lifetimes tie every view to its parent: a view cannot outlive the buffer
//! it aliases, and a mutable view blocks all other access to the parent
//! until it is dropped.
//!
//! Why copy the stride into views: a window taken for convolution or pooling
//! is read in place, so row `i` of the view must land on physical row
//! `row + i` of the parent without repacking.

use core::fmt;
use core::ops::{Index, IndexMut};

use crate::arena::{Allocator, Buffer, HeapAllocator};
use crate::element::{DType, Element};
use crate::error::{CnnError, CnnResult};

// =============================================================================
// Extent
// =============================================================================

/// Logical extent and physical pitch of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    rows: usize,
    cols: usize,
    stride: usize,
}

impl Extent {
    const fn packed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            stride: cols,
        }
    }

    #[inline(always)]
    const fn offset(&self, row: usize, col: usize) -> usize {
        row * self.stride + col
    }

    #[inline(always)]
    const fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Physical elements covered from `(0, 0)` to `(rows - 1, cols - 1)`.
    const fn span(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.rows - 1) * self.stride + self.cols
        }
    }

    /// Validates a sub-region and returns `(start offset, sub extent)`.
    fn region(
        &self,
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    ) -> CnnResult<(usize, Self)> {
        let fits = |start: usize, len: usize, limit: usize| {
            start.checked_add(len).map_or(false, |end| end <= limit)
        };
        if !fits(row, nrows, self.rows) || !fits(col, ncols, self.cols) {
            return Err(CnnError::OutOfBounds {
                row,
                col,
                nrows,
                ncols,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let sub = Self {
            rows: nrows,
            cols: ncols,
            stride: self.stride,
        };
        let start = if sub.is_empty() { 0 } else { self.offset(row, col) };
        Ok((start, sub))
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> CnnError {
        CnnError::OutOfBounds {
            row,
            col,
            nrows: 1,
            ncols: 1,
            rows: self.rows,
            cols: self.cols,
        }
    }
}

// =============================================================================
// Matrix
// =============================================================================

/// Owned buffer or an exclusive borrow of a parent's buffer.
enum Storage<'a, T> {
    Owned(Buffer<'a, T>),
    Borrowed(&'a mut [T]),
}

/// Borrow any matrix-like value as a read-only view.
pub trait AsView<T: Element> {
    fn as_view(&self) -> MatrixView<'_, T>;
}

/// A `rows x cols` matrix that owns its buffer or exclusively borrows one.
pub struct Matrix<'a, T: Element> {
    extent: Extent,
    storage: Storage<'a, T>,
}

impl<T: Element> Matrix<'static, T> {
    /// Heap-allocates a zero-filled `rows x cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> CnnResult<Self> {
        Self::zeros_in(rows, cols, &HeapAllocator)
    }

    /// Heap-allocates a matrix filled with `value`.
    pub fn filled(rows: usize, cols: usize, value: T) -> CnnResult<Self> {
        let mut m = Self::zeros(rows, cols)?;
        m.fill(value);
        Ok(m)
    }

    /// Wraps a row-major vector of exactly `rows * cols` elements.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> CnnResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(CnnError::InvalidShape { rows, cols });
        }
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(CnnError::DimensionMismatch {
                expected: (rows.saturating_mul(cols), 1),
                actual: (data.len(), 1),
            });
        }
        Ok(Self {
            extent: Extent::packed(rows, cols),
            storage: Storage::Owned(Buffer::Heap(data)),
        })
    }

    /// Builds a matrix from equal-length rows.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> CnnResult<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(CnnError::DimensionMismatch {
                    expected: (1, cols),
                    actual: (1, row.len()),
                });
            }
            data.extend_from_slice(row);
        }
        Self::from_vec(rows.len(), cols, data)
    }
}

impl<'a, T: Element> Matrix<'a, T> {
    /// Allocates a zero-filled `rows x cols` matrix from `alloc`.
    pub fn zeros_in<A: Allocator>(rows: usize, cols: usize, alloc: &'a A) -> CnnResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(CnnError::InvalidShape { rows, cols });
        }
        let len = rows
            .checked_mul(cols)
            .ok_or(CnnError::InvalidShape { rows, cols })?;
        let buffer = alloc.allocate::<T>(len)?;
        Ok(Self {
            extent: Extent::packed(rows, cols),
            storage: Storage::Owned(buffer),
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.extent.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.extent.cols
    }

    /// Physical pitch between successive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.extent.stride
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.extent.rows, self.extent.cols)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extent.is_empty()
    }

    /// `true` unless this matrix is a borrowed region of another matrix.
    #[inline]
    pub fn owns_data(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    #[inline(always)]
    fn data(&self) -> &[T] {
        match &self.storage {
            Storage::Owned(buffer) => buffer,
            Storage::Borrowed(data) => data,
        }
    }

    #[inline(always)]
    fn data_mut(&mut self) -> &mut [T] {
        match &mut self.storage {
            Storage::Owned(buffer) => buffer,
            Storage::Borrowed(data) => data,
        }
    }

    /// Shared view of the whole matrix.
    #[inline]
    pub fn view(&self) -> MatrixView<'_, T> {
        MatrixView {
            extent: self.extent,
            data: self.data(),
        }
    }

    /// Writable view of the whole matrix.
    #[inline]
    pub fn view_mut(&mut self) -> Matrix<'_, T> {
        let extent = self.extent;
        Matrix {
            extent,
            storage: Storage::Borrowed(self.data_mut()),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.view().get(row, col)
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> CnnResult<()> {
        if !self.extent.contains(row, col) {
            return Err(self.extent.out_of_bounds(row, col));
        }
        let offset = self.extent.offset(row, col);
        self.data_mut()[offset] = value;
        Ok(())
    }

    /// Applies `f` to every element of the logical region, in place.
    pub fn map_inplace(&mut self, mut f: impl FnMut(T) -> T) {
        let Extent { rows, cols, stride } = self.extent;
        if self.extent.is_empty() {
            return;
        }
        let data = self.data_mut();
        for i in 0..rows {
            let start = i * stride;
            for value in &mut data[start..start + cols] {
                *value = f(*value);
            }
        }
    }

    /// Overwrites every element. Through a view this writes into the parent.
    pub fn fill(&mut self, value: T) {
        self.map_inplace(|_| value);
    }

    /// Multiplies every element by `value`.
    pub fn scalar(&mut self, value: T) {
        self.map_inplace(|x| x.wrapping_mul(value));
    }

    /// Element-wise `self += other`.
    pub fn sum(&mut self, other: &impl AsView<T>) -> CnnResult<()> {
        let other = other.as_view();
        if self.shape() != other.shape() {
            return Err(CnnError::DimensionMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        let Extent { cols, stride, .. } = self.extent;
        let data = self.data_mut();
        for (i, src) in other.row_slices().enumerate() {
            let start = i * stride;
            for (dst, &x) in data[start..start + cols].iter_mut().zip(src) {
                *dst = dst.wrapping_add(x);
            }
        }
        Ok(())
    }

    /// Frobenius inner product with `other`.
    pub fn dot(&self, other: &impl AsView<T>) -> CnnResult<T> {
        self.view().dot(other)
    }

    /// Writes `left x right` into `self`, which is zero-filled first.
    ///
    /// Requires `left.cols == right.rows` and `self` shaped
    /// `left.rows x right.cols`; `self` is untouched on error.
    pub fn multiply(&mut self, left: &impl AsView<T>, right: &impl AsView<T>) -> CnnResult<()> {
        let (left, right) = (left.as_view(), right.as_view());
        if left.cols() != right.rows() {
            return Err(CnnError::DimensionMismatch {
                expected: (left.cols(), right.cols()),
                actual: right.shape(),
            });
        }
        if self.shape() != (left.rows(), right.cols()) {
            return Err(CnnError::DimensionMismatch {
                expected: (left.rows(), right.cols()),
                actual: self.shape(),
            });
        }

        self.fill(T::ZERO);
        let stride = self.extent.stride;
        let data = self.data_mut();
        for i in 0..left.rows() {
            for j in 0..right.cols() {
                let mut acc = T::ZERO;
                for k in 0..left.cols() {
                    acc = acc.wrapping_add(left[(i, k)].wrapping_mul(right[(k, j)]));
                }
                data[i * stride + j] = acc;
            }
        }
        Ok(())
    }

    /// Read-only view of the `nrows x ncols` region at `(row, col)`.
    pub fn slice(
        &self,
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    ) -> CnnResult<MatrixView<'_, T>> {
        self.view().slice(row, col, nrows, ncols)
    }

    /// Writable view of the `nrows x ncols` region at `(row, col)`.
    ///
    /// The view keeps this matrix's stride; writes land in this buffer.
    pub fn slice_mut(
        &mut self,
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    ) -> CnnResult<Matrix<'_, T>> {
        let (start, extent) = self.extent.region(row, col, nrows, ncols)?;
        let span = extent.span();
        let data = &mut self.data_mut()[start..start + span];
        Ok(Matrix {
            extent,
            storage: Storage::Borrowed(data),
        })
    }

    pub fn row(&self, row: usize) -> CnnResult<MatrixView<'_, T>> {
        self.view().row(row)
    }

    pub fn col(&self, col: usize) -> CnnResult<MatrixView<'_, T>> {
        self.view().col(col)
    }

    pub fn row_mut(&mut self, row: usize) -> CnnResult<Matrix<'_, T>> {
        if row >= self.rows() {
            return Err(self.extent.out_of_bounds(row, 0));
        }
        let cols = self.cols();
        self.slice_mut(row, 0, 1, cols)
    }

    pub fn col_mut(&mut self, col: usize) -> CnnResult<Matrix<'_, T>> {
        if col >= self.cols() {
            return Err(self.extent.out_of_bounds(0, col));
        }
        let rows = self.rows();
        self.slice_mut(0, col, rows, 1)
    }

    /// Row-major iterator over the logical region.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.view().iter()
    }
}

impl<T: Element> AsView<T> for Matrix<'_, T> {
    fn as_view(&self) -> MatrixView<'_, T> {
        self.view()
    }
}

impl<T: Element> Index<(usize, usize)> for Matrix<'_, T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(
            self.extent.contains(row, col),
            "index ({row}, {col}) out of bounds for {}x{} matrix",
            self.extent.rows,
            self.extent.cols
        );
        &self.data()[self.extent.offset(row, col)]
    }
}

impl<T: Element> IndexMut<(usize, usize)> for Matrix<'_, T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(
            self.extent.contains(row, col),
            "index ({row}, {col}) out of bounds for {}x{} matrix",
            self.extent.rows,
            self.extent.cols
        );
        let offset = self.extent.offset(row, col);
        &mut self.data_mut()[offset]
    }
}

impl<T: Element> fmt::Debug for Matrix<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.extent.rows)
            .field("cols", &self.extent.cols)
            .field("stride", &self.extent.stride)
            .field("dtype", &T::DTYPE)
            .field("owns_data", &self.owns_data())
            .finish()
    }
}

impl<T: Element> fmt::Display for Matrix<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.view(), f)
    }
}

impl<T: Element, M: AsView<T>> PartialEq<M> for Matrix<'_, T> {
    fn eq(&self, other: &M) -> bool {
        self.view() == other.as_view()
    }
}

// =============================================================================
// MatrixView
// =============================================================================

/// Shared, read-only view of a matrix region.
#[derive(Clone, Copy)]
pub struct MatrixView<'a, T: Element> {
    extent: Extent,
    data: &'a [T],
}

impl<'a, T: Element> MatrixView<'a, T> {
    #[inline]
    pub fn rows(&self) -> usize {
        self.extent.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.extent.cols
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.extent.stride
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.extent.rows, self.extent.cols)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extent.is_empty()
    }

    #[inline]
    pub fn owns_data(&self) -> bool {
        false
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if self.extent.contains(row, col) {
            Some(self.data[self.extent.offset(row, col)])
        } else {
            None
        }
    }

    /// Sub-view of the `nrows x ncols` region at `(row, col)`.
    ///
    /// Empty regions are valid as long as they start inside the bounds.
    pub fn slice(
        self,
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    ) -> CnnResult<MatrixView<'a, T>> {
        let (start, extent) = self.extent.region(row, col, nrows, ncols)?;
        Ok(MatrixView {
            extent,
            data: &self.data[start..start + extent.span()],
        })
    }

    pub fn row(self, row: usize) -> CnnResult<MatrixView<'a, T>> {
        if row >= self.rows() {
            return Err(self.extent.out_of_bounds(row, 0));
        }
        self.slice(row, 0, 1, self.cols())
    }

    pub fn col(self, col: usize) -> CnnResult<MatrixView<'a, T>> {
        if col >= self.cols() {
            return Err(self.extent.out_of_bounds(0, col));
        }
        self.slice(0, col, self.rows(), 1)
    }

    /// Physical slices of each logical row, `cols` elements apiece.
    pub fn row_slices(self) -> impl Iterator<Item = &'a [T]> + 'a {
        let Extent { rows, cols, stride } = self.extent;
        let rows = if self.extent.is_empty() { 0 } else { rows };
        let data = self.data;
        (0..rows).map(move |i| &data[i * stride..i * stride + cols])
    }

    /// Row-major iterator over the logical region.
    pub fn iter(self) -> impl Iterator<Item = T> + 'a {
        self.row_slices().flat_map(|row| row.iter().copied())
    }

    /// Frobenius inner product: the sum of element-wise products.
    pub fn dot(&self, other: &impl AsView<T>) -> CnnResult<T> {
        let other = other.as_view();
        if self.shape() != other.shape() {
            return Err(CnnError::DimensionMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        let mut acc = T::ZERO;
        for (lhs, rhs) in self.row_slices().zip(other.row_slices()) {
            for (&a, &b) in lhs.iter().zip(rhs) {
                acc = acc.wrapping_add(a.wrapping_mul(b));
            }
        }
        Ok(acc)
    }

    /// Largest element, or `None` for an empty view.
    pub fn max(&self) -> Option<T> {
        self.iter()
            .reduce(|best, x| if x > best { x } else { best })
    }

    /// Sum of all elements.
    pub fn sum_elements(&self) -> T {
        self.iter().fold(T::ZERO, T::wrapping_add)
    }

    /// Tightly packed heap copy of this view.
    pub fn to_packed(&self) -> CnnResult<Matrix<'static, T>> {
        Matrix::from_vec(self.rows(), self.cols(), self.iter().collect())
    }

    /// Heap-allocated product `self x rhs`.
    pub fn matmul(&self, rhs: &impl AsView<T>) -> CnnResult<Matrix<'static, T>> {
        let rhs = rhs.as_view();
        let mut out = Matrix::zeros(self.rows(), rhs.cols())?;
        out.multiply(self, &rhs)?;
        Ok(out)
    }
}

impl<T: Element> AsView<T> for MatrixView<'_, T> {
    fn as_view(&self) -> MatrixView<'_, T> {
        *self
    }
}

impl<T: Element> Index<(usize, usize)> for MatrixView<'_, T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(
            self.extent.contains(row, col),
            "index ({row}, {col}) out of bounds for {}x{} view",
            self.extent.rows,
            self.extent.cols
        );
        &self.data[self.extent.offset(row, col)]
    }
}

impl<T: Element> PartialEq for MatrixView<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.iter().eq(other.iter())
    }
}

impl<T: Element> fmt::Debug for MatrixView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixView")
            .field("rows", &self.extent.rows)
            .field("cols", &self.extent.cols)
            .field("stride", &self.extent.stride)
            .field("dtype", &T::DTYPE)
            .finish()
    }
}

impl<T: Element> fmt::Display for MatrixView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.row_slices() {
            let mut first = true;
            for value in row {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{value}")?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
