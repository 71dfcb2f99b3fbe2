//! Multi-channel square tensors.
//!
//! A [`Tensor3D`] is an ordered stack of `depth` matrices, each
//! `size x size`: the channels of one input sample or one layer's output.
//! The tensor exclusively owns its channel maps; dropping it releases each
//! map exactly once. Channel access hands out views, never the map itself,
//! so the equal-size invariant cannot be broken from outside.

use crate::arena::{Allocator, HeapAllocator};
use crate::element::Element;
use crate::error::{CnnError, CnnResult};
use crate::layers::activations::Activation;
use crate::matrix::{Matrix, MatrixView};

// =============================================================================
// Shape
// =============================================================================

/// Edge length and channel count of a [`Tensor3D`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    pub size: usize,
    pub depth: usize,
}

impl TensorShape {
    pub const fn new(size: usize, depth: usize) -> Self {
        Self { size, depth }
    }

    /// Total number of elements across all channels.
    pub const fn total(&self) -> usize {
        self.size * self.size * self.depth
    }
}

// =============================================================================
// Tensor3D
// =============================================================================

/// `depth` owned `size x size` channel maps.
pub struct Tensor3D<'a, T: Element> {
    size: usize,
    maps: Vec<Matrix<'a, T>>,
}

impl<T: Element> Tensor3D<'static, T> {
    /// Heap-allocates `depth` zero-filled `size x size` channel maps.
    pub fn zeros(size: usize, depth: usize) -> CnnResult<Self> {
        Self::zeros_in(size, depth, &HeapAllocator)
    }
}

impl<'a, T: Element> Tensor3D<'a, T> {
    /// Allocates `depth` zero-filled `size x size` channel maps from `alloc`.
    ///
    /// Fails with `InvalidShape` if `size` or `depth` is zero. A failure part
    /// way through drops the maps already allocated.
    pub fn zeros_in<A: Allocator>(size: usize, depth: usize, alloc: &'a A) -> CnnResult<Self> {
        if size == 0 || depth == 0 {
            return Err(CnnError::InvalidShape {
                rows: size,
                cols: depth,
            });
        }
        let maps = (0..depth)
            .map(|_| Matrix::zeros_in(size, size, alloc))
            .collect::<CnnResult<Vec<_>>>()?;
        Ok(Self { size, maps })
    }

    /// Stacks existing channel maps, which must be non-empty, square and of
    /// equal size.
    ///
    /// A tensor owns its maps, so a view from `slice_mut` or `view_mut` is
    /// rejected with `InvalidShape`.
    pub fn from_maps(maps: Vec<Matrix<'a, T>>) -> CnnResult<Self> {
        let size = match maps.first() {
            Some(first) => first.rows(),
            None => return Err(CnnError::InvalidShape { rows: 0, cols: 0 }),
        };
        if size == 0 {
            return Err(CnnError::InvalidShape { rows: 0, cols: 0 });
        }
        if let Some(view) = maps.iter().find(|m| !m.owns_data()) {
            let (rows, cols) = view.shape();
            return Err(CnnError::InvalidShape { rows, cols });
        }
        if let Some(bad) = maps.iter().find(|m| m.shape() != (size, size)) {
            return Err(CnnError::DimensionMismatch {
                expected: (size, size),
                actual: bad.shape(),
            });
        }
        Ok(Self { size, maps })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.maps.len()
    }

    #[inline]
    pub fn shape(&self) -> TensorShape {
        TensorShape::new(self.size, self.maps.len())
    }

    pub fn maps(&self) -> &[Matrix<'a, T>] {
        &self.maps
    }

    /// Read-only view of channel `k`.
    pub fn map(&self, k: usize) -> Option<MatrixView<'_, T>> {
        self.maps.get(k).map(|m| m.view())
    }

    /// Writable view of channel `k`.
    pub fn map_mut(&mut self, k: usize) -> Option<Matrix<'_, T>> {
        self.maps.get_mut(k).map(|m| m.view_mut())
    }

    /// Writable views of every channel, in order.
    pub fn maps_mut(&mut self) -> Vec<Matrix<'_, T>> {
        self.maps.iter_mut().map(|m| m.view_mut()).collect()
    }

    pub fn fill(&mut self, value: T) {
        for map in &mut self.maps {
            map.fill(value);
        }
    }

    /// Applies `activation` to every element of every channel, in place.
    pub fn activate(&mut self, activation: Activation) {
        for map in &mut self.maps {
            map.map_inplace(|x| activation.apply(x));
        }
    }
}

impl<T: Element> core::fmt::Debug for Tensor3D<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tensor3D")
            .field("size", &self.size)
            .field("depth", &self.maps.len())
            .field("dtype", &T::DTYPE)
            .finish()
    }
}
