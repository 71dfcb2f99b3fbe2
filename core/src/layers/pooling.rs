//! Pooling layer: max or average downsampling.
//!
//! Reduces `[D, N, N]` to `[D, R, R]` where `R = (N - F) / stride + 1`.
//! Channels are pooled independently and no activation follows.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::arena::Allocator;
use crate::config::PoolLayerConfig;
use crate::diagnostics::Subsystem;
use crate::element::Element;
use crate::error::{CnnError, CnnResult};
use crate::math;
use crate::tensor::{Tensor3D, TensorShape};
use super::{ForwardContext, Layer};

// =============================================================================
// PoolKind
// =============================================================================

/// Window reduction. Why `Max` is the default: it needs no division, so it
/// is exact for integer element kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Largest element of the window.
    #[default]
    Max,
    /// Mean over all `F * F` window elements, even when windows overlap.
    Average,
}

// =============================================================================
// PoolLayer
// =============================================================================

/// Square window of `filter_size` moved by `stride`, applied per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLayer {
    pub kind: PoolKind,
    pub filter_size: usize,
    pub stride: usize,
}

impl PoolLayer {
    pub fn new(kind: PoolKind, filter_size: usize, stride: usize) -> CnnResult<Self> {
        if stride == 0 {
            return Err(CnnError::InvalidStride);
        }
        if filter_size == 0 {
            return Err(CnnError::InvalidShape { rows: 0, cols: 0 });
        }
        Ok(Self {
            kind,
            filter_size,
            stride,
        })
    }

    /// Convenience: max pooling, e.g. 2x2 with stride 2.
    pub fn max(filter_size: usize, stride: usize) -> CnnResult<Self> {
        Self::new(PoolKind::Max, filter_size, stride)
    }

    pub fn average(filter_size: usize, stride: usize) -> CnnResult<Self> {
        Self::new(PoolKind::Average, filter_size, stride)
    }

    pub fn from_config(config: &PoolLayerConfig) -> CnnResult<Self> {
        Self::new(config.kind, config.filter_size, config.stride)
    }

    /// Pools every channel of `input` into a new tensor from `ctx`'s
    /// allocator. Nothing is allocated when the window does not tile the
    /// input exactly.
    #[instrument(
        skip_all,
        name = "pool::downsample",
        fields(kind = ?self.kind, size = input.size(), depth = input.depth())
    )]
    pub fn downsample<'a, T: Element, A: Allocator>(
        &self,
        input: &Tensor3D<'_, T>,
        ctx: &ForwardContext<'a, A>,
    ) -> CnnResult<Tensor3D<'a, T>> {
        let fail = |e| ctx.fail(Subsystem::Pooling, e);
        let shape = Layer::<T>::output_shape(self, &input.shape()).map_err(fail)?;
        let mut output =
            Tensor3D::zeros_in(shape.size, shape.depth, ctx.allocator()).map_err(fail)?;

        let (f, stride) = (self.filter_size, self.stride);
        let window_len = f * f;
        for (src, mut dst) in input.maps().iter().zip(output.maps_mut()) {
            for i in 0..shape.size {
                for j in 0..shape.size {
                    let window = src.slice(i * stride, j * stride, f, f)?;
                    dst[(i, j)] = match self.kind {
                        PoolKind::Max => window
                            .max()
                            .ok_or(CnnError::InvalidShape { rows: f, cols: f })?,
                        PoolKind::Average => T::mean(window.sum_elements(), window_len),
                    };
                }
            }
        }

        debug!(size = shape.size, depth = shape.depth, "downsampled");
        Ok(output)
    }
}

// =============================================================================
// Layer impl
// =============================================================================

impl<T: Element> Layer<T> for PoolLayer {
    fn name(&self) -> &'static str {
        match self.kind {
            PoolKind::Max => "MaxPool",
            PoolKind::Average => "AvgPool",
        }
    }

    fn output_shape(&self, input: &TensorShape) -> CnnResult<TensorShape> {
        let size = math::window_output_size(input.size, self.filter_size, self.stride)?;
        Ok(TensorShape::new(size, input.depth))
    }

    fn forward<'a, A: Allocator>(
        &self,
        input: &Tensor3D<'_, T>,
        ctx: &ForwardContext<'a, A>,
    ) -> CnnResult<Tensor3D<'a, T>> {
        self.downsample(input, ctx)
    }
}
