//! Convolution layer: a bank of filters correlated against a multi-channel
//! input, one channel-summed activation map per filter.

use tracing::{debug, instrument, trace};

use crate::arena::Allocator;
use crate::config::ConvLayerConfig;
use crate::diagnostics::Subsystem;
use crate::element::Element;
use crate::error::{CnnError, CnnResult};
use crate::math;
use crate::matrix::{Matrix, MatrixView};
use crate::tensor::{Tensor3D, TensorShape};
use super::{Activation, ForwardContext, Layer};

// =============================================================================
// Filter
// =============================================================================

/// A square kernel with one weight map per input channel.
pub struct Filter<T: Element> {
    stride: usize,
    weights: Tensor3D<'static, T>,
}

impl<T: Element> Filter<T> {
    /// Zero-weight `size x size x depth` filter.
    pub fn zeros(size: usize, depth: usize, stride: usize) -> CnnResult<Self> {
        Self::from_weights(Tensor3D::zeros(size, depth)?, stride)
    }

    pub fn from_weights(weights: Tensor3D<'static, T>, stride: usize) -> CnnResult<Self> {
        if stride == 0 {
            return Err(CnnError::InvalidStride);
        }
        Ok(Self { stride, weights })
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Kernel edge length.
    #[inline]
    pub fn size(&self) -> usize {
        self.weights.size()
    }

    /// Expected input channel count.
    #[inline]
    pub fn depth(&self) -> usize {
        self.weights.depth()
    }

    pub fn weights(&self) -> &Tensor3D<'static, T> {
        &self.weights
    }

    /// Writable view of the weights for input channel `k`.
    pub fn channel_mut(&mut self, k: usize) -> Option<Matrix<'_, T>> {
        self.weights.map_mut(k)
    }

    /// Replaces the weights with a tensor of the same shape.
    pub fn set_weights(&mut self, weights: Tensor3D<'static, T>) -> CnnResult<()> {
        if weights.shape() != self.weights.shape() {
            return Err(CnnError::DimensionMismatch {
                expected: (self.size(), self.depth()),
                actual: (weights.size(), weights.depth()),
            });
        }
        self.weights = weights;
        Ok(())
    }

    /// Edge length of the map this filter produces over `input`.
    pub fn output_size(&self, input: &TensorShape) -> CnnResult<usize> {
        if input.depth != self.depth() {
            return Err(CnnError::DimensionMismatch {
                expected: (self.depth(), input.size),
                actual: (input.depth, input.size),
            });
        }
        math::window_output_size(input.size, self.size(), self.stride)
    }

    /// Pre-activation map: cell `(i, j)` is the sum over channels `k` of
    /// the Frobenius product of `weights[k]` with the window of
    /// `input[k]` at `(i * stride, j * stride)`.
    pub fn convolve<'a, A: Allocator>(
        &self,
        input: &Tensor3D<'_, T>,
        ctx: &ForwardContext<'a, A>,
    ) -> CnnResult<Matrix<'a, T>> {
        let fail = |e| ctx.fail(Subsystem::Convolution, e);
        let out = self.output_size(&input.shape()).map_err(fail)?;
        let mut result = Matrix::zeros_in(out, out, ctx.allocator()).map_err(fail)?;

        let (f, stride) = (self.size(), self.stride);
        for i in 0..out {
            for j in 0..out {
                let mut acc = T::ZERO;
                for (channel, kernel) in input.maps().iter().zip(self.weights.maps()) {
                    let window: MatrixView<'_, T> = channel.slice(i * stride, j * stride, f, f)?;
                    acc = acc.wrapping_add(window.dot(kernel)?);
                }
                result[(i, j)] = acc;
            }
        }
        trace!(out, "filter applied");
        Ok(result)
    }
}

impl<T: Element> core::fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Filter")
            .field("size", &self.size())
            .field("depth", &self.depth())
            .field("stride", &self.stride)
            .finish()
    }
}

// =============================================================================
// ConvLayer
// =============================================================================

/// Filters sharing stride, size and depth, followed by an activation.
///
/// Why one shared stride: every filter's map becomes a channel of the same
/// output tensor, so all maps must have the same edge length.
#[derive(Debug)]
pub struct ConvLayer<T: Element> {
    filters: Vec<Filter<T>>,
    activation: Activation,
}

impl<T: Element> ConvLayer<T> {
    /// Fails with `InvalidShape` for an empty bank and `DimensionMismatch`
    /// when the filters disagree on shape, or `InvalidStride` on stride.
    pub fn new(filters: Vec<Filter<T>>, activation: Activation) -> CnnResult<Self> {
        let first = filters
            .first()
            .ok_or(CnnError::InvalidShape { rows: 0, cols: 0 })?;
        for filter in &filters[1..] {
            if filter.stride != first.stride {
                return Err(CnnError::InvalidStride);
            }
            if (filter.size(), filter.depth()) != (first.size(), first.depth()) {
                return Err(CnnError::DimensionMismatch {
                    expected: (first.size(), first.depth()),
                    actual: (filter.size(), filter.depth()),
                });
            }
        }
        Ok(Self {
            filters,
            activation,
        })
    }

    /// Zero-weight layer shaped by `config`.
    pub fn from_config(config: &ConvLayerConfig) -> CnnResult<Self> {
        let filters = (0..config.n_filters)
            .map(|_| Filter::zeros(config.filter_size, config.depth, config.stride))
            .collect::<CnnResult<Vec<_>>>()?;
        Self::new(filters, config.activation)
    }

    #[inline]
    pub fn n_filters(&self) -> usize {
        self.filters.len()
    }

    pub fn filters(&self) -> &[Filter<T>] {
        &self.filters
    }

    pub fn filter_mut(&mut self, idx: usize) -> Option<&mut Filter<T>> {
        self.filters.get_mut(idx)
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.filters[0].stride
    }

    #[inline]
    pub fn filter_size(&self) -> usize {
        self.filters[0].size()
    }

    /// Expected input channel count.
    #[inline]
    pub fn depth(&self) -> usize {
        self.filters[0].depth()
    }

    /// Convolves `input` with every filter, stacks the maps and activates
    /// them in place. Output depth equals the number of filters.
    ///
    /// All shape checks run before anything is allocated; on a later
    /// failure the maps built so far are dropped, never returned.
    #[instrument(
        skip_all,
        name = "conv::activation_maps",
        fields(filters = self.filters.len(), size = input.size(), depth = input.depth())
    )]
    pub fn activation_maps<'a, A: Allocator>(
        &self,
        input: &Tensor3D<'_, T>,
        ctx: &ForwardContext<'a, A>,
    ) -> CnnResult<Tensor3D<'a, T>> {
        let fail = |e| ctx.fail(Subsystem::Convolution, e);
        let shape = self.output_shape(&input.shape()).map_err(fail)?;

        let maps = self
            .filters
            .iter()
            .map(|filter| filter.convolve(input, ctx))
            .collect::<CnnResult<Vec<_>>>()?;
        let mut output = Tensor3D::from_maps(maps).map_err(fail)?;
        output.activate(self.activation);

        debug!(
            size = shape.size,
            depth = shape.depth,
            activation = self.activation.name(),
            "activation maps computed"
        );
        Ok(output)
    }
}

impl<T: Element> Layer<T> for ConvLayer<T> {
    fn name(&self) -> &'static str {
        "Conv"
    }

    fn output_shape(&self, input: &TensorShape) -> CnnResult<TensorShape> {
        let mut sizes = self.filters.iter().map(|filter| filter.output_size(input));
        let size = sizes
            .next()
            .unwrap_or(Err(CnnError::InvalidShape { rows: 0, cols: 0 }))?;
        for out in sizes {
            let out = out?;
            if out != size {
                return Err(CnnError::DimensionMismatch {
                    expected: (size, size),
                    actual: (out, out),
                });
            }
        }
        Ok(TensorShape::new(size, self.filters.len()))
    }

    fn forward<'a, A: Allocator>(
        &self,
        input: &Tensor3D<'_, T>,
        ctx: &ForwardContext<'a, A>,
    ) -> CnnResult<Tensor3D<'a, T>> {
        self.activation_maps(input, ctx)
    }
}
