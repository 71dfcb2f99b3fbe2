//! Network: chain conv and pool layers into a pipeline.
//!
//! ```text
//! Input → Layer[0] → Layer[1] → ... → Layer[N-1] → Output
//! ```
//!
//! Each layer declares its output shape, so the whole chain is validated
//! when the network is built, before any data flows through.

use tracing::{debug, instrument};

use crate::arena::Allocator;
use crate::config::{LayerConfig, NetworkConfig};
use crate::diagnostics::Subsystem;
use crate::element::Element;
use crate::error::{CnnError, CnnResult};
use crate::layers::{ConvLayer, ForwardContext, Layer, PoolLayer};
use crate::tensor::{Tensor3D, TensorShape};

/// One stage of a [`Network`].
#[derive(Debug)]
pub enum NetworkLayer<T: Element> {
    Conv(ConvLayer<T>),
    Pool(PoolLayer),
}

impl<T: Element> From<ConvLayer<T>> for NetworkLayer<T> {
    fn from(layer: ConvLayer<T>) -> Self {
        NetworkLayer::Conv(layer)
    }
}

impl<T: Element> From<PoolLayer> for NetworkLayer<T> {
    fn from(layer: PoolLayer) -> Self {
        NetworkLayer::Pool(layer)
    }
}

impl<T: Element> Layer<T> for NetworkLayer<T> {
    fn name(&self) -> &'static str {
        match self {
            NetworkLayer::Conv(layer) => layer.name(),
            NetworkLayer::Pool(layer) => Layer::<T>::name(layer),
        }
    }

    fn output_shape(&self, input: &TensorShape) -> CnnResult<TensorShape> {
        match self {
            NetworkLayer::Conv(layer) => layer.output_shape(input),
            NetworkLayer::Pool(layer) => Layer::<T>::output_shape(layer, input),
        }
    }

    fn forward<'a, A: Allocator>(
        &self,
        input: &Tensor3D<'_, T>,
        ctx: &ForwardContext<'a, A>,
    ) -> CnnResult<Tensor3D<'a, T>> {
        match self {
            NetworkLayer::Conv(layer) => layer.activation_maps(input, ctx),
            NetworkLayer::Pool(layer) => layer.downsample(input, ctx),
        }
    }
}

/// Layers executed in order, each output feeding the next layer's input.
#[derive(Debug)]
pub struct Network<T: Element> {
    layers: Vec<NetworkLayer<T>>,
    input_shape: TensorShape,
}

impl<T: Element> Network<T> {
    /// Validates shape compatibility of the whole chain up front.
    pub fn new(layers: Vec<NetworkLayer<T>>, input_shape: TensorShape) -> CnnResult<Self> {
        if input_shape.size == 0 || input_shape.depth == 0 {
            return Err(CnnError::InvalidShape {
                rows: input_shape.size,
                cols: input_shape.depth,
            });
        }
        let mut shape = input_shape;
        for layer in &layers {
            shape = layer.output_shape(&shape)?;
        }
        Ok(Self {
            layers,
            input_shape,
        })
    }

    /// Builds every layer with zero weights.
    pub fn from_config(config: &NetworkConfig) -> CnnResult<Self> {
        let layers = config
            .layers
            .iter()
            .map(|layer| -> CnnResult<NetworkLayer<T>> {
                Ok(match layer {
                    LayerConfig::Conv(c) => NetworkLayer::Conv(ConvLayer::from_config(c)?),
                    LayerConfig::Pool(p) => NetworkLayer::Pool(PoolLayer::from_config(p)?),
                })
            })
            .collect::<CnnResult<Vec<_>>>()?;
        Self::new(layers, config.input_shape())
    }

    /// Runs the forward pass. Intermediate tensors are dropped as soon as
    /// the next layer has consumed them.
    #[instrument(skip_all, name = "network::forward", fields(layers = self.layers.len()))]
    pub fn forward<'a, A: Allocator>(
        &self,
        input: &Tensor3D<'_, T>,
        ctx: &ForwardContext<'a, A>,
    ) -> CnnResult<Tensor3D<'a, T>> {
        if input.shape() != self.input_shape {
            return Err(ctx.fail(
                Subsystem::Network,
                CnnError::DimensionMismatch {
                    expected: (self.input_shape.size, self.input_shape.depth),
                    actual: (input.size(), input.depth()),
                },
            ));
        }

        let Some((first, rest)) = self.layers.split_first() else {
            // No layers: copy the input through.
            let mut out = Tensor3D::zeros_in(input.size(), input.depth(), ctx.allocator())?;
            for (src, mut dst) in input.maps().iter().zip(out.maps_mut()) {
                dst.sum(src)?;
            }
            return Ok(out);
        };

        let mut current = first.forward(input, ctx)?;
        for (idx, layer) in rest.iter().enumerate() {
            current = layer.forward(&current, ctx)?;
            debug!(
                layer = idx + 1,
                name = layer.name(),
                size = current.size(),
                depth = current.depth()
            );
        }
        Ok(current)
    }

    /// Shape of the final layer's output.
    pub fn output_shape(&self) -> CnnResult<TensorShape> {
        let mut shape = self.input_shape;
        for layer in &self.layers {
            shape = layer.output_shape(&shape)?;
        }
        Ok(shape)
    }

    pub fn input_shape(&self) -> TensorShape {
        self.input_shape
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, idx: usize) -> Option<&NetworkLayer<T>> {
        self.layers.get(idx)
    }

    /// Mutable access to a convolution layer, e.g. to load its weights.
    pub fn conv_layer_mut(&mut self, idx: usize) -> Option<&mut ConvLayer<T>> {
        match self.layers.get_mut(idx) {
            Some(NetworkLayer::Conv(layer)) => Some(layer),
            _ => None,
        }
    }
}
