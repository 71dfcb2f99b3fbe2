//! # convnet-core: CNN forward-pass engine
//!
//! Strided matrices with zero-copy views, multi-channel tensors built from
//! them, and the two layer kernels that consume them: convolution and
//! pooling.
//!
//! ## Architecture
//!
//! - **Matrix**: `rows x cols` buffer with a row pitch (`stride`). Views
//!   alias a parent's buffer and keep its stride; the borrow checker keeps
//!   every view inside its parent's lifetime.
//! - **Tensor3D**: `depth` square channel maps of equal size.
//! - **Layers**: [`ConvLayer`] correlates a bank of [`Filter`]s against a
//!   tensor and activates the stacked maps; [`PoolLayer`] downsamples each
//!   channel by max or average.
//! - **Collaborators**: an injectable [`Allocator`] (heap or bump arena) and
//!   an optional [`DiagnosticSink`], bundled in a [`ForwardContext`].
//!
//! ## Usage
//!
//! ```
//! use convnet_core::*;
//!
//! let mut input = Tensor3D::<f32>::zeros(4, 1)?;
//! input.fill(1.0);
//!
//! let mut filter = Filter::<f32>::zeros(2, 1, 1)?;
//! if let Some(mut weights) = filter.channel_mut(0) {
//!     weights.fill(1.0);
//! }
//! let conv = ConvLayer::new(vec![filter], Activation::relu())?;
//! let pool = PoolLayer::max(3, 1)?;
//!
//! let ctx = ForwardContext::default();
//! let maps = conv.activation_maps(&input, &ctx)?;
//! assert_eq!(maps.map(0).and_then(|m| m.get(1, 1)), Some(4.0));
//!
//! let pooled = pool.downsample(&maps, &ctx)?;
//! assert_eq!(pooled.shape(), TensorShape::new(1, 1));
//! # Ok::<(), CnnError>(())
//! ```

pub mod arena;
pub mod config;
pub mod diagnostics;
pub mod dynamic;
pub mod element;
pub mod error;
pub mod layers;
pub mod math;
pub mod matrix;
pub mod model;
pub mod tensor;

// Re-export primary types
pub use arena::{Allocator, ArenaAllocator, Buffer, HeapAllocator};
pub use config::{ConvLayerConfig, LayerConfig, NetworkConfig, PoolLayerConfig};
pub use diagnostics::{DiagnosticSink, NoopSink, Severity, Subsystem, TracingSink};
pub use dynamic::{AnyMatrix, Scalar};
pub use element::{DType, Element};
pub use error::{CnnError, CnnResult, ErrorKind};
pub use layers::{Activation, ConvLayer, Filter, ForwardContext, Layer, PoolKind, PoolLayer};
pub use math::{window_output_size, DEFAULT_NEGATIVE_SLOPE};
pub use matrix::{AsView, Matrix, MatrixView};
pub use model::{Network, NetworkLayer};
pub use tensor::{Tensor3D, TensorShape};
