//! Forward-pass layers: convolution and pooling.

pub mod activations;
pub mod conv;
pub mod pooling;

use crate::arena::{Allocator, HeapAllocator};
use crate::diagnostics::{DiagnosticSink, NoopSink, Severity, Subsystem};
use crate::element::Element;
use crate::error::{CnnError, CnnResult};
use crate::tensor::{Tensor3D, TensorShape};

/// Collaborators a forward pass runs against: where output buffers come
/// from and where fatal conditions are reported.
pub struct ForwardContext<'a, A: Allocator = HeapAllocator> {
    allocator: &'a A,
    sink: &'a dyn DiagnosticSink,
}

impl ForwardContext<'static, HeapAllocator> {
    /// Heap allocation, no diagnostics.
    pub fn heap() -> Self {
        Self {
            allocator: &HeapAllocator,
            sink: &NoopSink,
        }
    }
}

impl Default for ForwardContext<'static, HeapAllocator> {
    fn default() -> Self {
        Self::heap()
    }
}

impl<'a, A: Allocator> ForwardContext<'a, A> {
    pub fn new(allocator: &'a A) -> Self {
        Self {
            allocator,
            sink: &NoopSink,
        }
    }

    pub fn with_sink(self, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            allocator: self.allocator,
            sink,
        }
    }

    #[inline]
    pub fn allocator(&self) -> &'a A {
        self.allocator
    }

    #[inline]
    pub fn sink(&self) -> &'a dyn DiagnosticSink {
        self.sink
    }

    /// Reports `err` to the sink and hands it back for propagation.
    pub(crate) fn fail(&self, subsystem: Subsystem, err: CnnError) -> CnnError {
        self.sink.report(subsystem, Severity::Error, &err.to_string());
        err
    }
}

impl<A: Allocator> Clone for ForwardContext<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: Allocator> Copy for ForwardContext<'_, A> {}

/// A stage that maps one [`Tensor3D`] to another.
pub trait Layer<T: Element> {
    fn name(&self) -> &'static str;

    /// Shape produced for an input of shape `input`, or the error `forward`
    /// would fail with.
    fn output_shape(&self, input: &TensorShape) -> CnnResult<TensorShape>;

    fn forward<'a, A: Allocator>(
        &self,
        input: &Tensor3D<'_, T>,
        ctx: &ForwardContext<'a, A>,
    ) -> CnnResult<Tensor3D<'a, T>>;
}

pub use activations::Activation;
pub use conv::{ConvLayer, Filter};
pub use pooling::{PoolKind, PoolLayer};
