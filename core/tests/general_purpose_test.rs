//! General-purpose integration tests for convnet-core.
//!
//! Covers matrix views and their aliasing rules, tensors, the convolution
//! and pooling kernels, network chaining, allocators and diagnostics.

use std::cell::RefCell;

use convnet_core::*;

fn counting(rows: usize, cols: usize) -> Matrix<'static, f32> {
    let data = (1..=rows * cols).map(|v| v as f32).collect();
    Matrix::from_vec(rows, cols, data).unwrap()
}

fn filled_filter(size: usize, depth: usize, stride: usize, value: f32) -> Filter<f32> {
    let mut filter = Filter::zeros(size, depth, stride).unwrap();
    for k in 0..depth {
        filter.channel_mut(k).unwrap().fill(value);
    }
    filter
}

fn ones_tensor(size: usize, depth: usize) -> Tensor3D<'static, f32> {
    let mut t = Tensor3D::zeros(size, depth).unwrap();
    t.fill(1.0);
    t
}

/// Collects every report it receives.
#[derive(Default)]
struct RecordingSink {
    reports: RefCell<Vec<(Subsystem, Severity, String)>>,
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, subsystem: Subsystem, severity: Severity, message: &str) {
        self.reports
            .borrow_mut()
            .push((subsystem, severity, message.to_string()));
    }
}

// =============================================================================
// Matrix Creation Tests
// =============================================================================

#[test]
fn test_matrix_zeros() {
    let m = Matrix::<f64>::zeros(3, 4).unwrap();
    assert_eq!(m.shape(), (3, 4));
    assert_eq!(m.stride(), 4);
    assert!(m.owns_data());
    assert_eq!(m.dtype(), DType::F64);
    assert!(m.iter().all(|v| v == 0.0));
}

#[test]
fn test_matrix_zero_dimension_rejected() {
    assert_eq!(
        Matrix::<f32>::zeros(0, 3).unwrap_err(),
        CnnError::InvalidShape { rows: 0, cols: 3 }
    );
    assert_eq!(
        Matrix::<i32>::zeros(2, 0).unwrap_err().kind(),
        ErrorKind::InvalidShape
    );
}

#[test]
fn test_matrix_from_vec_length_checked() {
    let err = Matrix::from_vec(2, 2, vec![1.0f32, 2.0, 3.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DimMismatch);

    let ragged = Matrix::from_rows(&[vec![1i32, 2], vec![3]]);
    assert!(ragged.is_err());
}

#[test]
fn test_matrix_get_set() {
    let mut m = Matrix::<i64>::zeros(2, 3).unwrap();
    m.set(1, 2, 9).unwrap();
    assert_eq!(m.get(1, 2), Some(9));
    assert_eq!(m[(1, 2)], 9);
    assert_eq!(m.get(2, 0), None);
    assert_eq!(m.set(0, 3, 1).unwrap_err().kind(), ErrorKind::OutOfBounds);
}

// =============================================================================
// Matrix Arithmetic Tests
// =============================================================================

#[test]
fn test_dot_of_constant_matrices() {
    let a = Matrix::filled(3, 4, 2.0f64).unwrap();
    let b = Matrix::filled(3, 4, 3.0f64).unwrap();
    // x * y * m * n
    assert_eq!(a.dot(&b).unwrap(), 72.0);
}

#[test]
fn test_dot_shape_mismatch() {
    let a = Matrix::<f32>::zeros(2, 3).unwrap();
    let b = Matrix::<f32>::zeros(3, 2).unwrap();
    assert_eq!(
        a.dot(&b).unwrap_err(),
        CnnError::DimensionMismatch {
            expected: (2, 3),
            actual: (3, 2)
        }
    );
}

#[test]
fn test_multiply() {
    let left = Matrix::from_rows(&[[1i32, 2], [3, 4]]).unwrap();
    let right = Matrix::from_rows(&[[5i32, 6], [7, 8]]).unwrap();
    let mut out = Matrix::filled(2, 2, 100).unwrap();
    out.multiply(&left, &right).unwrap();
    assert_eq!(out, Matrix::from_rows(&[[19, 22], [43, 50]]).unwrap());

    let product = left.view().matmul(&right).unwrap();
    assert_eq!(product, out);
}

#[test]
fn test_multiply_rejects_bad_shapes_without_writing() {
    let left = Matrix::<f32>::zeros(2, 3).unwrap();
    let right = Matrix::<f32>::zeros(2, 2).unwrap();
    let mut out = Matrix::filled(2, 2, 5.0f32).unwrap();
    assert!(out.multiply(&left, &right).is_err());
    assert!(out.iter().all(|v| v == 5.0));
}

#[test]
fn test_sum_and_scalar() {
    let mut m = counting(2, 2);
    let ones = Matrix::filled(2, 2, 1.0f32).unwrap();
    m.sum(&ones).unwrap();
    m.scalar(2.0);
    assert_eq!(m.iter().collect::<Vec<_>>(), vec![4.0, 6.0, 8.0, 10.0]);

    let wrong = Matrix::<f32>::zeros(2, 3).unwrap();
    assert_eq!(m.sum(&wrong).unwrap_err().kind(), ErrorKind::DimMismatch);
}

#[test]
fn test_sum_into_view_touches_only_region() {
    let mut m = Matrix::<f32>::zeros(3, 3).unwrap();
    {
        let mut corner = m.slice_mut(1, 1, 2, 2).unwrap();
        corner.sum(&Matrix::filled(2, 2, 1.0f32).unwrap()).unwrap();
    }
    assert_eq!(
        m.iter().collect::<Vec<_>>(),
        vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0]
    );
}

#[test]
fn test_integer_dot_wraps_on_overflow() {
    let a = Matrix::<i32>::filled(2, 2, 40_000).unwrap();
    assert_eq!(a.dot(&a).unwrap(), (4 * 40_000i64 * 40_000) as i32);

    let b = Matrix::<i64>::filled(1, 2, i64::MAX).unwrap();
    assert_eq!(b.dot(&b).unwrap(), 2);
}

#[test]
fn test_integer_arithmetic_wraps_on_overflow() {
    let mut m = Matrix::<i32>::filled(1, 1, i32::MAX).unwrap();
    m.sum(&Matrix::filled(1, 1, 1).unwrap()).unwrap();
    assert_eq!(m.get(0, 0), Some(i32::MIN));

    let mut m = Matrix::<i32>::filled(1, 1, i32::MAX).unwrap();
    m.scalar(2);
    assert_eq!(m.get(0, 0), Some(-2));

    let left = Matrix::<i32>::filled(1, 2, i32::MAX).unwrap();
    let right = Matrix::<i32>::filled(2, 1, 2).unwrap();
    let mut out = Matrix::<i32>::zeros(1, 1).unwrap();
    out.multiply(&left, &right).unwrap();
    assert_eq!(out.get(0, 0), Some(-4));
}

// =============================================================================
// View Tests
// =============================================================================

#[test]
fn test_slice_keeps_parent_stride() {
    let m = counting(4, 5);
    let view = m.slice(1, 2, 2, 3).unwrap();
    assert_eq!(view.stride(), m.stride());
    assert_eq!(view.shape(), (2, 3));
    assert!(!view.owns_data());
    assert_eq!(view.iter().collect::<Vec<_>>(), vec![8.0, 9.0, 10.0, 13.0, 14.0, 15.0]);
}

#[test]
fn test_slice_mut_writes_alias_parent() {
    let mut m = Matrix::<f32>::zeros(5, 6).unwrap();
    {
        let mut view = m.slice_mut(2, 3, 2, 2).unwrap();
        assert_eq!(view.stride(), 6);
        assert!(!view.owns_data());
        view.set(0, 0, 7.0).unwrap();
        view[(1, 1)] = 8.0;
    }
    assert_eq!(m.get(2, 3), Some(7.0));
    assert_eq!(m.get(3, 4), Some(8.0));
}

#[test]
fn test_parent_writes_visible_through_new_view() {
    let mut m = counting(3, 3);
    m.set(2, 2, -1.0).unwrap();
    let view = m.slice(1, 1, 2, 2).unwrap();
    assert_eq!(view.get(1, 1), Some(-1.0));
}

#[test]
fn test_slice_out_of_bounds() {
    let m = Matrix::<f32>::zeros(4, 4).unwrap();
    // row + nrows == rows + 1
    let err = m.slice(1, 0, 4, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
    assert!(m.slice(0, 3, 1, 2).is_err());
    assert!(m.slice(usize::MAX, 0, 2, 1).is_err());
    assert!(m.slice(0, 0, 4, 4).is_ok());
}

#[test]
fn test_empty_slice() {
    let m = Matrix::<f32>::zeros(4, 4).unwrap();
    let empty = m.slice(4, 4, 0, 0).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.iter().count(), 0);
    assert_eq!(empty.max(), None);
    assert_eq!(empty.sum_elements(), 0.0);
}

#[test]
fn test_nested_slices() {
    let m = counting(5, 5);
    let outer = m.slice(1, 1, 3, 3).unwrap();
    let inner = outer.slice(1, 1, 2, 2).unwrap();
    assert_eq!(inner.stride(), 5);
    assert_eq!(inner.iter().collect::<Vec<_>>(), vec![13.0, 14.0, 18.0, 19.0]);
}

#[test]
fn test_row_and_col_views() {
    let mut m = counting(3, 3);
    assert_eq!(m.row(1).unwrap().iter().collect::<Vec<_>>(), vec![4.0, 5.0, 6.0]);
    let col = m.col(1).unwrap();
    assert_eq!(col.shape(), (3, 1));
    assert_eq!(col.iter().collect::<Vec<_>>(), vec![2.0, 5.0, 8.0]);
    assert!(m.row(3).is_err());
    assert!(m.col(3).is_err());

    m.col_mut(0).unwrap().fill(0.0);
    m.row_mut(2).unwrap().scalar(10.0);
    assert_eq!(
        m.iter().collect::<Vec<_>>(),
        vec![0.0, 2.0, 3.0, 0.0, 5.0, 6.0, 0.0, 80.0, 90.0]
    );
}

#[test]
fn test_dropping_view_leaves_parent_intact() {
    let mut m = counting(3, 3);
    {
        let view = m.slice_mut(0, 0, 2, 2).unwrap();
        assert_eq!(view.get(1, 1), Some(5.0));
    }
    assert_eq!(m.get(2, 2), Some(9.0));
    m.set(0, 0, 42.0).unwrap();
    assert_eq!(m.get(0, 0), Some(42.0));
}

#[test]
fn test_dot_on_strided_views() {
    let m = counting(4, 4);
    let a = m.slice(0, 0, 2, 2).unwrap();
    let b = m.slice(2, 2, 2, 2).unwrap();
    // [1 2; 5 6] . [11 12; 15 16]
    assert_eq!(a.dot(&b).unwrap(), 11.0 + 24.0 + 75.0 + 96.0);
}

#[test]
fn test_to_packed_copies_view() {
    let m = counting(3, 4);
    let packed = m.slice(1, 1, 2, 2).unwrap().to_packed().unwrap();
    assert!(packed.owns_data());
    assert_eq!(packed.stride(), 2);
    assert_eq!(packed.iter().collect::<Vec<_>>(), vec![6.0, 7.0, 10.0, 11.0]);
}

#[test]
fn test_display() {
    let m = Matrix::from_rows(&[[1i32, 2], [3, 4]]).unwrap();
    assert_eq!(m.to_string(), "1 2\n3 4\n");
    assert_eq!(m.col(1).unwrap().to_string(), "2\n4\n");
}

// =============================================================================
// Runtime DType Tests
// =============================================================================

#[test]
fn test_any_matrix_dtype_mismatch() {
    let a = AnyMatrix::zeros(2, 2, DType::F32).unwrap();
    let b = AnyMatrix::zeros(2, 2, DType::F64).unwrap();
    assert_eq!(
        a.dot(&b).unwrap_err(),
        CnnError::DtypeMismatch {
            left: DType::F32,
            right: DType::F64
        }
    );
}

#[test]
fn test_any_matrix_same_dtype() {
    let mut a = AnyMatrix::zeros(2, 2, DType::I32).unwrap();
    let mut b = AnyMatrix::zeros(2, 2, DType::I32).unwrap();
    a.fill(2.0);
    b.fill(3.0);
    assert_eq!(a.dot(&b).unwrap(), Scalar::I32(24));
    assert_eq!(a.dot(&b).unwrap().to_f64(), 24.0);
    a.sum(&b).unwrap();
    assert_eq!(a.get(0, 0), Some(Scalar::I32(5)));
    assert_eq!(a.dtype(), DType::I32);
    assert!(a.owns_data());
}

// =============================================================================
// Tensor Tests
// =============================================================================

#[test]
fn test_tensor_zeros() {
    let t = Tensor3D::<f32>::zeros(5, 3).unwrap();
    assert_eq!(t.shape(), TensorShape::new(5, 3));
    assert_eq!(t.shape().total(), 75);
    assert!(t.maps().iter().all(|m| m.shape() == (5, 5)));
    assert!(t.map(3).is_none());
}

#[test]
fn test_tensor_invalid_shape() {
    assert_eq!(
        Tensor3D::<f32>::zeros(0, 2).unwrap_err().kind(),
        ErrorKind::InvalidShape
    );
    assert_eq!(
        Tensor3D::<f32>::zeros(2, 0).unwrap_err().kind(),
        ErrorKind::InvalidShape
    );
}

#[test]
fn test_tensor_from_maps_requires_equal_sizes() {
    let maps = vec![Matrix::<f32>::zeros(2, 2).unwrap(), Matrix::zeros(3, 3).unwrap()];
    assert_eq!(
        Tensor3D::from_maps(maps).unwrap_err().kind(),
        ErrorKind::DimMismatch
    );
    assert!(Tensor3D::<f32>::from_maps(Vec::new()).is_err());
}

#[test]
fn test_tensor_from_maps_rejects_views() {
    let mut parent = Matrix::<f32>::zeros(4, 4).unwrap();
    let err = Tensor3D::from_maps(vec![parent.slice_mut(0, 0, 2, 2).unwrap()]).unwrap_err();
    assert_eq!(err, CnnError::InvalidShape { rows: 2, cols: 2 });
    assert!(Tensor3D::from_maps(vec![parent.view_mut()]).is_err());

    let owned = Tensor3D::from_maps(vec![Matrix::<f32>::zeros(2, 2).unwrap()]).unwrap();
    assert_eq!(owned.shape(), TensorShape::new(2, 1));
}

#[test]
fn test_tensor_map_mut_writes_channel() {
    let mut t = Tensor3D::<i32>::zeros(2, 2).unwrap();
    t.map_mut(1).unwrap().set(0, 1, 3).unwrap();
    assert_eq!(t.map(1).unwrap().get(0, 1), Some(3));
    assert_eq!(t.map(0).unwrap().get(0, 1), Some(0));
}

// =============================================================================
// Activation Tests
// =============================================================================

#[test]
fn test_leaky_relu() {
    let relu = Activation::relu();
    assert_eq!(relu.apply(3.0f64), 3.0);
    assert!((relu.apply(-2.0f64) + 0.2).abs() < 1e-12);
    assert_eq!(relu.apply(0.0f32), 0.0);
    assert_eq!(Activation::leaky_relu(0.5).apply(-4.0f32), -2.0);
    assert_eq!(relu.apply(-20i32), -2);
}

#[test]
fn test_sigmoid_is_stable() {
    let sigmoid = Activation::Sigmoid;
    assert_eq!(sigmoid.apply(0.0f64), 0.5);
    let low = sigmoid.apply(-1000.0f64);
    let high = sigmoid.apply(1000.0f64);
    assert!(low.is_finite() && low >= 0.0 && low < 1e-300);
    assert_eq!(high, 1.0);
    assert!(sigmoid.apply(-500.0f32).is_finite());
}

#[test]
fn test_activation_default_and_names() {
    assert_eq!(Activation::default(), Activation::Sigmoid);
    assert_eq!(Activation::relu().name(), "ReLU");
    assert_eq!(Activation::Sigmoid.name(), "Sigmoid");
}

// =============================================================================
// Convolution Tests
// =============================================================================

#[test]
fn test_convolve_ones() {
    let input = ones_tensor(4, 1);
    let filter = filled_filter(2, 1, 1, 1.0);
    let map = filter.convolve(&input, &ForwardContext::heap()).unwrap();
    assert_eq!(map.shape(), (3, 3));
    assert!(map.iter().all(|v| v == 4.0));
}

#[test]
fn test_conv_layer_relu_preserves_positive_maps() {
    let input = ones_tensor(4, 1);
    let conv = ConvLayer::new(vec![filled_filter(2, 1, 1, 1.0)], Activation::relu()).unwrap();
    let out = conv.activation_maps(&input, &ForwardContext::heap()).unwrap();
    assert_eq!(out.shape(), TensorShape::new(3, 1));
    assert!(out.map(0).unwrap().iter().all(|v| v == 4.0));
}

#[test]
fn test_conv_multi_channel_multi_filter_stride() {
    let mut input = Tensor3D::<f32>::zeros(5, 2).unwrap();
    input.map_mut(0).unwrap().fill(1.0);
    input.map_mut(1).unwrap().fill(2.0);

    let conv = ConvLayer::new(
        vec![filled_filter(3, 2, 2, 1.0), filled_filter(3, 2, 2, 0.5)],
        Activation::relu(),
    )
    .unwrap();
    assert_eq!(conv.n_filters(), 2);
    assert_eq!(conv.stride(), 2);

    let out = conv.activation_maps(&input, &ForwardContext::heap()).unwrap();
    assert_eq!(out.shape(), TensorShape::new(2, 2));
    // 9 * 1 + 9 * 2, summed across channels
    assert!(out.map(0).unwrap().iter().all(|v| v == 27.0));
    assert!(out.map(1).unwrap().iter().all(|v| v == 13.5));
}

#[test]
fn test_conv_output_cells_use_strided_offsets() {
    let mut input = Tensor3D::<f32>::zeros(5, 1).unwrap();
    let counted = counting(5, 5);
    input.map_mut(0).unwrap().sum(&counted).unwrap();

    let mut filter = Filter::<f32>::zeros(1, 1, 2).unwrap();
    filter.channel_mut(0).unwrap().fill(1.0);
    let map = filter.convolve(&input, &ForwardContext::heap()).unwrap();
    // 1x1 picks (2i, 2j)
    assert_eq!(
        map.iter().collect::<Vec<_>>(),
        vec![1.0, 3.0, 5.0, 11.0, 13.0, 15.0, 21.0, 23.0, 25.0]
    );
}

#[test]
fn test_integer_conv_wraps_on_overflow() {
    let mut input = Tensor3D::<i32>::zeros(2, 1).unwrap();
    input.fill(50_000);
    let mut filter = Filter::<i32>::zeros(2, 1, 1).unwrap();
    filter.channel_mut(0).unwrap().fill(50_000);
    let conv = ConvLayer::new(vec![filter], Activation::relu()).unwrap();

    let out = conv.activation_maps(&input, &ForwardContext::heap()).unwrap();
    let expected = (4 * 50_000i64 * 50_000) as i32;
    assert!(expected > 0);
    assert_eq!(out.map(0).unwrap().get(0, 0), Some(expected));
}

#[test]
fn test_conv_sigmoid_applied_after_stacking() {
    let input = ones_tensor(3, 1);
    let conv = ConvLayer::new(vec![filled_filter(3, 1, 1, 0.0)], Activation::Sigmoid).unwrap();
    let out = conv.activation_maps(&input, &ForwardContext::heap()).unwrap();
    assert_eq!(out.map(0).unwrap().get(0, 0), Some(0.5));
}

#[test]
fn test_conv_non_integral_tiling() {
    let input = ones_tensor(6, 1);
    let conv = ConvLayer::new(vec![filled_filter(3, 1, 2, 1.0)], Activation::relu()).unwrap();
    let arena = ArenaAllocator::with_capacity(1024);
    let err = conv
        .activation_maps(&input, &ForwardContext::new(&arena))
        .unwrap_err();
    assert_eq!(
        err,
        CnnError::NonIntegralTiling {
            input: 6,
            window: 3,
            stride: 2
        }
    );
    // rejected before any output map is allocated
    assert_eq!(arena.used(), 0);
}

#[test]
fn test_conv_allocation_failure_on_second_filter() {
    let sink = RecordingSink::default();
    // room for one 3x3 f32 map, not two
    let arena = ArenaAllocator::with_capacity(40);
    let ctx = ForwardContext::new(&arena).with_sink(&sink);
    let conv = ConvLayer::new(
        vec![filled_filter(3, 1, 1, 1.0), filled_filter(3, 1, 1, 2.0)],
        Activation::relu(),
    )
    .unwrap();

    let result = conv.activation_maps(&ones_tensor(5, 1), &ctx);
    assert_eq!(
        result.unwrap_err(),
        CnnError::AllocationFailure {
            requested: 36,
            remaining: 4
        }
    );

    let reports = sink.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, Subsystem::Convolution);
    assert_eq!(reports[0].1, Severity::Error);
}

#[test]
fn test_conv_depth_mismatch() {
    let input = ones_tensor(4, 3);
    let conv = ConvLayer::new(vec![filled_filter(2, 2, 1, 1.0)], Activation::relu()).unwrap();
    let err = conv
        .activation_maps(&input, &ForwardContext::heap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DimMismatch);
}

#[test]
fn test_conv_layer_validation() {
    assert_eq!(
        ConvLayer::<f32>::new(Vec::new(), Activation::relu()).unwrap_err().kind(),
        ErrorKind::InvalidShape
    );
    assert_eq!(
        ConvLayer::new(
            vec![filled_filter(2, 1, 1, 1.0), filled_filter(2, 1, 2, 1.0)],
            Activation::relu()
        )
        .unwrap_err(),
        CnnError::InvalidStride
    );
    assert!(ConvLayer::new(
        vec![filled_filter(2, 1, 1, 1.0), filled_filter(3, 1, 1, 1.0)],
        Activation::relu()
    )
    .is_err());
    assert_eq!(Filter::<f32>::zeros(2, 1, 0).unwrap_err(), CnnError::InvalidStride);
}

#[test]
fn test_filter_set_weights_checks_shape() {
    let mut filter = Filter::<f32>::zeros(2, 1, 1).unwrap();
    assert!(filter.set_weights(Tensor3D::zeros(3, 1).unwrap()).is_err());
    filter.set_weights(ones_tensor(2, 1)).unwrap();
    assert_eq!(filter.weights().map(0).unwrap().sum_elements(), 4.0);
}

// =============================================================================
// Pooling Tests
// =============================================================================

fn counting_tensor() -> Tensor3D<'static, f32> {
    let mut t = Tensor3D::zeros(4, 1).unwrap();
    t.map_mut(0).unwrap().sum(&counting(4, 4)).unwrap();
    t
}

#[test]
fn test_max_pool() {
    let pool = PoolLayer::max(2, 2).unwrap();
    let out = pool
        .downsample(&counting_tensor(), &ForwardContext::heap())
        .unwrap();
    assert_eq!(out.shape(), TensorShape::new(2, 1));
    assert_eq!(
        out.maps()[0],
        Matrix::from_rows(&[[6.0f32, 8.0], [14.0, 16.0]]).unwrap()
    );
}

#[test]
fn test_average_pool() {
    let pool = PoolLayer::average(2, 2).unwrap();
    let out = pool
        .downsample(&counting_tensor(), &ForwardContext::heap())
        .unwrap();
    assert_eq!(
        out.maps()[0],
        Matrix::from_rows(&[[3.5f32, 5.5], [11.5, 13.5]]).unwrap()
    );
}

#[test]
fn test_average_pool_integer_division() {
    let mut input = Tensor3D::<i32>::zeros(4, 1).unwrap();
    let values = Matrix::from_vec(4, 4, (1..=16).collect()).unwrap();
    input.map_mut(0).unwrap().sum(&values).unwrap();
    let out = PoolLayer::average(2, 2)
        .unwrap()
        .downsample(&input, &ForwardContext::heap())
        .unwrap();
    assert_eq!(out.map(0).unwrap().get(0, 0), Some(3));
}

#[test]
fn test_pool_channels_independent() {
    let mut input = Tensor3D::<f32>::zeros(2, 2).unwrap();
    input.map_mut(0).unwrap().set(1, 0, -3.0).unwrap();
    input.map_mut(1).unwrap().fill(-1.0);
    let out = PoolLayer::max(2, 1)
        .unwrap()
        .downsample(&input, &ForwardContext::heap())
        .unwrap();
    assert_eq!(out.shape(), TensorShape::new(1, 2));
    assert_eq!(out.map(0).unwrap().get(0, 0), Some(0.0));
    assert_eq!(out.map(1).unwrap().get(0, 0), Some(-1.0));
}

#[test]
fn test_pool_non_integral_tiling() {
    let input = ones_tensor(5, 1);
    let arena = ArenaAllocator::with_capacity(1024);
    let err = PoolLayer::max(2, 2)
        .unwrap()
        .downsample(&input, &ForwardContext::new(&arena))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NonIntegralTiling);
    assert_eq!(arena.used(), 0);
}

#[test]
fn test_pool_validation() {
    assert_eq!(PoolLayer::max(2, 0).unwrap_err(), CnnError::InvalidStride);
    assert!(PoolLayer::average(0, 1).is_err());
    let pool = PoolLayer::max(5, 1).unwrap();
    assert_eq!(
        Layer::<f32>::output_shape(&pool, &TensorShape::new(4, 1))
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidShape
    );
}

// =============================================================================
// Window Geometry Tests
// =============================================================================

#[test]
fn test_window_output_size() {
    assert_eq!(window_output_size(4, 2, 2), Ok(2));
    assert_eq!(window_output_size(4, 2, 1), Ok(3));
    assert_eq!(window_output_size(4, 4, 3), Ok(1));
    assert_eq!(window_output_size(4, 2, 0), Err(CnnError::InvalidStride));
    assert!(window_output_size(3, 4, 1).is_err());
    assert_eq!(
        window_output_size(5, 2, 2).unwrap_err().kind(),
        ErrorKind::NonIntegralTiling
    );
}

// =============================================================================
// Network Tests
// =============================================================================

fn small_network() -> Network<f32> {
    let conv = ConvLayer::new(vec![filled_filter(3, 1, 1, 1.0)], Activation::relu()).unwrap();
    let pool = PoolLayer::max(2, 2).unwrap();
    Network::new(vec![conv.into(), pool.into()], TensorShape::new(6, 1)).unwrap()
}

#[test]
fn test_network_forward() {
    let net = small_network();
    assert_eq!(net.num_layers(), 2);
    assert_eq!(net.output_shape().unwrap(), TensorShape::new(2, 1));

    let out = net
        .forward(&ones_tensor(6, 1), &ForwardContext::heap())
        .unwrap();
    assert_eq!(out.shape(), TensorShape::new(2, 1));
    assert!(out.map(0).unwrap().iter().all(|v| v == 9.0));
}

#[test]
fn test_network_rejects_wrong_input() {
    let net = small_network();
    let err = net
        .forward(&ones_tensor(5, 1), &ForwardContext::heap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DimMismatch);
}

#[test]
fn test_network_validates_chain_at_build() {
    let conv = ConvLayer::new(vec![filled_filter(3, 1, 1, 1.0)], Activation::relu()).unwrap();
    let pool = PoolLayer::max(5, 1).unwrap();
    assert!(Network::<f32>::new(vec![conv.into(), pool.into()], TensorShape::new(6, 1)).is_err());
}

#[test]
fn test_empty_network_copies_input() {
    let net = Network::<f32>::new(Vec::new(), TensorShape::new(3, 2)).unwrap();
    let mut input = ones_tensor(3, 2);
    let out = net.forward(&input, &ForwardContext::heap()).unwrap();
    input.fill(0.0);
    assert!(out.maps().iter().all(|m| m.iter().all(|v| v == 1.0)));
}

#[test]
fn test_network_conv_layer_mut() {
    let mut net = small_network();
    assert!(net.conv_layer_mut(1).is_none());
    let conv = net.conv_layer_mut(0).unwrap();
    conv.filter_mut(0).unwrap().channel_mut(0).unwrap().fill(2.0);
    let out = net
        .forward(&ones_tensor(6, 1), &ForwardContext::heap())
        .unwrap();
    assert_eq!(out.map(0).unwrap().get(0, 0), Some(18.0));
}

// =============================================================================
// Config Tests
// =============================================================================

const NETWORK_JSON: &str = r#"{
    "input_size": 8,
    "input_depth": 3,
    "layers": [
        { "type": "conv", "n_filters": 4, "filter_size": 3, "depth": 3,
          "activation": { "kind": "relu" } },
        { "type": "pool", "kind": "max", "filter_size": 2, "stride": 2 }
    ]
}"#;

#[test]
fn test_network_from_json_config() {
    let config: NetworkConfig = serde_json::from_str(NETWORK_JSON).unwrap();
    match &config.layers[0] {
        LayerConfig::Conv(conv) => {
            assert_eq!(conv.stride, 1);
            assert_eq!(conv.activation, Activation::relu());
        }
        other => panic!("expected conv layer, got {other:?}"),
    }

    let net = Network::<f32>::from_config(&config).unwrap();
    assert_eq!(net.input_shape(), TensorShape::new(8, 3));
    assert_eq!(net.output_shape().unwrap(), TensorShape::new(3, 4));

    let out = net
        .forward(&ones_tensor(8, 3), &ForwardContext::heap())
        .unwrap();
    // zero weights
    assert!(out.maps().iter().all(|m| m.iter().all(|v| v == 0.0)));
}

#[test]
fn test_config_serde_roundtrip() {
    let config: NetworkConfig = serde_json::from_str(NETWORK_JSON).unwrap();
    let json = serde_json::to_string(&config).unwrap();
    let back: NetworkConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_config_defaults() {
    let conv: ConvLayerConfig =
        serde_json::from_str(r#"{ "n_filters": 1, "filter_size": 2, "depth": 1 }"#).unwrap();
    assert_eq!(conv.activation, Activation::Sigmoid);
    let pool: PoolLayerConfig = serde_json::from_str(r#"{ "filter_size": 2 }"#).unwrap();
    assert_eq!(pool.kind, PoolKind::Max);
    assert_eq!(pool.stride, 1);
}

// =============================================================================
// Allocator Tests
// =============================================================================

#[test]
fn test_heap_allocator() {
    let buffer = HeapAllocator.allocate::<i64>(6).unwrap();
    assert_eq!(buffer.len(), 6);
    assert!(buffer.iter().all(|&v| v == 0));
}

#[test]
fn test_arena_matrix_allocation_and_reset() {
    let mut arena = ArenaAllocator::with_capacity(256);
    {
        let m = Matrix::<f32>::zeros_in(4, 4, &arena).unwrap();
        assert!(m.owns_data());
        assert!(m.iter().all(|v| v == 0.0));
        assert_eq!(arena.used(), 64);
        assert_eq!(arena.remaining(), 192);
    }
    arena.reset();
    assert_eq!(arena.used(), 0);
    assert_eq!(arena.capacity(), 256);
}

#[test]
fn test_arena_exhaustion() {
    let arena = ArenaAllocator::with_capacity(64);
    let err = Matrix::<f64>::zeros_in(4, 4, &arena).unwrap_err();
    assert_eq!(
        err,
        CnnError::AllocationFailure {
            requested: 128,
            remaining: 64
        }
    );
    assert_eq!(arena.used(), 0);
    arena.release_all();
}

#[test]
fn test_network_forward_in_arena() {
    let net = small_network();
    let input = ones_tensor(6, 1);
    let mut arena = ArenaAllocator::with_capacity(1024);
    {
        let ctx = ForwardContext::new(&arena);
        let out = net.forward(&input, &ctx).unwrap();
        assert!(out.map(0).unwrap().iter().all(|v| v == 9.0));
    }
    // 4x4 conv map + 2x2 pooled map, f32
    assert_eq!(arena.used(), 80);
    arena.reset();
    assert_eq!(arena.remaining(), 1024);
}

// =============================================================================
// Diagnostics Tests
// =============================================================================

#[test]
fn test_sink_receives_error_report() {
    let sink = RecordingSink::default();
    let ctx = ForwardContext::heap().with_sink(&sink);
    let conv = ConvLayer::new(vec![filled_filter(2, 2, 1, 1.0)], Activation::relu()).unwrap();
    assert!(conv.activation_maps(&ones_tensor(4, 1), &ctx).is_err());

    let reports = sink.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, Subsystem::Convolution);
    assert_eq!(reports[0].1, Severity::Error);
    assert!(reports[0].2.contains("dimension mismatch"));
}

#[test]
fn test_sink_receives_arena_exhaustion() {
    let sink = RecordingSink::default();
    let arena = ArenaAllocator::with_capacity(8);
    let ctx = ForwardContext::new(&arena).with_sink(&sink);
    let err = PoolLayer::max(2, 2)
        .unwrap()
        .downsample(&ones_tensor(4, 1), &ctx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AllocationFailure);
    assert_eq!(sink.reports.borrow()[0].0, Subsystem::Pooling);
}

#[test]
fn test_successful_pass_reports_nothing() {
    let sink = RecordingSink::default();
    let ctx = ForwardContext::heap().with_sink(&sink);
    small_network().forward(&ones_tensor(6, 1), &ctx).unwrap();
    assert!(sink.reports.borrow().is_empty());
}

#[test]
fn test_tracing_sink() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
    let ctx = ForwardContext::heap().with_sink(&TracingSink);
    let err = small_network()
        .forward(&ones_tensor(7, 1), &ctx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DimMismatch);
    TracingSink.report(Subsystem::Matrix, Severity::Critical, "exercised");
}

#[test]
fn test_error_kind_mapping() {
    assert_eq!(CnnError::InvalidStride.kind(), ErrorKind::InvalidShape);
    assert_eq!(
        CnnError::DtypeMismatch {
            left: DType::I32,
            right: DType::I64
        }
        .kind(),
        ErrorKind::DimMismatch
    );
    assert_eq!(Subsystem::Pooling.to_string(), "pooling");
    assert!(DType::F64.is_float());
    assert_eq!(DType::I32.size_bytes(), 4);
}
