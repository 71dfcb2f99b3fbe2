//! Scalar kernels shared by the layers.
//!
//! Sliding-window geometry is computed in one place so convolution and
//! pooling agree on it: `R = (N - F) / stride + 1`, and a span that the
//! stride does not divide exactly is rejected rather than truncated.

use crate::error::{CnnError, CnnResult};

/// Default slope applied to non-positive inputs by the leaky ReLU.
pub const DEFAULT_NEGATIVE_SLOPE: f64 = 0.1;

/// Output edge length of a `window`-wide square window sliding over an
/// `input`-wide square map with the given `stride`.
///
/// Fails with `InvalidStride` for a zero stride, `InvalidShape` when the
/// window is empty or wider than the input, and `NonIntegralTiling` when
/// `(input - window) % stride != 0`.
pub fn window_output_size(input: usize, window: usize, stride: usize) -> CnnResult<usize> {
    if stride == 0 {
        return Err(CnnError::InvalidStride);
    }
    if window == 0 || window > input {
        return Err(CnnError::InvalidShape {
            rows: window,
            cols: window,
        });
    }
    let span = input - window;
    if span % stride != 0 {
        return Err(CnnError::NonIntegralTiling {
            input,
            window,
            stride,
        });
    }
    Ok(span / stride + 1)
}

/// Logistic function in `f64`.
///
/// Two branches so `exp` is only ever evaluated on a non-positive argument.
#[inline]
pub fn sigmoid_f64(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Logistic function in `f32`.
#[inline]
pub fn sigmoid_f32(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
