//! Element-wise activation functions: leaky ReLU and Sigmoid.
//!
//! Activations are not layers of their own. A convolution layer applies
//! its activation to the stacked output maps in place; pooling applies none.

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::math::DEFAULT_NEGATIVE_SLOPE;

fn default_negative_slope() -> f64 {
    DEFAULT_NEGATIVE_SLOPE
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Activation {
    /// Leaky ReLU: `x` if `x > 0`, else `x * negative_slope`.
    Relu {
        #[serde(default = "default_negative_slope")]
        negative_slope: f64,
    },
    /// Logistic function `1 / (1 + e^-x)`.
    #[default]
    Sigmoid,
}

impl Activation {
    /// Leaky ReLU with the default slope of 0.1.
    pub const fn relu() -> Self {
        Activation::Relu {
            negative_slope: DEFAULT_NEGATIVE_SLOPE,
        }
    }

    pub const fn leaky_relu(negative_slope: f64) -> Self {
        Activation::Relu { negative_slope }
    }

    #[inline]
    pub fn apply<T: Element>(self, x: T) -> T {
        match self {
            Activation::Relu { negative_slope } => x.leaky_relu(negative_slope),
            Activation::Sigmoid => x.sigmoid(),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Activation::Relu { .. } => "ReLU",
            Activation::Sigmoid => "Sigmoid",
        }
    }
}
