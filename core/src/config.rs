//! Serializable layer and network descriptions.
//!
//! Configs carry shapes and hyper-parameters only. Weights are filled in by
//! the caller after construction.

use serde::{Deserialize, Serialize};

use crate::layers::{Activation, PoolKind};
use crate::tensor::TensorShape;

fn default_stride() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvLayerConfig {
    pub n_filters: usize,
    /// Kernel edge length.
    pub filter_size: usize,
    /// Input channel count.
    pub depth: usize,
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default)]
    pub activation: Activation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLayerConfig {
    #[serde(default)]
    pub kind: PoolKind,
    pub filter_size: usize,
    #[serde(default = "default_stride")]
    pub stride: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerConfig {
    Conv(ConvLayerConfig),
    Pool(PoolLayerConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_size: usize,
    pub input_depth: usize,
    pub layers: Vec<LayerConfig>,
}

impl NetworkConfig {
    pub fn input_shape(&self) -> TensorShape {
        TensorShape::new(self.input_size, self.input_depth)
    }
}
