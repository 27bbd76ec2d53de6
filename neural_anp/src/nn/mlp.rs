//! MLP (Multi-Layer Perceptron) building blocks.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

use crate::error::AnpError;
use crate::params::{NamedParameters, ParameterMap};

/// Configuration for an MLP layer.
#[derive(Config, Debug)]
pub struct MlpConfig {
    /// Input dimension.
    pub input_dim: usize,
    /// Output dimension.
    pub output_dim: usize,
    /// Hidden layer dimensions (must not be empty).
    pub hidden_dims: Vec<usize>,
    /// Whether to apply activation to the final layer.
    #[config(default = false)]
    pub final_activation: bool,
}

impl MlpConfig {
    /// Initialize the MLP.
    ///
    /// Fails when `hidden_dims` is empty or any width is zero.
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<Mlp<B>> {
        if self.hidden_dims.is_empty() {
            return Err(AnpError::config("MLP hidden_dims must not be empty"));
        }
        if self.input_dim == 0 || self.output_dim == 0 || self.hidden_dims.contains(&0) {
            return Err(AnpError::config("MLP layer widths must be positive"));
        }

        let mut layers = Vec::with_capacity(self.hidden_dims.len());
        let mut in_dim = self.input_dim;

        for &out_dim in &self.hidden_dims {
            layers.push(LinearConfig::new(in_dim, out_dim).init(device));
            in_dim = out_dim;
        }

        let output = LinearConfig::new(in_dim, self.output_dim).init(device);

        Ok(Mlp {
            layers,
            output,
            activation: Relu::new(),
            final_activation: self.final_activation,
        })
    }
}

/// Multi-Layer Perceptron module.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    /// Hidden layers.
    layers: Vec<Linear<B>>,
    /// Output layer.
    output: Linear<B>,
    /// Activation function.
    activation: Relu,
    /// Whether to apply activation to final layer.
    #[module(skip)]
    final_activation: bool,
}

impl<B: Backend> Mlp<B> {
    /// Forward pass over the last axis.
    ///
    /// Input shape: [..., input_dim]
    /// Output shape: [..., output_dim]
    pub fn forward<const D: usize>(&self, mut x: Tensor<B, D>) -> Tensor<B, D> {
        for layer in &self.layers {
            x = layer.forward(x);
            x = self.activation.forward(x);
        }

        x = self.output.forward(x);

        if self.final_activation {
            x = self.activation.forward(x);
        }

        x
    }

    /// Output width.
    pub fn output_dim(&self) -> usize {
        self.output.weight.dims()[1]
    }
}

impl<B: Backend> NamedParameters for Mlp<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> crate::error::Result<()> {
        for (i, layer) in self.layers.iter().enumerate() {
            layer.collect_parameters(&format!("{prefix}.layers.{i}"), out)?;
        }
        self.output
            .collect_parameters(&format!("{prefix}.output"), out)
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> crate::error::Result<()> {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.load_parameters(&format!("{prefix}.layers.{i}"), params)?;
        }
        self.output
            .load_parameters(&format!("{prefix}.output"), params)
    }
}
