//! Latent encoder: point set to a diagonal Gaussian over the global latent.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

use crate::config::LatentEncoderConfig;
use crate::distribution::DiagGaussian;
use crate::error::Result;
use crate::nn::attention::Attention;
use crate::nn::mlp::{Mlp, MlpConfig};
use crate::params::{NamedParameters, ParameterMap};

use super::check_pairs;

/// Lower bound of the latent standard deviation.
pub const MIN_LATENT_STD: f64 = 0.1;

/// Encoder producing q(z | x, y).
///
/// Uses mean-pooling over points, so the result does not depend on the
/// order of the points within an instance.
#[derive(Module, Debug)]
pub struct LatentEncoder<B: Backend> {
    /// Per-point MLP over concatenated (x, y).
    mlp: Mlp<B>,
    /// Optional self-attention over per-point features.
    self_attention: Option<Attention<B>>,
    /// Shared layer before the mean/std heads.
    penultimate: Linear<B>,
    /// Mean head.
    mean_head: Linear<B>,
    /// Standard-deviation head (pre-activation).
    std_head: Linear<B>,
    activation: Relu,
    #[module(skip)]
    x_dim: usize,
    #[module(skip)]
    y_dim: usize,
}

impl<B: Backend> LatentEncoder<B> {
    /// Create a new latent encoder from configuration.
    pub fn new(config: &LatentEncoderConfig, device: &B::Device) -> Result<Self> {
        let mlp = MlpConfig::new(
            config.x_dim + config.y_dim,
            config.latent_dim,
            config.hidden_dims.clone(),
        )
        .init(device)?;

        let self_attention = if config.use_self_attention {
            Some(Attention::new(&config.self_attention(), device)?)
        } else {
            None
        };

        let latent = config.latent_dim;
        Ok(Self {
            mlp,
            self_attention,
            penultimate: LinearConfig::new(latent, latent).init(device),
            mean_head: LinearConfig::new(latent, latent).init(device),
            std_head: LinearConfig::new(latent, latent).init(device),
            activation: Relu::new(),
            x_dim: config.x_dim,
            y_dim: config.y_dim,
        })
    }

    /// Forward pass.
    ///
    /// Inputs: x [batch, n_points, x_dim], y [batch, n_points, y_dim]
    /// Output: distribution with mean/std of shape [batch, latent_dim],
    /// std in (0.1, 1.0).
    pub fn forward(&self, x: Tensor<B, 3>, y: Tensor<B, 3>) -> Result<DiagGaussian<B, 2>> {
        check_pairs(&x, &y, self.x_dim, self.y_dim, "latent")?;

        let mut hidden = self.mlp.forward(Tensor::cat(vec![x, y], 2));

        if let Some(attention) = &self.self_attention {
            hidden = attention.forward(hidden.clone(), hidden.clone(), hidden)?;
        }

        let [batch, _, latent_dim] = hidden.dims();
        let pooled = hidden.mean_dim(1).reshape([batch, latent_dim]);
        let pooled = self.activation.forward(self.penultimate.forward(pooled));

        let mean = self.mean_head.forward(pooled.clone());
        let std = sigmoid(self.std_head.forward(pooled))
            .mul_scalar(1.0 - MIN_LATENT_STD)
            .add_scalar(MIN_LATENT_STD);

        DiagGaussian::new(mean, std)
    }
}

impl<B: Backend> NamedParameters for LatentEncoder<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        self.mlp.collect_parameters(&format!("{prefix}.mlp"), out)?;
        if let Some(attention) = &self.self_attention {
            attention.collect_parameters(&format!("{prefix}.self_attention"), out)?;
        }
        self.penultimate
            .collect_parameters(&format!("{prefix}.penultimate"), out)?;
        self.mean_head
            .collect_parameters(&format!("{prefix}.mean_head"), out)?;
        self.std_head
            .collect_parameters(&format!("{prefix}.std_head"), out)
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        self.mlp.load_parameters(&format!("{prefix}.mlp"), params)?;
        if let Some(attention) = &mut self.self_attention {
            attention.load_parameters(&format!("{prefix}.self_attention"), params)?;
        }
        self.penultimate
            .load_parameters(&format!("{prefix}.penultimate"), params)?;
        self.mean_head
            .load_parameters(&format!("{prefix}.mean_head"), params)?;
        self.std_head
            .load_parameters(&format!("{prefix}.std_head"), params)
    }
}
