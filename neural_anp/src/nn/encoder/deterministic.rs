//! Deterministic encoder: per-target representation via cross-attention.

use burn::module::Module;
use burn::prelude::*;

use crate::config::DeterministicEncoderConfig;
use crate::error::{AnpError, Result};
use crate::nn::attention::Attention;
use crate::nn::mlp::{Mlp, MlpConfig};
use crate::params::{NamedParameters, ParameterMap};

use super::check_pairs;

/// Encoder producing one representation per target point.
///
/// Architecture:
/// 1. Per-point MLP over concatenated context (x, y)
/// 2. Optional self-attention among context points
/// 3. Cross-attention: queries = target x, keys = context x, values = step 2
#[derive(Module, Debug)]
pub struct DeterministicEncoder<B: Backend> {
    mlp: Mlp<B>,
    self_attention: Option<Attention<B>>,
    cross_attention: Attention<B>,
    #[module(skip)]
    x_dim: usize,
    #[module(skip)]
    y_dim: usize,
}

impl<B: Backend> DeterministicEncoder<B> {
    /// Create a new deterministic encoder from configuration.
    pub fn new(config: &DeterministicEncoderConfig, device: &B::Device) -> Result<Self> {
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
        let cross_attention = Attention::new(&config.cross_attention(), device)?;

        Ok(Self {
            mlp,
            self_attention,
            cross_attention,
            x_dim: config.x_dim,
            y_dim: config.y_dim,
        })
    }

    /// Forward pass.
    ///
    /// Inputs:
    /// - context_x: [batch, n_context, x_dim]
    /// - context_y: [batch, n_context, y_dim]
    /// - target_x: [batch, n_target, x_dim]
    ///
    /// Output: [batch, n_target, latent_dim]
    pub fn forward(
        &self,
        context_x: Tensor<B, 3>,
        context_y: Tensor<B, 3>,
        target_x: Tensor<B, 3>,
    ) -> Result<Tensor<B, 3>> {
        check_pairs(&context_x, &context_y, self.x_dim, self.y_dim, "context")?;

        let [batch, _, _] = context_x.dims();
        let [target_batch, n_target, target_x_dim] = target_x.dims();
        if target_batch != batch || target_x_dim != self.x_dim {
            return Err(AnpError::ShapeMismatch {
                name: "target_x".into(),
                expected: vec![batch, n_target, self.x_dim],
                got: target_x.dims().to_vec(),
            });
        }

        let mut hidden = self
            .mlp
            .forward(Tensor::cat(vec![context_x.clone(), context_y], 2));

        if let Some(attention) = &self.self_attention {
            hidden = attention.forward(hidden.clone(), hidden.clone(), hidden)?;
        }

        self.cross_attention.forward(target_x, context_x, hidden)
    }
}

impl<B: Backend> NamedParameters for DeterministicEncoder<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        self.mlp.collect_parameters(&format!("{prefix}.mlp"), out)?;
        if let Some(attention) = &self.self_attention {
            attention.collect_parameters(&format!("{prefix}.self_attention"), out)?;
        }
        self.cross_attention
            .collect_parameters(&format!("{prefix}.cross_attention"), out)
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        self.mlp.load_parameters(&format!("{prefix}.mlp"), params)?;
        if let Some(attention) = &mut self.self_attention {
            attention.load_parameters(&format!("{prefix}.self_attention"), params)?;
        }
        self.cross_attention
            .load_parameters(&format!("{prefix}.cross_attention"), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn random(shape: [usize; 3]) -> Tensor<TestBackend, 3> {
        Tensor::random(shape, Distribution::Uniform(0.0, 1.0), &Default::default())
    }

    #[test]
    fn test_deterministic_encoder_shapes() {
        let device = Default::default();
        for cross in ["uniform", "laplace", "dot", "multihead"] {
            let config = DeterministicEncoderConfig::new(2, 1, vec![16, 16], 8)
                .with_cross_attention_type(cross.into())
                .with_num_heads(2);
            let encoder = DeterministicEncoder::<TestBackend>::new(&config, &device).unwrap();

            let r = encoder
                .forward(random([2, 5, 2]), random([2, 5, 1]), random([2, 10, 2]))
                .unwrap();
            assert_eq!(r.dims(), [2, 10, 8], "cross attention {cross}");
        }
    }

    #[test]
    fn test_deterministic_with_self_attention() {
        let device = Default::default();
        let config = DeterministicEncoderConfig::new(2, 1, vec![16], 8)
            .with_use_self_attention(true)
            .with_self_attention_type("laplace".into())
            .with_cross_attention_type("dot".into());
        let encoder = DeterministicEncoder::<TestBackend>::new(&config, &device).unwrap();

        let r = encoder
            .forward(random([3, 4, 2]), random([3, 4, 1]), random([3, 7, 2]))
            .unwrap();
        assert_eq!(r.dims(), [3, 7, 8]);
    }

    #[test]
    fn test_target_batch_mismatch() {
        let device = Default::default();
        let config = DeterministicEncoderConfig::new(2, 1, vec![16], 8)
            .with_cross_attention_type("dot".into());
        let encoder = DeterministicEncoder::<TestBackend>::new(&config, &device).unwrap();

        let result = encoder.forward(random([2, 5, 2]), random([2, 5, 1]), random([3, 10, 2]));
        assert!(matches!(result, Err(AnpError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_unknown_cross_attention() {
        let device = Default::default();
        let config = DeterministicEncoderConfig::new(2, 1, vec![16], 8)
            .with_cross_attention_type("bilinear".into());
        let result = DeterministicEncoder::<TestBackend>::new(&config, &device);
        assert!(matches!(result, Err(AnpError::InvalidConfig { .. })));
    }
}
