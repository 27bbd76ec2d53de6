//! Decoder to a per-target Gaussian predictive distribution.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::softplus;

use crate::config::DecoderConfig;
use crate::distribution::DiagGaussian;
use crate::error::{AnpError, Result};
use crate::nn::mlp::{Mlp, MlpConfig};
use crate::params::{NamedParameters, ParameterMap};

/// Lower bound of the predictive standard deviation.
pub const MIN_PREDICTIVE_STD: f64 = 0.1;

/// Upper bound of the predictive standard deviation.
pub const MAX_PREDICTIVE_STD: f64 = 1.0;

/// Decoder mapping (target x, latent, deterministic representation) to p(y | x).
///
/// Architecture:
/// 1. Concatenate target x with the latent sample and, when present, the
///    deterministic representation
/// 2. MLP to a hidden vector per target point
/// 3. Mean head and std head; std = min(0.1 + 0.9 * softplus(h), 1.0)
///
/// The clamp has zero derivative once `0.1 + 0.9 * softplus(h)` exceeds 1.0,
/// so saturated entries send no gradient back into the std head.
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    mlp: Mlp<B>,
    mean_head: Linear<B>,
    std_head: Linear<B>,
    #[module(skip)]
    x_dim: usize,
    #[module(skip)]
    latent_dim: usize,
    #[module(skip)]
    use_deterministic_path: bool,
}

impl<B: Backend> Decoder<B> {
    /// Create a new decoder from configuration.
    pub fn new(config: &DecoderConfig, device: &B::Device) -> Result<Self> {
        let Some((&last, hidden)) = config.hidden_dims.split_last() else {
            return Err(AnpError::config("decoder hidden_dims must not be empty"));
        };

        // A single hidden width still needs one hidden layer inside the MLP.
        let hidden = if hidden.is_empty() {
            vec![last]
        } else {
            hidden.to_vec()
        };
        let mlp = MlpConfig::new(config.input_dim(), last, hidden)
            .with_final_activation(true)
            .init(device)?;

        Ok(Self {
            mlp,
            mean_head: LinearConfig::new(last, config.y_dim).init(device),
            std_head: LinearConfig::new(last, config.y_dim).init(device),
            x_dim: config.x_dim,
            latent_dim: config.latent_dim,
            use_deterministic_path: config.use_deterministic_path,
        })
    }

    fn check(&self, name: &str, tensor: &Tensor<B, 3>, batch: usize, n_target: usize, dim: usize) -> Result<()> {
        if tensor.dims() != [batch, n_target, dim] {
            return Err(AnpError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![batch, n_target, dim],
                got: tensor.dims().to_vec(),
            });
        }
        Ok(())
    }

    /// Forward pass.
    ///
    /// Inputs:
    /// - deterministic: [batch, n_target, latent_dim], or `None` when the
    ///   deterministic path is disabled
    /// - latent: [batch, n_target, latent_dim], already repeated per target
    /// - target_x: [batch, n_target, x_dim]
    ///
    /// Output: distribution with mean/std of shape [batch, n_target, y_dim]
    pub fn forward(
        &self,
        deterministic: Option<Tensor<B, 3>>,
        latent: Tensor<B, 3>,
        target_x: Tensor<B, 3>,
    ) -> Result<DiagGaussian<B, 3>> {
        let [batch, n_target, _] = target_x.dims();
        self.check("target_x", &target_x, batch, n_target, self.x_dim)?;
        self.check("latent", &latent, batch, n_target, self.latent_dim)?;

        let mut inputs = vec![target_x, latent];
        match (deterministic, self.use_deterministic_path) {
            (Some(r), true) => {
                self.check("deterministic", &r, batch, n_target, self.latent_dim)?;
                inputs.push(r);
            }
            (None, false) => {}
            (Some(_), false) => {
                return Err(AnpError::config(
                    "decoder was built without a deterministic path but received one",
                ));
            }
            (None, true) => {
                return Err(AnpError::config(
                    "decoder expects a deterministic representation",
                ));
            }
        }

        let hidden = self.mlp.forward(Tensor::cat(inputs, 2));

        let mean = self.mean_head.forward(hidden.clone());
        let std = bounded_std(self.std_head.forward(hidden));

        DiagGaussian::new(mean, std)
    }
}

/// Map raw std-head activations into `[MIN_PREDICTIVE_STD, MAX_PREDICTIVE_STD]`.
///
/// Gradient is zero wherever the upper clamp is active.
pub(crate) fn bounded_std<B: Backend, const D: usize>(raw: Tensor<B, D>) -> Tensor<B, D> {
    softplus(raw, 1.0)
        .mul_scalar(1.0 - MIN_PREDICTIVE_STD)
        .add_scalar(MIN_PREDICTIVE_STD)
        .clamp_max(MAX_PREDICTIVE_STD)
}

impl<B: Backend> NamedParameters for Decoder<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        self.mlp.collect_parameters(&format!("{prefix}.mlp"), out)?;
        self.mean_head
            .collect_parameters(&format!("{prefix}.mean_head"), out)?;
        self.std_head
            .collect_parameters(&format!("{prefix}.std_head"), out)
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        self.mlp.load_parameters(&format!("{prefix}.mlp"), params)?;
        self.mean_head
            .load_parameters(&format!("{prefix}.mean_head"), params)?;
        self.std_head
            .load_parameters(&format!("{prefix}.std_head"), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn random(shape: [usize; 3], scale: f64) -> Tensor<TestBackend, 3> {
        Tensor::random(shape, Distribution::Uniform(-scale, scale), &Default::default())
    }

    #[test]
    fn test_decoder_forward() {
        let device = Default::default();
        let config = DecoderConfig::new(2, 1, vec![16, 16], 8);
        let decoder = Decoder::<TestBackend>::new(&config, &device).unwrap();

        let dist = decoder
            .forward(
                Some(random([2, 10, 8], 1.0)),
                random([2, 10, 8], 1.0),
                random([2, 10, 2], 1.0),
            )
            .unwrap();

        assert_eq!(dist.mean().dims(), [2, 10, 1]);
        assert_eq!(dist.stddev().dims(), [2, 10, 1]);
    }

    #[test]
    fn test_decoder_latent_only() {
        let device = Default::default();
        let config = DecoderConfig::new(2, 3, vec![16], 8).with_use_deterministic_path(false);
        let decoder = Decoder::<TestBackend>::new(&config, &device).unwrap();

        let dist = decoder
            .forward(None, random([2, 10, 8], 1.0), random([2, 10, 2], 1.0))
            .unwrap();
        assert_eq!(dist.mean().dims(), [2, 10, 3]);
    }

    #[test]
    fn test_decoder_requires_matching_path() {
        let device = Default::default();
        let config = DecoderConfig::new(2, 1, vec![16], 8);
        let decoder = Decoder::<TestBackend>::new(&config, &device).unwrap();

        let result = decoder.forward(None, random([2, 10, 8], 1.0), random([2, 10, 2], 1.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_predictive_std_bounds() {
        let device = Default::default();
        let config = DecoderConfig::new(2, 1, vec![16, 16], 8);
        let decoder = Decoder::<TestBackend>::new(&config, &device).unwrap();

        let std = decoder
            .forward(
                Some(random([4, 50, 8], 50.0)),
                random([4, 50, 8], 50.0),
                random([4, 50, 2], 50.0),
            )
            .unwrap()
            .stddev();

        let min: f32 = std.clone().min().into_scalar().elem();
        let max: f32 = std.max().into_scalar().elem();
        assert!(min >= 0.1 - 1e-6, "min std {min}");
        assert!(max <= 1.0, "max std {max}");
    }

    #[test]
    fn test_saturated_std_has_no_gradient() {
        use burn::backend::Autodiff;

        let device = Default::default();
        // 0.1 + 0.9 * softplus(10) is far above 1.0; the other two stay below it.
        let raw = Tensor::<Autodiff<TestBackend>, 1>::from_data([10.0f32, 0.0, -3.0], &device)
            .require_grad();
        let std = bounded_std(raw.clone());

        let values: Vec<f32> = std.clone().into_data().to_vec().unwrap();
        assert_eq!(values[0], 1.0);
        assert!(values[1] < 1.0 && values[2] >= 0.1);

        let grads = std.sum().backward();
        let grad: Vec<f32> = raw.grad(&grads).unwrap().into_data().to_vec().unwrap();
        assert_eq!(grad[0], 0.0);
        assert!(grad[1] > 0.0 && grad[2] > 0.0, "grad {grad:?}");
    }
}
