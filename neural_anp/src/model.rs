//! The attentive neural process.

use burn::module::Module;
use burn::prelude::*;

use crate::config::AnpConfig;
use crate::distribution::DiagGaussian;
use crate::error::{AnpError, Result};
use crate::nn::{Decoder, DeterministicEncoder, LatentEncoder, RecurrentEncoder};
use crate::params::{NamedParameters, ParameterMap};

/// Result of a forward pass.
///
/// The training-only fields are `Some` exactly when `target_y` was given.
#[derive(Debug, Clone)]
pub struct AnpOutput<B: Backend> {
    /// Predictive mean: [batch, n_target, y_dim].
    pub mean: Tensor<B, 3>,
    /// Predictive standard deviation: [batch, n_target, y_dim].
    pub stddev: Tensor<B, 3>,
    /// Log-likelihood per target point, averaged over y_dim: [batch, n_target].
    pub log_p: Option<Tensor<B, 2>>,
    /// KL(posterior ‖ prior) averaged over latent_dim: [batch, 1].
    pub kl: Option<Tensor<B, 2>>,
    /// Negative ELBO: -mean(log_p - kl).
    pub loss: Option<Tensor<B, 1>>,
}

impl<B: Backend> AnpOutput<B> {
    /// The loss as a scalar, if computed.
    pub fn loss_value(&self) -> Option<f32> {
        self.loss.clone().map(|loss| loss.into_scalar().elem())
    }

    /// Mean log-likelihood as a scalar, if computed.
    pub fn log_p_value(&self) -> Option<f32> {
        self.log_p.clone().map(|log_p| log_p.mean().into_scalar().elem())
    }

    /// Mean KL as a scalar, if computed.
    pub fn kl_value(&self) -> Option<f32> {
        self.kl.clone().map(|kl| kl.mean().into_scalar().elem())
    }
}

/// Attentive neural process.
///
/// Owns a latent encoder, a decoder and, when enabled, a deterministic
/// encoder and a recurrent coordinate preprocessor.
#[derive(Module, Debug)]
pub struct AnpModel<B: Backend> {
    recurrent: Option<RecurrentEncoder<B>>,
    latent_encoder: LatentEncoder<B>,
    deterministic_encoder: Option<DeterministicEncoder<B>>,
    decoder: Decoder<B>,
    #[module(skip)]
    x_dim: usize,
    #[module(skip)]
    y_dim: usize,
}

impl<B: Backend> AnpModel<B> {
    /// Build a model from a validated configuration.
    pub fn new(config: &AnpConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let recurrent = if config.use_rnn {
            Some(RecurrentEncoder::new(&config.recurrent_encoder(), device)?)
        } else {
            None
        };
        let latent_encoder = LatentEncoder::new(&config.latent_encoder(), device)?;
        let deterministic_encoder = if config.use_deter_path {
            Some(DeterministicEncoder::new(&config.deterministic_encoder(), device)?)
        } else {
            None
        };
        let decoder = Decoder::new(&config.decoder(), device)?;

        log::debug!(
            "Built ANP: x_dim={} y_dim={} latent_dim={} rnn={} deterministic={} cross={}",
            config.x_dim,
            config.y_dim,
            config.latent_dim,
            config.use_rnn,
            config.use_deter_path,
            config.cross_attention_type,
        );

        Ok(Self {
            recurrent,
            latent_encoder,
            deterministic_encoder,
            decoder,
            x_dim: config.x_dim,
            y_dim: config.y_dim,
        })
    }

    /// Whether the deterministic path is in use.
    pub fn has_deterministic_path(&self) -> bool {
        self.deterministic_encoder.is_some()
    }

    fn check_input(&self, name: &str, tensor: &Tensor<B, 3>, batch: usize, dim: usize) -> Result<()> {
        let [got_batch, n_points, got_dim] = tensor.dims();
        if got_batch != batch || got_dim != dim {
            return Err(AnpError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![batch, n_points, dim],
                got: tensor.dims().to_vec(),
            });
        }
        if n_points == 0 {
            return Err(AnpError::EmptyPointSet {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_inputs(
        &self,
        context_x: &Tensor<B, 3>,
        context_y: &Tensor<B, 3>,
        target_x: &Tensor<B, 3>,
        target_y: Option<&Tensor<B, 3>>,
    ) -> Result<()> {
        let [batch, n_context, _] = context_x.dims();
        let n_target = target_x.dims()[1];

        self.check_input("context_x", context_x, batch, self.x_dim)?;
        self.check_input("context_y", context_y, batch, self.y_dim)?;
        if context_y.dims()[1] != n_context {
            return Err(AnpError::ShapeMismatch {
                name: "context_y".into(),
                expected: vec![batch, n_context, self.y_dim],
                got: context_y.dims().to_vec(),
            });
        }
        self.check_input("target_x", target_x, batch, self.x_dim)?;
        if let Some(target_y) = target_y {
            if target_y.dims() != [batch, n_target, self.y_dim] {
                return Err(AnpError::ShapeMismatch {
                    name: "target_y".into(),
                    expected: vec![batch, n_target, self.y_dim],
                    got: target_y.dims().to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Prior q(z | context) over the latent.
    pub fn prior(&self, context_x: Tensor<B, 3>, context_y: Tensor<B, 3>) -> Result<DiagGaussian<B, 2>> {
        let context_x = self.preprocess(context_x)?;
        self.latent_encoder.forward(context_x, context_y)
    }

    fn preprocess(&self, x: Tensor<B, 3>) -> Result<Tensor<B, 3>> {
        match &self.recurrent {
            Some(rnn) => rnn.forward(x),
            None => Ok(x),
        }
    }

    /// Forward pass.
    ///
    /// Inputs:
    /// - context_x: [batch, n_context, x_dim]
    /// - context_y: [batch, n_context, y_dim]
    /// - target_x: [batch, n_target, x_dim]
    /// - target_y: [batch, n_target, y_dim] during training, `None` at inference
    ///
    /// With `target_y` the latent is the posterior mean (computed from the
    /// targets, which by convention include the context); without it, the
    /// prior mean. No stochastic draw is taken in either case.
    pub fn forward(
        &self,
        context_x: Tensor<B, 3>,
        context_y: Tensor<B, 3>,
        target_x: Tensor<B, 3>,
        target_y: Option<Tensor<B, 3>>,
    ) -> Result<AnpOutput<B>> {
        self.check_inputs(&context_x, &context_y, &target_x, target_y.as_ref())?;
        let [batch, n_target, _] = target_x.dims();

        let context_x = self.preprocess(context_x)?;
        let target_x = self.preprocess(target_x)?;

        let prior = self
            .latent_encoder
            .forward(context_x.clone(), context_y.clone())?;

        let posterior = match &target_y {
            Some(target_y) => Some(
                self.latent_encoder
                    .forward(target_x.clone(), target_y.clone())?,
            ),
            None => None,
        };

        let z = posterior.as_ref().unwrap_or(&prior).mean();
        let latent_dim = z.dims()[1];
        let z = z
            .reshape([batch, 1, latent_dim])
            .repeat_dim(1, n_target);

        let r = match &self.deterministic_encoder {
            Some(encoder) => Some(encoder.forward(context_x, context_y, target_x.clone())?),
            None => None,
        };

        let predictive = self.decoder.forward(r, z, target_x)?;

        let (log_p, kl, loss) = match (target_y, posterior) {
            (Some(target_y), Some(posterior)) => {
                let log_p = predictive
                    .log_prob(target_y)
                    .mean_dim(2)
                    .reshape([batch, n_target]);
                let kl = posterior.kl_divergence(&prior).mean_dim(1);
                let loss = (log_p.clone() - kl.clone().repeat_dim(1, n_target))
                    .mean()
                    .neg();
                (Some(log_p), Some(kl), Some(loss))
            }
            _ => (None, None, None),
        };

        Ok(AnpOutput {
            mean: predictive.mean(),
            stddev: predictive.stddev(),
            log_p,
            kl,
            loss,
        })
    }

    /// Flat mapping of every learnable parameter by name.
    pub fn parameters(&self) -> Result<ParameterMap> {
        let mut params = ParameterMap::new();
        self.collect_parameters("anp", &mut params)?;
        Ok(params)
    }

    /// Restore parameters previously produced by [`AnpModel::parameters`].
    ///
    /// Every expected name must be present with a matching shape.
    pub fn load_parameters(&mut self, params: &ParameterMap) -> Result<()> {
        NamedParameters::load_parameters(self, "anp", params)
    }
}

impl<B: Backend> NamedParameters for AnpModel<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        if let Some(rnn) = &self.recurrent {
            rnn.collect_parameters(&format!("{prefix}.recurrent"), out)?;
        }
        self.latent_encoder
            .collect_parameters(&format!("{prefix}.latent_encoder"), out)?;
        if let Some(encoder) = &self.deterministic_encoder {
            encoder.collect_parameters(&format!("{prefix}.deterministic_encoder"), out)?;
        }
        self.decoder
            .collect_parameters(&format!("{prefix}.decoder"), out)
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        if let Some(rnn) = &mut self.recurrent {
            rnn.load_parameters(&format!("{prefix}.recurrent"), params)?;
        }
        self.latent_encoder
            .load_parameters(&format!("{prefix}.latent_encoder"), params)?;
        if let Some(encoder) = &mut self.deterministic_encoder {
            encoder.load_parameters(&format!("{prefix}.deterministic_encoder"), params)?;
        }
        self.decoder
            .load_parameters(&format!("{prefix}.decoder"), params)
    }
}
