//! Recurrent preprocessor over coordinate sequences.

use burn::module::Module;
use burn::nn::{Lstm, LstmConfig};
use burn::prelude::*;

use crate::config::RecurrentEncoderConfig;
use crate::error::{AnpError, Result};
use crate::params::{NamedParameters, ParameterMap};

/// Stacked LSTM run over the point axis of x coordinates.
///
/// Every pass starts from a zero state, so identical inputs give identical
/// outputs. Unlike the rest of the model this is order-dependent.
#[derive(Module, Debug)]
pub struct RecurrentEncoder<B: Backend> {
    layers: Vec<Lstm<B>>,
    #[module(skip)]
    input_dim: usize,
}

impl<B: Backend> RecurrentEncoder<B> {
    /// Create a new recurrent encoder from configuration.
    pub fn new(config: &RecurrentEncoderConfig, device: &B::Device) -> Result<Self> {
        if config.num_layers == 0 || config.input_dim == 0 || config.hidden_dim == 0 {
            return Err(AnpError::config(
                "recurrent encoder needs positive widths and at least one layer",
            ));
        }

        let layers = (0..config.num_layers)
            .map(|i| {
                let d_input = if i == 0 {
                    config.input_dim
                } else {
                    config.hidden_dim
                };
                LstmConfig::new(d_input, config.hidden_dim, true).init(device)
            })
            .collect();

        Ok(Self {
            layers,
            input_dim: config.input_dim,
        })
    }

    /// Forward pass.
    ///
    /// Input: [batch, n_points, input_dim]
    /// Output: [batch, n_points, hidden_dim]
    pub fn forward(&self, x: Tensor<B, 3>) -> Result<Tensor<B, 3>> {
        let [batch, n_points, dim] = x.dims();
        if dim != self.input_dim {
            return Err(AnpError::ShapeMismatch {
                name: "x".into(),
                expected: vec![batch, n_points, self.input_dim],
                got: x.dims().to_vec(),
            });
        }

        let mut out = x;
        for layer in &self.layers {
            let (hidden, _state) = layer.forward(out, None);
            out = hidden;
        }
        Ok(out)
    }
}

impl<B: Backend> NamedParameters for RecurrentEncoder<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        for (i, layer) in self.layers.iter().enumerate() {
            layer.collect_parameters(&format!("{prefix}.layers.{i}"), out)?;
        }
        Ok(())
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.load_parameters(&format!("{prefix}.layers.{i}"), params)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_recurrent_shapes() {
        let device = Default::default();
        let config = RecurrentEncoderConfig::new(2, 8);
        let rnn = RecurrentEncoder::<TestBackend>::new(&config, &device).unwrap();

        let out = rnn.forward(Tensor::zeros([3, 6, 2], &device)).unwrap();
        assert_eq!(out.dims(), [3, 6, 8]);
    }

    #[test]
    fn test_recurrent_is_deterministic() {
        let device = Default::default();
        let rnn = RecurrentEncoder::<TestBackend>::new(&RecurrentEncoderConfig::new(2, 4), &device)
            .unwrap();

        let x = Tensor::<TestBackend, 3>::random(
            [2, 5, 2],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let a = rnn.forward(x.clone()).unwrap();
        let b = rnn.forward(x).unwrap();

        let diff: f32 = (a - b).abs().max().into_scalar().elem();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_recurrent_parameters_cover_gates() {
        let device = Default::default();
        let rnn = RecurrentEncoder::<TestBackend>::new(
            &RecurrentEncoderConfig::new(2, 4).with_num_layers(1),
            &device,
        )
        .unwrap();

        let mut params = ParameterMap::new();
        rnn.collect_parameters("rnn", &mut params).unwrap();
        // 4 gates x 2 transforms
        let weights = params.keys().filter(|k| k.ends_with(".weight")).count();
        assert_eq!(weights, 8);
        assert!(params.contains_key("rnn.layers.0.forget_gate.input_transform.weight"));
    }
}
