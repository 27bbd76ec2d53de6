//! Top-level model configuration.

use burn::config::Config;
use burn::prelude::*;

use super::{
    DecoderConfig, DeterministicEncoderConfig, LatentEncoderConfig, RecurrentEncoderConfig,
};
use crate::error::AnpError;
use crate::nn::AttentionKind;
use crate::model::AnpModel;

/// Construction configuration for an attentive neural process.
#[derive(Config, Debug)]
pub struct AnpConfig {
    /// Width of the input coordinates.
    pub x_dim: usize,

    /// Width of the outputs.
    pub y_dim: usize,

    /// Hidden layer widths shared by every MLP in the model.
    pub mlp_hidden_sizes: Vec<usize>,

    /// Width of the latent vector and of the deterministic representation.
    pub latent_dim: usize,

    /// Run the x coordinates through a recurrent preprocessor first.
    #[config(default = false)]
    pub use_rnn: bool,

    /// Use self-attention inside both encoders.
    #[config(default = false)]
    pub use_self_attention: bool,

    /// Use the deterministic (cross-attention) path.
    #[config(default = true)]
    pub use_deter_path: bool,

    /// Self-attention variant.
    #[config(default = "String::from(\"dot\")")]
    pub self_attention_type: String,

    /// Cross-attention variant of the deterministic path.
    #[config(default = "String::from(\"multihead\")")]
    pub cross_attention_type: String,

    /// Number of attention layers.
    #[config(default = 2)]
    pub attention_layers: usize,

    /// Dropout on attention weights.
    #[config(default = 0.0)]
    pub attention_dropout: f64,

    /// Number of heads for multihead attention.
    #[config(default = 8)]
    pub num_heads: usize,

    /// Number of stacked LSTM layers when `use_rnn` is set.
    #[config(default = 2)]
    pub rnn_layers: usize,
}

impl AnpConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.x_dim == 0 || self.y_dim == 0 {
            return Err(AnpError::config("x_dim and y_dim must be positive"));
        }
        if self.latent_dim == 0 {
            return Err(AnpError::config("latent_dim must be positive"));
        }
        if self.mlp_hidden_sizes.is_empty() {
            return Err(AnpError::config("mlp_hidden_sizes must not be empty"));
        }
        if self.mlp_hidden_sizes.contains(&0) {
            return Err(AnpError::config("hidden layer widths must be positive"));
        }
        if self.use_rnn && self.rnn_layers == 0 {
            return Err(AnpError::config("rnn_layers must be at least 1"));
        }

        // Both tags are checked even when the path using them is disabled.
        self.self_attention_type.parse::<AttentionKind>()?;
        self.cross_attention_type.parse::<AttentionKind>()?;

        let latent = self.latent_encoder();
        if latent.use_self_attention {
            latent.self_attention().validate()?;
        }
        if self.use_deter_path {
            let deterministic = self.deterministic_encoder();
            if deterministic.use_self_attention {
                deterministic.self_attention().validate()?;
            }
            deterministic.cross_attention().validate()?;
        }

        Ok(())
    }

    /// Width of the coordinates seen by the encoders and the decoder.
    pub fn encoded_x_dim(&self) -> usize {
        if self.use_rnn {
            self.latent_dim
        } else {
            self.x_dim
        }
    }

    /// Latent encoder configuration.
    pub fn latent_encoder(&self) -> LatentEncoderConfig {
        LatentEncoderConfig::new(
            self.encoded_x_dim(),
            self.y_dim,
            self.mlp_hidden_sizes.clone(),
            self.latent_dim,
        )
        .with_use_self_attention(self.use_self_attention)
        .with_self_attention_type(self.self_attention_type.clone())
        .with_attention_layers(self.attention_layers)
        .with_num_heads(self.num_heads)
        .with_attention_dropout(self.attention_dropout)
    }

    /// Deterministic encoder configuration.
    pub fn deterministic_encoder(&self) -> DeterministicEncoderConfig {
        DeterministicEncoderConfig::new(
            self.encoded_x_dim(),
            self.y_dim,
            self.mlp_hidden_sizes.clone(),
            self.latent_dim,
        )
        .with_use_self_attention(self.use_self_attention)
        .with_self_attention_type(self.self_attention_type.clone())
        .with_cross_attention_type(self.cross_attention_type.clone())
        .with_attention_layers(self.attention_layers)
        .with_num_heads(self.num_heads)
        .with_attention_dropout(self.attention_dropout)
    }

    /// Decoder configuration.
    pub fn decoder(&self) -> DecoderConfig {
        DecoderConfig::new(
            self.encoded_x_dim(),
            self.y_dim,
            self.mlp_hidden_sizes.clone(),
            self.latent_dim,
        )
        .with_use_deterministic_path(self.use_deter_path)
    }

    /// Recurrent preprocessor configuration.
    pub fn recurrent_encoder(&self) -> RecurrentEncoderConfig {
        RecurrentEncoderConfig::new(self.x_dim, self.latent_dim).with_num_layers(self.rnn_layers)
    }

    /// Build the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<AnpModel<B>> {
        AnpModel::new(self, device)
    }
}
