//! Neural network configuration types.

use burn::config::Config;

use crate::error::AnpError;
use crate::nn::AttentionKind;

/// Configuration for an attention block.
#[derive(Config, Debug)]
pub struct AttentionConfig {
    /// Attention variant: `uniform`, `laplace`, `dot` or `multihead`.
    pub attention_type: String,

    /// Width of the query vectors.
    pub query_dim: usize,

    /// Width of the key vectors.
    pub key_dim: usize,

    /// Width of the value vectors (and of the output).
    pub value_dim: usize,

    /// Project queries and keys through learned MLPs to `value_dim` first.
    #[config(default = false)]
    pub projection: bool,

    /// Depth of the query/key projections and number of stacked multihead layers.
    #[config(default = 2)]
    pub num_layers: usize,

    /// Number of heads for `multihead`.
    #[config(default = 8)]
    pub num_heads: usize,

    /// Dropout probability on the attention weights.
    #[config(default = 0.0)]
    pub dropout: f64,

    /// Length scale of the Laplace kernel.
    #[config(default = 1.0)]
    pub laplace_scale: f64,
}

impl AttentionConfig {
    /// Width of queries and keys once the optional projection is applied.
    pub fn similarity_dims(&self) -> (usize, usize) {
        if self.projection {
            (self.value_dim, self.value_dim)
        } else {
            (self.query_dim, self.key_dim)
        }
    }

    /// Validate the configuration and resolve the attention variant.
    pub fn validate(&self) -> crate::error::Result<AttentionKind> {
        let kind: AttentionKind = self.attention_type.parse()?;

        if self.query_dim == 0 || self.key_dim == 0 || self.value_dim == 0 {
            return Err(AnpError::config("attention dimensions must be positive"));
        }
        if self.num_layers == 0 {
            return Err(AnpError::config("attention_layers must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(AnpError::config(format!(
                "attention dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.laplace_scale <= 0.0 {
            return Err(AnpError::config("laplace_scale must be positive"));
        }

        let (q_dim, k_dim) = self.similarity_dims();
        match kind {
            AttentionKind::Laplace | AttentionKind::Dot if q_dim != k_dim => {
                return Err(AnpError::config(format!(
                    "{kind} attention needs equal query and key widths, got {q_dim} and {k_dim}"
                )));
            }
            AttentionKind::MultiHead => {
                if self.num_heads == 0 || self.value_dim % self.num_heads != 0 {
                    return Err(AnpError::config(format!(
                        "value_dim {} is not divisible by {} heads",
                        self.value_dim, self.num_heads
                    )));
                }
            }
            _ => {}
        }

        Ok(kind)
    }
}

/// Configuration for the latent encoder.
#[derive(Config, Debug)]
pub struct LatentEncoderConfig {
    /// Width of the x coordinates.
    pub x_dim: usize,

    /// Width of the y outputs.
    pub y_dim: usize,

    /// Hidden layer widths of the per-point MLP.
    pub hidden_dims: Vec<usize>,

    /// Width of the latent vector.
    pub latent_dim: usize,

    /// Refine per-point features with self-attention before pooling.
    #[config(default = false)]
    pub use_self_attention: bool,

    /// Self-attention variant.
    #[config(default = "String::from(\"dot\")")]
    pub self_attention_type: String,

    /// Number of attention layers.
    #[config(default = 2)]
    pub attention_layers: usize,

    /// Number of heads for multihead attention.
    #[config(default = 8)]
    pub num_heads: usize,

    /// Dropout on attention weights.
    #[config(default = 0.0)]
    pub attention_dropout: f64,
}

impl LatentEncoderConfig {
    /// Configuration of the self-attention block over per-point features.
    pub fn self_attention(&self) -> AttentionConfig {
        AttentionConfig::new(
            self.self_attention_type.clone(),
            self.latent_dim,
            self.latent_dim,
            self.latent_dim,
        )
        .with_num_layers(self.attention_layers)
        .with_num_heads(self.num_heads)
        .with_dropout(self.attention_dropout)
    }
}

/// Configuration for the deterministic encoder.
#[derive(Config, Debug)]
pub struct DeterministicEncoderConfig {
    /// Width of the x coordinates.
    pub x_dim: usize,

    /// Width of the y outputs.
    pub y_dim: usize,

    /// Hidden layer widths of the per-point MLP.
    pub hidden_dims: Vec<usize>,

    /// Width of the per-target representation.
    pub latent_dim: usize,

    /// Refine per-point features with self-attention before cross-attention.
    #[config(default = false)]
    pub use_self_attention: bool,

    /// Self-attention variant.
    #[config(default = "String::from(\"dot\")")]
    pub self_attention_type: String,

    /// Cross-attention variant.
    #[config(default = "String::from(\"multihead\")")]
    pub cross_attention_type: String,

    /// Number of attention layers.
    #[config(default = 2)]
    pub attention_layers: usize,

    /// Number of heads for multihead attention.
    #[config(default = 8)]
    pub num_heads: usize,

    /// Dropout on attention weights.
    #[config(default = 0.0)]
    pub attention_dropout: f64,
}

impl DeterministicEncoderConfig {
    /// Configuration of the self-attention block among context points.
    pub fn self_attention(&self) -> AttentionConfig {
        AttentionConfig::new(
            self.self_attention_type.clone(),
            self.latent_dim,
            self.latent_dim,
            self.latent_dim,
        )
        .with_num_layers(self.attention_layers)
        .with_num_heads(self.num_heads)
        .with_dropout(self.attention_dropout)
    }

    /// Configuration of the cross-attention from target x to context x.
    ///
    /// Queries and keys are projected from `x_dim` to `latent_dim`.
    pub fn cross_attention(&self) -> AttentionConfig {
        AttentionConfig::new(
            self.cross_attention_type.clone(),
            self.x_dim,
            self.x_dim,
            self.latent_dim,
        )
        .with_projection(true)
        .with_num_layers(self.attention_layers)
        .with_num_heads(self.num_heads)
        .with_dropout(self.attention_dropout)
    }
}

/// Configuration for the decoder.
#[derive(Config, Debug)]
pub struct DecoderConfig {
    /// Width of the x coordinates.
    pub x_dim: usize,

    /// Width of the y outputs.
    pub y_dim: usize,

    /// Hidden layer widths.
    pub hidden_dims: Vec<usize>,

    /// Width of the latent and deterministic representations.
    pub latent_dim: usize,

    /// Whether a deterministic representation is concatenated to the input.
    #[config(default = true)]
    pub use_deterministic_path: bool,
}

impl DecoderConfig {
    /// Input width: target x, latent sample and (optionally) the deterministic representation.
    pub fn input_dim(&self) -> usize {
        let deterministic = if self.use_deterministic_path {
            self.latent_dim
        } else {
            0
        };
        self.x_dim + self.latent_dim + deterministic
    }
}

/// Configuration for the recurrent coordinate preprocessor.
#[derive(Config, Debug)]
pub struct RecurrentEncoderConfig {
    /// Width of the raw x coordinates.
    pub input_dim: usize,

    /// Width of the hidden state (and of the output sequence).
    pub hidden_dim: usize,

    /// Number of stacked LSTM layers.
    #[config(default = 2)]
    pub num_layers: usize,
}
