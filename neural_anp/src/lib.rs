//! # neural_anp
//!
//! Attentive neural processes with Burn.
//!
//! An attentive neural process (ANP) learns a distribution over functions.
//! Given a set of observed (x, y) context pairs and a set of query target
//! inputs, it predicts a Gaussian over y at every target point. A global
//! latent path captures function-level uncertainty; a deterministic path
//! lets each target attend to the context points that matter for it.
//!
//! ## Features
//!
//! - **Attention**: uniform, Laplace, dot-product and multihead variants
//! - **Encoders**: latent (mean-pooled Gaussian), deterministic (cross-attention),
//!   optional LSTM preprocessor over coordinates
//! - **Decoder**: per-target mean and bounded standard deviation
//! - **Training**: negative-ELBO loss, any `burn` optimizer, checkpoints
//! - **Data**: pixel-grid sampler for image completion
//!
//! ## Quick Start
//!
//! ```ignore
//! use neural_anp::prelude::*;
//! use burn::backend::{Autodiff, NdArray};
//! use burn::optim::AdamConfig;
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let config = TrainingConfig::default();
//! let mut trainer = AnpTrainer::<MyBackend, _>::new(config, AdamConfig::new().init(), &device)?;
//!
//! let images: Vec<GrayImage> = load_digits();
//! trainer.fit(&images, 1000, &device)?;
//!
//! let model = trainer.valid_model();
//! let output = model.forward(context_x, context_y, target_x, None)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  context (x, y) ──► LatentEncoder ──► prior q(z|C) ──────┐
//!  target  (x, y) ──► LatentEncoder ──► posterior q(z|T) ──┤ z (mean)
//!                                                          ▼
//!  context (x, y) ─┐                                   Decoder ──► N(μ, σ) per target
//!  target x ───────┴► DeterministicEncoder ──► r ──────────▲
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support
//! - `ndarray` (default): CPU backend using ndarray
//! - `wgpu`: GPU acceleration via WebGPU

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod distribution;
pub mod error;
pub mod model;
pub mod nn;
pub mod params;
pub mod training;

// Re-export key types for convenience
pub use config::{AnpConfig, TrainingConfig};
pub use distribution::DiagGaussian;
pub use error::{AnpError, Result};
pub use model::{AnpModel, AnpOutput};
pub use params::{NamedParameters, ParameterMap};
pub use training::{AnpBatch, AnpTrainer, TrainMetrics};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        AnpConfig, AttentionConfig, DecoderConfig, DeterministicEncoderConfig,
        LatentEncoderConfig, RecurrentEncoderConfig, TrainingConfig,
    };
    pub use crate::data::{GrayImage, PixelGridSampler};
    pub use crate::distribution::DiagGaussian;
    pub use crate::error::{AnpError, Result};
    pub use crate::model::{AnpModel, AnpOutput};
    pub use crate::nn::{
        Attention, AttentionKind, Decoder, DeterministicEncoder, LatentEncoder, Mlp, MlpConfig,
        RecurrentEncoder,
    };
    pub use crate::params::{NamedParameters, ParamTensor, ParameterMap};
    pub use crate::training::{
        checkpoint_exists, find_latest_checkpoint, load_checkpoint, save_checkpoint, AnpBatch,
        AnpTrainer, CheckpointMetadata, MetricsTracker, TrainMetrics,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_public_api() {
        // Verify that the public API is accessible
        let _config = TrainingConfig::default();
        let _model_config = AnpConfig::new(2, 1, vec![16], 8);
        let _kind: nn::AttentionKind = "multihead".parse().unwrap();
    }

    #[test]
    fn test_model_creation() {
        use burn::backend::ndarray::NdArrayDevice;

        let device = NdArrayDevice::Cpu;
        let model = AnpConfig::new(2, 1, vec![16, 16], 8)
            .with_num_heads(4)
            .init::<TestBackend>(&device)
            .unwrap();

        assert!(model.has_deterministic_path());
        assert!(!model.parameters().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_model_config() {
        let device = Default::default();
        let result = AnpConfig::new(2, 1, vec![16], 8)
            .with_cross_attention_type("cosine".into())
            .init::<TestBackend>(&device);

        assert!(matches!(result, Err(AnpError::InvalidConfig { .. })));
    }
}
