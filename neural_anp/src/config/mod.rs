//! Configuration types for neural_anp.
//!
//! This module provides Burn-style configuration structs for the model
//! components, the top-level attentive neural process, and training.

mod model;
mod network;
mod training;

pub use model::AnpConfig;
pub use network::{
    AttentionConfig, DecoderConfig, DeterministicEncoderConfig, LatentEncoderConfig,
    RecurrentEncoderConfig,
};
pub use training::TrainingConfig;
