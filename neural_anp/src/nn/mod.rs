//! Neural network modules for attentive neural processes.
//!
//! This module provides:
//! - Attention over point sets (uniform, Laplace, dot-product, multihead)
//! - Encoders: latent (global Gaussian), deterministic (per-target), recurrent
//! - Decoder: per-target Gaussian predictive distribution
//! - MLP building blocks

pub mod attention;
pub mod decoder;
pub mod encoder;
pub mod mlp;

pub use attention::{Attention, AttentionKind};
pub use decoder::{Decoder, MIN_PREDICTIVE_STD, MAX_PREDICTIVE_STD};
pub use encoder::{DeterministicEncoder, LatentEncoder, RecurrentEncoder};
pub use mlp::{Mlp, MlpConfig};
