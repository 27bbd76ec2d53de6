//! Training infrastructure for attentive neural processes.
//!
//! This module provides:
//! - `AnpTrainer`: optimization loop over the negative ELBO
//! - `AnpBatch`: context/target batches
//! - Training metrics and logging
//! - Checkpoint save/load for training resumption

mod batch;
mod checkpoint;
mod metrics;
mod trainer;

pub use batch::AnpBatch;
pub use checkpoint::{
    checkpoint_exists, find_latest_checkpoint, load_checkpoint, read_parameters,
    save_checkpoint, write_parameters, CheckpointMetadata,
};
pub use metrics::{MetricsTracker, TrainMetrics};
pub use trainer::AnpTrainer;
