//! Example: Image completion with an attentive neural process.
//!
//! Each image is treated as a function from normalized (row, col) to
//! intensity. The model sees a random subset of pixels and predicts the rest:
//! 1. Generate a set of synthetic shape images
//! 2. Train on random context subsets with the full image as target
//! 3. Save a checkpoint and reload it
//! 4. Complete an image from a handful of observed pixels
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run -p neural_anp --example pixel_completion
//! ```
//!
//! The checkpoint is written to `target/pixel_completion/`.

use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use burn::optim::AdamConfig;
use burn::prelude::*;

use neural_anp::{
    config::{AnpConfig, TrainingConfig},
    data::{GrayImage, PixelGridSampler},
    training::{load_checkpoint, save_checkpoint, AnpTrainer, CheckpointMetadata},
    AnpModel, Result,
};

type MyBackend = Autodiff<NdArray>;

const SIDE: usize = 12;
const NUM_IMAGES: usize = 32;
const NUM_STEPS: usize = 300;
const CHECKPOINT_DIR: &str = "target/pixel_completion/checkpoint_1";

/// Rings and bars at varying positions.
fn synthetic_images() -> Result<Vec<GrayImage>> {
    (0..NUM_IMAGES)
        .map(|i| {
            let center = 3.0 + (i % 6) as f32;
            let radius = 2.0 + (i % 3) as f32;
            let pixels = (0..SIDE * SIDE)
                .map(|p| {
                    let (row, col) = ((p / SIDE) as f32, (p % SIDE) as f32);
                    let value = if i % 2 == 0 {
                        let d = ((row - center).powi(2) + (col - 6.0).powi(2)).sqrt();
                        1.0 - ((d - radius).abs() / 1.5).min(1.0)
                    } else if (col - center).abs() < radius / 2.0 {
                        1.0
                    } else {
                        0.0
                    };
                    value.clamp(0.0, 1.0)
                })
                .collect();
            GrayImage::new(SIDE, SIDE, pixels)
        })
        .collect()
}

fn render(values: &[f32]) {
    const SHADES: [char; 5] = [' ', '.', ':', '*', '#'];
    for row in values.chunks(SIDE) {
        let line: String = row
            .iter()
            .map(|v| SHADES[((v.clamp(0.0, 1.0) * 4.0).round() as usize).min(4)])
            .collect();
        println!("  |{line}|");
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let device = burn::backend::ndarray::NdArrayDevice::Cpu;
    let images = synthetic_images()?;

    let model_config = AnpConfig::new(2, 1, vec![64, 64], 64)
        .with_cross_attention_type("multihead".into())
        .with_num_heads(4);
    let config = TrainingConfig::new(model_config.clone())
        .with_learning_rate(1e-3)
        .with_batch_size(8)
        .with_num_context(40)
        .with_log_interval(50);

    println!("Training on {} images of {}x{} pixels", NUM_IMAGES, SIDE, SIDE);
    let optimizer = AdamConfig::new().init::<MyBackend, AnpModel<MyBackend>>();
    let mut trainer = AnpTrainer::new(config, optimizer, &device)?;
    let history = trainer.fit(&images, NUM_STEPS, &device)?;

    if let (Some(first), Some(last)) = (history.first(), history.last()) {
        println!("Loss: {:.4} (step {}) -> {:.4} (step {})", first.1, first.0, last.1, last.0);
    }

    let avg = trainer.tracker().average_metrics();
    let metadata = CheckpointMetadata::new(1, NUM_STEPS, avg.loss, avg.loss);
    save_checkpoint(Path::new(CHECKPOINT_DIR), trainer.model(), &model_config, &metadata)?;

    let (model, _, _) = load_checkpoint::<NdArray>(Path::new(CHECKPOINT_DIR), &device)?;

    let batch = PixelGridSampler::new(7).sample::<NdArray>(&images, 1, 20, &device)?;
    let output = model.forward(
        batch.context_x.clone(),
        batch.context_y.clone(),
        batch.target_x.clone(),
        None,
    )?;

    let truth: Vec<f32> = batch.target_y.into_data().to_vec().unwrap_or_default();
    let mean: Vec<f32> = output.mean.into_data().to_vec().unwrap_or_default();
    let std: Vec<f32> = output.stddev.into_data().to_vec().unwrap_or_default();

    let mut observed = vec![0.0f32; SIDE * SIDE];
    let cx: Vec<f32> = batch.context_x.into_data().to_vec().unwrap_or_default();
    let cy: Vec<f32> = batch.context_y.into_data().to_vec().unwrap_or_default();
    for (coord, value) in cx.chunks(2).zip(cy) {
        let row = (coord[0] * (SIDE - 1) as f32).round() as usize;
        let col = (coord[1] * (SIDE - 1) as f32).round() as usize;
        observed[row * SIDE + col] = value.max(0.25);
    }

    println!("\nObserved pixels (20 of {}):", SIDE * SIDE);
    render(&observed);
    println!("\nPredicted mean:");
    render(&mean);
    println!("\nGround truth:");
    render(&truth);

    let mse = mean
        .iter()
        .zip(&truth)
        .map(|(m, t)| (m - t).powi(2))
        .sum::<f32>()
        / truth.len().max(1) as f32;
    let avg_std = std.iter().sum::<f32>() / std.len().max(1) as f32;
    println!("\nMSE = {:.4}, mean predictive std = {:.4}", mse, avg_std);

    Ok(())
}
