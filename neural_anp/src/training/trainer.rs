//! ANP training driver.

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::config::TrainingConfig;
use crate::data::{GrayImage, PixelGridSampler};
use crate::error::{AnpError, Result};
use crate::model::AnpModel;

use super::batch::AnpBatch;
use super::metrics::{MetricsTracker, TrainMetrics};

/// Trainer that minimizes the negative ELBO of an [`AnpModel`].
///
/// Generic over any `burn` optimizer; the reference setup is Adam with the
/// learning rate from [`TrainingConfig`].
pub struct AnpTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<AnpModel<B>, B>,
{
    model: AnpModel<B>,
    optimizer: O,
    config: TrainingConfig,
    tracker: MetricsTracker,
    sampler: PixelGridSampler,
}

impl<B, O> AnpTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<AnpModel<B>, B>,
{
    /// Create a trainer with a freshly initialized model.
    pub fn new(config: TrainingConfig, optimizer: O, device: &B::Device) -> Result<Self> {
        config.validate().map_err(AnpError::config)?;
        let model = config.model.init(device)?;
        Ok(Self::with_model(model, config, optimizer))
    }

    /// Create a trainer around an existing model, e.g. one restored from a checkpoint.
    pub fn with_model(model: AnpModel<B>, config: TrainingConfig, optimizer: O) -> Self {
        let window = config.log_interval.max(1);
        let sampler = PixelGridSampler::new(config.seed);
        Self {
            model,
            optimizer,
            config,
            tracker: MetricsTracker::new(window),
            sampler,
        }
    }

    /// Get the training configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// The model being trained.
    pub fn model(&self) -> &AnpModel<B> {
        &self.model
    }

    /// Consume the trainer, returning the model.
    pub fn into_model(self) -> AnpModel<B> {
        self.model
    }

    /// Copy of the model on the inner backend, for inference without autodiff.
    pub fn valid_model(&self) -> AnpModel<B::InnerBackend> {
        self.model.valid()
    }

    /// Running metrics.
    pub fn tracker(&self) -> &MetricsTracker {
        &self.tracker
    }

    /// Perform a single optimization step.
    ///
    /// A non-finite loss is reported and the parameter update is skipped.
    pub fn train_step(&mut self, batch: &AnpBatch<B>) -> Result<TrainMetrics> {
        batch.validate()?;

        let output = self.model.forward(
            batch.context_x.clone(),
            batch.context_y.clone(),
            batch.target_x.clone(),
            Some(batch.target_y.clone()),
        )?;

        let loss = output.loss.clone().ok_or_else(|| AnpError::TrainingError {
            message: "forward pass with targets produced no loss".into(),
        })?;

        let mut metrics = TrainMetrics::new(
            output.loss_value().unwrap_or(f32::NAN),
            output.log_p_value().unwrap_or(f32::NAN),
            output.kl_value().unwrap_or(f32::NAN),
        );
        metrics.learning_rate = self.config.learning_rate;
        metrics.step = self.tracker.total_steps() + 1;

        if !metrics.is_finite() {
            log::warn!(
                "Non-finite loss at step {} (loss={}, log_p={}, kl={}); skipping update",
                metrics.step,
                metrics.loss,
                metrics.log_likelihood,
                metrics.kl
            );
            self.tracker.add(&metrics);
            return Ok(metrics);
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.config.learning_rate, self.model.clone(), grads);

        self.tracker.add(&metrics);
        if self.config.log_interval > 0 && metrics.step % self.config.log_interval == 0 {
            self.tracker.average_metrics().log("train");
        }

        Ok(metrics)
    }

    /// Train on pixel-grid images for `num_steps` steps.
    ///
    /// The sampler is seeded once from [`TrainingConfig::seed`] and carries
    /// over between calls, so repeated calls keep drawing fresh batches.
    /// Returns a vector of (step, loss) pairs.
    pub fn fit(
        &mut self,
        images: &[GrayImage],
        num_steps: usize,
        device: &B::Device,
    ) -> Result<Vec<(usize, f32)>> {
        let mut history = Vec::with_capacity(num_steps);

        for _ in 0..num_steps {
            let batch = self.sampler.sample::<B>(
                images,
                self.config.batch_size,
                self.config.num_context,
                device,
            )?;
            let metrics = self.train_step(&batch)?;
            history.push((metrics.step, metrics.loss));
        }

        if let Some((step, loss)) = history.last() {
            log::info!("Finished {} steps: loss = {:.6}", step, loss);
        }

        Ok(history)
    }
}
