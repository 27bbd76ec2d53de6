//! Training configuration types.

use burn::config::Config;

use super::AnpConfig;

/// Configuration for the training driver.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Model configuration.
    pub model: AnpConfig,

    /// Learning rate.
    #[config(default = 1e-4)]
    pub learning_rate: f64,

    /// Number of function instances per batch.
    #[config(default = 16)]
    pub batch_size: usize,

    /// Number of context points per instance.
    #[config(default = 400)]
    pub num_context: usize,

    /// Seed for context/target sampling.
    #[config(default = 42)]
    pub seed: u64,

    /// Log metrics every `log_interval` steps (0 = never).
    #[config(default = 100)]
    pub log_interval: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        // Pixel-grid setup: normalized (row, col) -> intensity.
        Self::new(AnpConfig::new(2, 1, vec![256, 256, 256, 256], 256))
    }
}

impl TrainingConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.model.validate().map_err(|e| e.to_string())?;

        if self.learning_rate <= 0.0 {
            return Err("learning_rate must be positive".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be positive".to_string());
        }
        if self.num_context == 0 {
            return Err("num_context must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_training_config() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.x_dim, 2);
        assert_eq!(config.model.y_dim, 1);
    }

    #[test]
    fn test_builder_pattern() {
        let config = TrainingConfig::default().with_learning_rate(1e-3);
        assert_eq!(config.learning_rate, 1e-3);
    }

    #[test]
    fn test_zero_context_rejected() {
        let config = TrainingConfig::default().with_num_context(0);
        assert!(config.validate().is_err());
    }
}
