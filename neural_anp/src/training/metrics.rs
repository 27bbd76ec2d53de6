//! Training metrics.

use std::collections::VecDeque;

/// Training metrics for a single step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainMetrics {
    /// Negative ELBO.
    pub loss: f32,
    /// Mean per-point log-likelihood of the targets.
    pub log_likelihood: f32,
    /// Mean KL(posterior ‖ prior).
    pub kl: f32,
    /// Learning rate used for the step.
    pub learning_rate: f64,
    /// Number of training steps.
    pub step: usize,
}

impl TrainMetrics {
    /// Create new training metrics.
    pub fn new(loss: f32, log_likelihood: f32, kl: f32) -> Self {
        Self {
            loss,
            log_likelihood,
            kl,
            learning_rate: 0.0,
            step: 0,
        }
    }

    /// Whether every value is finite.
    pub fn is_finite(&self) -> bool {
        self.loss.is_finite() && self.log_likelihood.is_finite() && self.kl.is_finite()
    }

    /// Log metrics at info level.
    pub fn log(&self, prefix: &str) {
        log::info!(
            "{} step={} loss={:.6} log_p={:.6} kl={:.6} lr={:.2e}",
            prefix,
            self.step,
            self.loss,
            self.log_likelihood,
            self.kl,
            self.learning_rate,
        );
    }
}

/// Running average tracker for metrics.
#[derive(Debug, Clone)]
pub struct MetricsTracker {
    window_size: usize,
    window: VecDeque<TrainMetrics>,
    total_steps: usize,
}

impl MetricsTracker {
    /// Create a new metrics tracker averaging over the last `window_size` steps.
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size),
            total_steps: 0,
        }
    }

    /// Add metrics from a training step.
    pub fn add(&mut self, metrics: &TrainMetrics) {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(metrics.clone());
        self.total_steps += 1;
    }

    /// Get average metrics over the window.
    pub fn average_metrics(&self) -> TrainMetrics {
        if self.window.is_empty() {
            return TrainMetrics::default();
        }
        let n = self.window.len() as f32;
        let sum = |f: fn(&TrainMetrics) -> f32| self.window.iter().map(f).sum::<f32>() / n;

        TrainMetrics {
            loss: sum(|m| m.loss),
            log_likelihood: sum(|m| m.log_likelihood),
            kl: sum(|m| m.kl),
            learning_rate: self.window.back().map_or(0.0, |m| m.learning_rate),
            step: self.total_steps,
        }
    }

    /// Get total number of steps.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_finite() {
        assert!(TrainMetrics::new(1.0, -0.5, 0.5).is_finite());
        assert!(!TrainMetrics::new(f32::NAN, 0.0, 0.0).is_finite());
    }

    #[test]
    fn test_metrics_tracker() {
        let mut tracker = MetricsTracker::new(10);

        for i in 0..20 {
            let metrics = TrainMetrics::new(i as f32 * 0.1, 0.0, 0.02);
            tracker.add(&metrics);
        }

        assert_eq!(tracker.total_steps(), 20);

        // Last 10 losses: 1.0, 1.1, ..., 1.9
        let avg = tracker.average_metrics();
        assert!((avg.loss - 1.45).abs() < 1e-5);
        assert!((avg.kl - 0.02).abs() < 1e-6);
        assert_eq!(avg.step, 20);
    }

    #[test]
    fn test_empty_tracker() {
        let tracker = MetricsTracker::new(5);
        assert_eq!(tracker.average_metrics(), TrainMetrics::default());
    }
}
