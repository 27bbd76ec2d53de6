//! Diagonal Gaussian distribution over tensors.

use std::f64::consts::PI;

use burn::prelude::*;

use crate::error::{AnpError, Result};

/// Multivariate normal with independent per-element variance.
///
/// Mean and standard deviation share one shape; every operation is
/// elementwise, so reducing over the event axes is left to the caller.
#[derive(Debug, Clone)]
pub struct DiagGaussian<B: Backend, const D: usize> {
    mean: Tensor<B, D>,
    stddev: Tensor<B, D>,
}

impl<B: Backend, const D: usize> DiagGaussian<B, D> {
    /// Create a distribution from its mean and (positive) standard deviation.
    pub fn new(mean: Tensor<B, D>, stddev: Tensor<B, D>) -> Result<Self> {
        if mean.dims() != stddev.dims() {
            return Err(AnpError::ShapeMismatch {
                name: "stddev".into(),
                expected: mean.dims().to_vec(),
                got: stddev.dims().to_vec(),
            });
        }
        Ok(Self { mean, stddev })
    }

    /// Mean tensor.
    pub fn mean(&self) -> Tensor<B, D> {
        self.mean.clone()
    }

    /// Standard deviation tensor.
    pub fn stddev(&self) -> Tensor<B, D> {
        self.stddev.clone()
    }

    /// Variance tensor.
    pub fn variance(&self) -> Tensor<B, D> {
        self.stddev.clone().powf_scalar(2.0)
    }

    /// Shape of the distribution.
    pub fn dims(&self) -> [usize; D] {
        self.mean.dims()
    }

    /// Elementwise log density of `value`.
    ///
    /// log N(x; μ, σ) = -((x - μ) / σ)² / 2 - ln σ - ln(2π) / 2
    pub fn log_prob(&self, value: Tensor<B, D>) -> Tensor<B, D> {
        let z = (value - self.mean.clone()) / self.stddev.clone();
        (z.powf_scalar(2.0).mul_scalar(-0.5) - self.stddev.clone().log()).sub_scalar(0.5 * (2.0 * PI).ln())
    }

    /// Elementwise KL(self ‖ other).
    ///
    /// ln(σ₂/σ₁) + (σ₁² + (μ₁ - μ₂)²) / (2σ₂²) - 1/2
    pub fn kl_divergence(&self, other: &Self) -> Tensor<B, D> {
        let var_ratio = (self.stddev.clone() / other.stddev.clone()).powf_scalar(2.0);
        let t1 = ((self.mean.clone() - other.mean.clone()) / other.stddev.clone()).powf_scalar(2.0);
        (var_ratio.clone() + t1 - var_ratio.log()).sub_scalar(1.0).mul_scalar(0.5)
    }

    /// Reparameterized sample μ + σ·ε from caller-supplied standard-normal noise.
    pub fn rsample(&self, noise: Tensor<B, D>) -> Tensor<B, D> {
        self.mean.clone() + self.stddev.clone() * noise
    }
}
