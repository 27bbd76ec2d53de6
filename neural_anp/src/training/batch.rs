//! Training batches.

use burn::prelude::*;

use crate::error::{AnpError, Result};

/// One batch of context/target function instances.
///
/// By convention the targets include the context points.
#[derive(Debug, Clone)]
pub struct AnpBatch<B: Backend> {
    /// Context inputs: [batch, n_context, x_dim]
    pub context_x: Tensor<B, 3>,
    /// Context outputs: [batch, n_context, y_dim]
    pub context_y: Tensor<B, 3>,
    /// Target inputs: [batch, n_target, x_dim]
    pub target_x: Tensor<B, 3>,
    /// Target outputs: [batch, n_target, y_dim]
    pub target_y: Tensor<B, 3>,
}

impl<B: Backend> AnpBatch<B> {
    /// Create a new batch from its four tensors.
    pub fn new(
        context_x: Tensor<B, 3>,
        context_y: Tensor<B, 3>,
        target_x: Tensor<B, 3>,
        target_y: Tensor<B, 3>,
    ) -> Self {
        Self {
            context_x,
            context_y,
            target_x,
            target_y,
        }
    }

    /// Number of function instances.
    pub fn batch_size(&self) -> usize {
        self.context_x.dims()[0]
    }

    /// Number of context points per instance.
    pub fn num_context(&self) -> usize {
        self.context_x.dims()[1]
    }

    /// Number of target points per instance.
    pub fn num_target(&self) -> usize {
        self.target_x.dims()[1]
    }

    /// Get the device of this batch.
    pub fn device(&self) -> B::Device {
        self.context_x.device()
    }

    /// Check that the four tensors agree on batch size and point counts.
    pub fn validate(&self) -> Result<()> {
        let [batch, n_context, _] = self.context_x.dims();
        let [_, n_target, _] = self.target_x.dims();

        let pairs = [
            ("context_y", &self.context_y, n_context),
            ("target_x", &self.target_x, n_target),
            ("target_y", &self.target_y, n_target),
        ];
        for (name, tensor, points) in pairs {
            let dims = tensor.dims();
            if dims[0] != batch || dims[1] != points {
                return Err(AnpError::ShapeMismatch {
                    name: name.into(),
                    expected: vec![batch, points, dims[2]],
                    got: dims.to_vec(),
                });
            }
        }
        Ok(())
    }
}
