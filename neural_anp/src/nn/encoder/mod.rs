//! Encoders from point sets to global and per-target representations.

mod deterministic;
mod latent;
mod recurrent;

pub use deterministic::DeterministicEncoder;
pub use latent::LatentEncoder;
pub use recurrent::RecurrentEncoder;

use burn::prelude::*;

use crate::error::{AnpError, Result};

/// Check that `x` and `y` describe the same non-empty point set.
pub(crate) fn check_pairs<B: Backend>(
    x: &Tensor<B, 3>,
    y: &Tensor<B, 3>,
    x_dim: usize,
    y_dim: usize,
    name: &str,
) -> Result<()> {
    let [batch, n_points, got_x_dim] = x.dims();
    if got_x_dim != x_dim {
        return Err(AnpError::ShapeMismatch {
            name: format!("{name}_x"),
            expected: vec![batch, n_points, x_dim],
            got: x.dims().to_vec(),
        });
    }
    if y.dims() != [batch, n_points, y_dim] {
        return Err(AnpError::ShapeMismatch {
            name: format!("{name}_y"),
            expected: vec![batch, n_points, y_dim],
            got: y.dims().to_vec(),
        });
    }
    if n_points == 0 {
        return Err(AnpError::EmptyPointSet {
            name: name.to_string(),
        });
    }
    Ok(())
}
