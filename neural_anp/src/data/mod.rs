//! Data sources for training and evaluation.

mod pixel_grid;

pub use pixel_grid::{GrayImage, PixelGridSampler};
