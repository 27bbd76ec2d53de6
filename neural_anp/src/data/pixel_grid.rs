//! Image completion as a regression problem over pixel coordinates.
//!
//! Each image is a function from a normalized (row, col) coordinate in
//! [0, 1]² to an intensity in [0, 1]. Context points are a random subset of
//! pixels; targets are every pixel of the same image.

use burn::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::error::{AnpError, Result};
use crate::training::AnpBatch;

/// Single-channel image with intensities in [0, 1], stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    pixels: Vec<f32>,
}

impl GrayImage {
    /// Create an image from normalized intensities.
    pub fn new(width: usize, height: usize, pixels: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AnpError::InvalidData(format!(
                "image dimensions must be positive, got {width}x{height}"
            )));
        }
        if pixels.len() != width * height {
            return Err(AnpError::InvalidData(format!(
                "expected {} pixels for a {width}x{height} image, got {}",
                width * height,
                pixels.len()
            )));
        }
        if let Some(bad) = pixels.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(AnpError::InvalidData(format!(
                "pixel intensity {bad} outside [0, 1]"
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create an image from 8-bit intensities, scaled by 1/255.
    pub fn from_u8(width: usize, height: usize, pixels: &[u8]) -> Result<Self> {
        Self::new(
            width,
            height,
            pixels.iter().map(|&p| p as f32 / 255.0).collect(),
        )
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Always false for a constructed image.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Row-major intensities.
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Intensity at a flat row-major index.
    pub fn get(&self, index: usize) -> Option<f32> {
        self.pixels.get(index).copied()
    }

    /// Normalized (row, col) coordinate of a flat index.
    pub fn coordinate(&self, index: usize) -> [f32; 2] {
        let row = index / self.width;
        let col = index % self.width;
        [normalize(row, self.height), normalize(col, self.width)]
    }
}

fn normalize(i: usize, extent: usize) -> f32 {
    if extent > 1 {
        i as f32 / (extent - 1) as f32
    } else {
        0.0
    }
}

/// Seeded sampler of context/target batches from a set of equally sized images.
#[derive(Debug, Clone)]
pub struct PixelGridSampler {
    rng: StdRng,
}

impl PixelGridSampler {
    /// Create a sampler with an explicit seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a batch.
    ///
    /// Picks `batch_size` distinct images; for each, `num_context` distinct
    /// pixels become the context and all pixels the target.
    ///
    /// Output shapes: context [batch, num_context, 2|1], target
    /// [batch, width*height, 2|1].
    pub fn sample<B: Backend>(
        &mut self,
        images: &[GrayImage],
        batch_size: usize,
        num_context: usize,
        device: &B::Device,
    ) -> Result<AnpBatch<B>> {
        let Some(first) = images.first() else {
            return Err(AnpError::EmptyPointSet {
                name: "images".into(),
            });
        };
        let (width, height) = (first.width(), first.height());
        if let Some(other) = images
            .iter()
            .find(|img| img.width() != width || img.height() != height)
        {
            return Err(AnpError::InvalidData(format!(
                "images must share one size: {width}x{height} vs {}x{}",
                other.width(),
                other.height()
            )));
        }
        if batch_size == 0 || batch_size > images.len() {
            return Err(AnpError::config(format!(
                "batch_size must be in 1..={}, got {batch_size}",
                images.len()
            )));
        }
        let n_pixels = width * height;
        if num_context == 0 || num_context > n_pixels {
            return Err(AnpError::config(format!(
                "num_context must be in 1..={n_pixels}, got {num_context}"
            )));
        }

        let mut context_x = Vec::with_capacity(batch_size * num_context * 2);
        let mut context_y = Vec::with_capacity(batch_size * num_context);
        let mut target_x = Vec::with_capacity(batch_size * n_pixels * 2);
        let mut target_y = Vec::with_capacity(batch_size * n_pixels);

        for image_idx in index::sample(&mut self.rng, images.len(), batch_size) {
            let image = &images[image_idx];

            for pixel in index::sample(&mut self.rng, n_pixels, num_context) {
                context_x.extend_from_slice(&image.coordinate(pixel));
                context_y.push(image.pixels[pixel]);
            }

            for (pixel, &value) in image.pixels.iter().enumerate() {
                target_x.extend_from_slice(&image.coordinate(pixel));
                target_y.push(value);
            }
        }

        log::debug!(
            "Sampled {} images: {} context / {} target pixels each",
            batch_size,
            num_context,
            n_pixels
        );

        Ok(AnpBatch::new(
            Tensor::from_data(
                TensorData::new(context_x, [batch_size, num_context, 2]),
                device,
            ),
            Tensor::from_data(
                TensorData::new(context_y, [batch_size, num_context, 1]),
                device,
            ),
            Tensor::from_data(TensorData::new(target_x, [batch_size, n_pixels, 2]), device),
            Tensor::from_data(TensorData::new(target_y, [batch_size, n_pixels, 1]), device),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn gradient_image(width: usize, height: usize, offset: f32) -> GrayImage {
        let pixels = (0..width * height)
            .map(|i| ((i as f32 / (width * height) as f32) + offset).min(1.0))
            .collect();
        GrayImage::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_image_validation() {
        assert!(GrayImage::new(2, 2, vec![0.0; 3]).is_err());
        assert!(GrayImage::new(0, 2, vec![]).is_err());
        assert!(GrayImage::new(1, 2, vec![0.5, 1.5]).is_err());

        let image = GrayImage::from_u8(2, 1, &[0, 255]).unwrap();
        assert_eq!(image.pixels(), &[0.0, 1.0]);
    }

    #[test]
    fn test_coordinates_are_normalized() {
        let image = gradient_image(4, 3, 0.0);
        assert_eq!(image.coordinate(0), [0.0, 0.0]);
        assert_eq!(image.coordinate(11), [1.0, 1.0]);
        assert_eq!(image.coordinate(4), [0.5, 0.0]);
    }

    #[test]
    fn test_sample_shapes() {
        let device = Default::default();
        let images: Vec<_> = (0..5).map(|i| gradient_image(4, 4, i as f32 * 0.1)).collect();
        let mut sampler = PixelGridSampler::new(7);

        let batch = sampler
            .sample::<TestBackend>(&images, 3, 6, &device)
            .unwrap();

        assert_eq!(batch.context_x.dims(), [3, 6, 2]);
        assert_eq!(batch.context_y.dims(), [3, 6, 1]);
        assert_eq!(batch.target_x.dims(), [3, 16, 2]);
        assert_eq!(batch.target_y.dims(), [3, 16, 1]);

        let coords: Vec<f32> = batch.target_x.into_data().to_vec().unwrap();
        assert!(coords.iter().all(|c| (0.0..=1.0).contains(c)));
    }

    #[test]
    fn test_context_is_subset_of_target() {
        let device = Default::default();
        let images: Vec<_> = (0..3).map(|i| gradient_image(5, 5, i as f32 * 0.2)).collect();
        let mut sampler = PixelGridSampler::new(1);

        let batch = sampler
            .sample::<TestBackend>(&images, 2, 4, &device)
            .unwrap();

        let cx: Vec<f32> = batch.context_x.into_data().to_vec().unwrap();
        let cy: Vec<f32> = batch.context_y.into_data().to_vec().unwrap();
        let tx: Vec<f32> = batch.target_x.into_data().to_vec().unwrap();
        let ty: Vec<f32> = batch.target_y.into_data().to_vec().unwrap();

        for b in 0..2 {
            for c in 0..4 {
                let coord = &cx[(b * 4 + c) * 2..(b * 4 + c) * 2 + 2];
                let value = cy[b * 4 + c];
                let found = (0..25).any(|t| {
                    let t_idx = b * 25 + t;
                    &tx[t_idx * 2..t_idx * 2 + 2] == coord && ty[t_idx] == value
                });
                assert!(found, "context point {coord:?} not among targets of image {b}");
            }
        }
    }

    #[test]
    fn test_same_seed_same_batch() {
        let device = Default::default();
        let images: Vec<_> = (0..4).map(|i| gradient_image(3, 3, i as f32 * 0.1)).collect();

        let a = PixelGridSampler::new(11)
            .sample::<TestBackend>(&images, 2, 3, &device)
            .unwrap();
        let b = PixelGridSampler::new(11)
            .sample::<TestBackend>(&images, 2, 3, &device)
            .unwrap();

        let a_x: Vec<f32> = a.context_x.into_data().to_vec().unwrap();
        let b_x: Vec<f32> = b.context_x.into_data().to_vec().unwrap();
        assert_eq!(a_x, b_x);
    }

    #[test]
    fn test_sample_rejects_bad_requests() {
        let device = Default::default();
        let images = vec![gradient_image(2, 2, 0.0), gradient_image(2, 2, 0.5)];
        let mut sampler = PixelGridSampler::new(0);

        assert!(sampler.sample::<TestBackend>(&images, 3, 2, &device).is_err());
        assert!(sampler.sample::<TestBackend>(&images, 1, 5, &device).is_err());
        assert!(sampler.sample::<TestBackend>(&[], 1, 1, &device).is_err());

        let mixed = vec![gradient_image(2, 2, 0.0), gradient_image(3, 2, 0.0)];
        assert!(sampler.sample::<TestBackend>(&mixed, 1, 1, &device).is_err());
    }
}
