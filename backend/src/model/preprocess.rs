use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use super::InferenceError;
use crate::config::NormalizationConfig;

/// NHWC float tensor, batch of one.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: u32,
    normalization: NormalizationConfig,
}

impl Preprocessor {
    pub fn new(size: u32, normalization: NormalizationConfig) -> Self {
        Self {
            size,
            normalization,
        }
    }

    pub fn decode(image: &[u8]) -> Result<DynamicImage, InferenceError> {
        Ok(image::load_from_memory(image)?)
    }

    /// Stretches to `size x size` without keeping the aspect ratio.
    pub fn to_tensor(&self, image: &DynamicImage, filter: FilterType) -> InputTensor {
        let resized = image.resize_exact(self.size, self.size, filter).to_rgb8();
        self.rgb_to_tensor(&resized)
    }

    fn rgb_to_tensor(&self, rgb: &RgbImage) -> InputTensor {
        let (width, height) = rgb.dimensions();
        let NormalizationConfig { mean, std } = &self.normalization;

        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for pixel in rgb.pixels() {
            for c in 0..3 {
                data.push((pixel[c] as f32 - mean[c]) / std[c]);
            }
        }

        InputTensor {
            shape: [1, height as usize, width as usize, 3],
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn non_square_input_is_stretched_to_model_size() {
        let pre = Preprocessor::new(224, NormalizationConfig::default());
        let tensor = pre.to_tensor(&solid(640, 120, [10, 20, 30]), FilterType::Triangle);
        assert_eq!(tensor.shape, [1, 224, 224, 3]);
        assert_eq!(tensor.data.len(), 224 * 224 * 3);
    }

    #[test]
    fn default_normalization_keeps_raw_pixel_values() {
        let pre = Preprocessor::new(4, NormalizationConfig::default());
        let tensor = pre.to_tensor(&solid(8, 8, [255, 128, 0]), FilterType::Nearest);
        assert_eq!(&tensor.data[..3], &[255.0f32, 128.0, 0.0]);
    }

    #[test]
    fn channels_are_interleaved_and_normalized() {
        let norm = NormalizationConfig {
            mean: [127.5; 3],
            std: [127.5; 3],
        };
        let pre = Preprocessor::new(2, norm);
        let tensor = pre.to_tensor(&solid(2, 2, [255, 0, 255]), FilterType::Nearest);
        assert_eq!(tensor.data, vec![1.0f32, -1.0, 1.0].repeat(4));
    }

    #[test]
    fn grayscale_input_is_expanded_to_rgb() {
        let gray = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(3, 3, image::Luma([7u8])));
        let pre = Preprocessor::new(3, NormalizationConfig::default());
        let tensor = pre.to_tensor(&gray, FilterType::Nearest);
        assert_eq!(tensor.shape, [1, 3, 3, 3]);
        assert!(tensor.data.iter().all(|v| *v == 7.0));
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        let err = Preprocessor::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, InferenceError::Decode(_)));
    }
}
