//! The image loading and normalization path shared by training, evaluation
//! and the online prediction API.

use crate::common::*;
use image::{flat::FlatSamples, imageops::FilterType, DynamicImage};

/// Loads images into normalized CHW float tensors.
///
/// Images are decoded to RGB, resized to a square target size without
/// preserving the aspect ratio, and scaled to `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct ImageLoader {
    image_size: usize,
    image_channels: usize,
    device: Device,
}

impl ImageLoader {
    pub fn new(image_size: usize, device: impl Into<Option<Device>>) -> Result<Self> {
        ensure!(image_size > 0, "image_size must be positive");

        Ok(Self {
            image_size,
            image_channels: 3,
            device: device.into().unwrap_or(Device::Cpu),
        })
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn image_channels(&self) -> usize {
        self.image_channels
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Loads one image file into a `[3, size, size]` tensor.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Tensor> {
        let path = path.as_ref();
        let image = image::io::Reader::open(path)
            .with_context(|| format!("failed to open '{}'", path.display()))?
            .with_guessed_format()
            .with_context(|| {
                format!(
                    "failed to determine the image file format: '{}'",
                    path.display()
                )
            })?
            .decode()
            .with_context(|| format!("failed to decode image file '{}'", path.display()))?;
        Ok(self.to_tensor(&image))
    }

    /// Decodes one in-memory image into a `[3, size, size]` tensor.
    pub fn decode(&self, bytes: &[u8]) -> Result<Tensor> {
        let image = image::load_from_memory(bytes).context("failed to decode image data")?;
        Ok(self.to_tensor(&image))
    }

    /// Prepares one in-memory image for inference as a `[1, 3, size, size]`
    /// batch.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<Tensor> {
        Ok(self.decode(bytes)?.unsqueeze(0))
    }

    fn to_tensor(&self, image: &DynamicImage) -> Tensor {
        let Self {
            image_size,
            image_channels,
            device,
        } = *self;

        let FlatSamples { samples, .. } = image
            .resize_exact(image_size as u32, image_size as u32, FilterType::CatmullRom)
            .to_rgb8()
            .into_flat_samples();
        debug_assert_eq!(samples.len(), image_size * image_size * image_channels);

        tch::no_grad(|| {
            Tensor::of_slice(&samples)
                .to_kind(Kind::Float)
                .to_device(device)
                .g_div_scalar(255.0)
                .view([
                    image_size as i64,
                    image_size as i64,
                    image_channels as i64,
                ])
                .permute(&[2, 0, 1])
                .set_requires_grad(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::abs_diff_eq;
    use image::{Rgb, RgbImage};

    #[test]
    fn load_resizes_and_normalizes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.png");
        RgbImage::from_pixel(64, 48, Rgb([255, 0, 0])).save(&path)?;

        let loader = ImageLoader::new(16, None)?;
        let tensor = loader.load(&path)?;
        ensure!(tensor.size3()? == (3, 16, 16));
        ensure!(tensor.kind() == Kind::Float);

        // a solid red image keeps its channel values after resizing
        let red_max = f64::from(&tensor.i((0, .., ..)).max());
        let other_max = f64::from(&tensor.i((1.., .., ..)).max());
        ensure!(abs_diff_eq!(red_max, 1.0, epsilon = 1e-6));
        ensure!(abs_diff_eq!(other_max, 0.0, epsilon = 1e-6));

        Ok(())
    }

    #[test]
    fn decode_matches_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.png");
        RgbImage::from_pixel(20, 20, Rgb([10, 20, 30])).save(&path)?;

        let loader = ImageLoader::new(8, None)?;
        let from_file = loader.load(&path)?;
        let from_bytes = loader.decode(&fs::read(&path)?)?;
        ensure!(bool::from(from_file.eq_tensor(&from_bytes).all()));

        Ok(())
    }

    #[test]
    fn preprocess_adds_batch_dimension() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.png");
        RgbImage::from_pixel(9, 7, Rgb([0, 0, 0])).save(&path)?;

        let loader = ImageLoader::new(12, None)?;
        let batch = loader.preprocess(&fs::read(&path)?)?;
        ensure!(batch.size4()? == (1, 3, 12, 12));

        Ok(())
    }

    #[test]
    fn undecodable_data_is_an_error() -> Result<()> {
        let loader = ImageLoader::new(8, None)?;
        ensure!(loader.decode(b"not an image").is_err());
        Ok(())
    }
}
