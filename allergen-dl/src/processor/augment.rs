//! Randomized batch augmentation for training.

use crate::common::*;

/// Augmentation options. Ranges are inclusive maxima of the sampled
/// magnitudes. Zero-valued options are treated as disabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchAugmentorInit {
    /// Maximal rotation in degrees.
    pub rotate_degrees: Option<R64>,
    /// Maximal horizontal and vertical shift as a fraction of the image
    /// size.
    pub shift: Option<R64>,
    /// Maximal horizontal shear factor.
    pub shear: Option<R64>,
    /// Maximal zoom deviation; a value `z` samples zoom factors within
    /// `1 - z ..= 1 + z`.
    pub zoom: Option<R64>,
    pub horizontal_flip: bool,
}

impl BatchAugmentorInit {
    pub fn build(self) -> Result<BatchAugmentor> {
        let Self {
            rotate_degrees,
            shift,
            shear,
            zoom,
            horizontal_flip,
        } = self;

        let rotate_radians = rotate_degrees
            .map(|val| {
                ensure!(val >= 0.0, "rotate_degrees must be non-negative");
                Ok(val.raw().to_radians())
            })
            .transpose()?
            .filter(|&val| val > 0.0);
        let shift = shift
            .map(|val| {
                ensure!(val >= 0.0, "shift must be non-negative");
                Ok(val.raw())
            })
            .transpose()?
            .filter(|&val| val > 0.0);
        let shear = shear
            .map(|val| {
                ensure!(val >= 0.0, "shear must be non-negative");
                Ok(val.raw())
            })
            .transpose()?
            .filter(|&val| val > 0.0);
        let zoom = zoom
            .map(|val| {
                ensure!(
                    (0.0..1.0).contains(&val.raw()),
                    "zoom must be within 0.0..1.0"
                );
                Ok(val.raw())
            })
            .transpose()?
            .filter(|&val| val > 0.0)
            .map(|val| (1.0 - val, 1.0 + val));

        Ok(BatchAugmentor {
            rotate_radians,
            shift,
            shear,
            zoom,
            horizontal_flip,
        })
    }
}

impl Default for BatchAugmentorInit {
    fn default() -> Self {
        Self {
            rotate_degrees: None,
            shift: None,
            shear: None,
            zoom: None,
            horizontal_flip: false,
        }
    }
}

/// Applies randomized affine transforms plus quarter-turn rotations to an
/// image batch.
#[derive(Debug, Clone)]
pub struct BatchAugmentor {
    rotate_radians: Option<f64>,
    shift: Option<f64>,
    shear: Option<f64>,
    zoom: Option<(f64, f64)>,
    horizontal_flip: bool,
}

impl BatchAugmentor {
    /// Transforms a `[batch, channels, height, width]` image batch. Every
    /// image samples its own transform parameters. The batch shape is
    /// preserved.
    pub fn forward(&self, images: &Tensor) -> Result<Tensor> {
        tch::no_grad(|| {
            let (bsize, channels, height, width) = images.size4()?;
            if bsize == 0 {
                return Ok(images.shallow_clone());
            }

            let device = images.device();
            let mut rng = StdRng::from_entropy();

            // sample affine transforms per image
            let affine_transforms: Vec<_> = (0..bsize)
                .map(|_| self.affine_transform(&mut rng, device))
                .collect();

            let batch_affine_transform = Tensor::stack(&affine_transforms, 0);
            let affine_grid = Tensor::affine_grid_generator(
                &batch_affine_transform.i((.., 0..2, ..)), // remove the last row
                &[bsize, channels, height, width],
                false,
            );

            let sampled = images.grid_sampler(
                &affine_grid,
                // See https://github.com/pytorch/pytorch/blob/f597ac6efc70431e66d945c16fa12b767989b032/aten/src/ATen/native/GridSampler.h#L10-L11
                // 0 is bilinear interpolation, 1 is border padding.
                0,
                1,
                false,
            );

            // cascaded quarter-turn stages per image
            let rotated: Vec<_> = (0..bsize)
                .map(|index| {
                    let image = sampled.i((index, .., .., ..));
                    match rotation_stage(&mut rng) {
                        Some(quarter_turns) => image.rot90(quarter_turns, &[1, 2]),
                        None => image,
                    }
                })
                .collect();

            Ok(Tensor::stack(&rotated, 0).set_requires_grad(false))
        })
    }

    fn affine_transform(&self, rng: &mut StdRng, device: Device) -> Tensor {
        let transform = Tensor::eye(3, FLOAT_CPU);
        let transform = if self.horizontal_flip && rng.gen::<bool>() {
            let flip = Tensor::of_slice(&[
                -1.0f32, 0.0, 0.0, // row 1
                0.0, 1.0, 0.0, // row 2
                0.0, 0.0, 1.0, // row 3
            ])
            .view([3, 3]);
            flip.matmul(&transform)
        } else {
            transform
        };
        let transform = match self.zoom {
            Some((lower, upper)) => {
                let ratio = rng.gen_range(lower..upper) as f32;
                let scaling = Tensor::of_slice(&[
                    ratio, 0.0, 0.0, // row 1
                    0.0, ratio, 0.0, // row 2
                    0.0, 0.0, 1.0, // row 3
                ])
                .view([3, 3]);
                scaling.matmul(&transform)
            }
            None => transform,
        };
        let transform = match self.shear {
            Some(max_shear) => {
                let shear = rng.gen_range(-max_shear..max_shear) as f32;
                let shearing = Tensor::of_slice(&[
                    1.0, shear, 0.0, // row 1
                    0.0, 1.0, 0.0, // row 2
                    0.0, 0.0, 1.0, // row 3
                ])
                .view([3, 3]);
                shearing.matmul(&transform)
            }
            None => transform,
        };
        let transform = match self.rotate_radians {
            Some(max_radians) => {
                let angle = rng.gen_range(-max_radians..max_radians);
                let cos = angle.cos() as f32;
                let sin = angle.sin() as f32;
                let rotation = Tensor::of_slice(&[
                    cos, -sin, 0.0, // row 1
                    sin, cos, 0.0, // row 2
                    0.0, 0.0, 1.0, // row 3
                ])
                .view([3, 3]);
                rotation.matmul(&transform)
            }
            None => transform,
        };
        let transform = match self.shift {
            Some(max_shift) => {
                // grid coordinates are normalized to [-1, 1], so a whole
                // image spans 2 units
                let horizontal = (rng.gen_range(-max_shift..max_shift) * 2.0) as f32;
                let vertical = (rng.gen_range(-max_shift..max_shift) * 2.0) as f32;
                let translation = Tensor::of_slice(&[
                    1.0, 0.0, horizontal, // row 1
                    0.0, 1.0, vertical, // row 2
                    0.0, 0.0, 1.0, // row 3
                ])
                .view([3, 3]);
                translation.matmul(&transform)
            }
            None => transform,
        };

        transform.to_device(device)
    }
}

/// Samples the number of quarter turns applied to one image.
///
/// The stages are tried in order with independent draws and the first stage
/// that fires wins: one quarter turn with probability 0.25, two with
/// 0.75 * 0.25, three with 0.75 * 0.75 * 0.25, otherwise none.
fn rotation_stage(rng: &mut impl Rng) -> Option<i64> {
    if rng.gen::<f64>() < 0.25 {
        Some(1)
    } else if rng.gen::<f64>() < 0.25 {
        Some(2)
    } else if rng.gen::<f64>() < 0.25 {
        Some(3)
    } else {
        None
    }
}
