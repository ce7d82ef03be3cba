//! Training configuration format.

use crate::common::*;

pub use augment_::*;
pub use config_::*;
pub use dataset_::*;
pub use output_::*;
pub use training_::*;

mod config_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Config {
        pub dataset: Dataset,
        #[serde(default)]
        pub augment: Augment,
        #[serde(default)]
        pub training: Training,
        pub output: Output,
    }

    impl Config {
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let text = fs::read_to_string(path)?;
            let config = json5::from_str(&text)?;
            Ok(config)
        }
    }
}

mod dataset_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Dataset {
        /// The directory of training images along with an annotation file.
        pub train_dir: PathBuf,
        /// The directory of validation images along with an annotation file.
        pub valid_dir: PathBuf,
        /// The file listing one class name per line.
        pub classes_file: PathBuf,
        #[serde(default = "defaults::image_size")]
        pub image_size: NonZeroUsize,
        #[serde(default = "defaults::batch_size")]
        pub batch_size: NonZeroUsize,
    }
}

mod augment_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Augment {
        /// The maximum rotation in degrees.
        pub rotate_degrees: Option<R64>,
        /// The maximum translation along both axes, as a ratio of the image size.
        pub shift: Option<R64>,
        /// The maximum horizontal shear factor.
        pub shear: Option<R64>,
        /// The maximum zoom ratio, so that scaling is sampled in `1 ± zoom`.
        pub zoom: Option<R64>,
        #[serde(default = "defaults::bool_false")]
        pub horizontal_flip: bool,
    }

    impl Augment {
        pub fn augmentor(&self) -> Result<BatchAugmentor> {
            let Self {
                rotate_degrees,
                shift,
                shear,
                zoom,
                horizontal_flip,
            } = *self;

            BatchAugmentorInit {
                rotate_degrees,
                shift,
                shear,
                zoom,
                horizontal_flip,
            }
            .build()
        }
    }

    impl Default for Augment {
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
}

mod training_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Training {
        #[serde(default = "defaults::epochs")]
        pub epochs: NonZeroUsize,
        #[serde(default = "defaults::initial_lr")]
        pub initial_lr: R64,
        /// The learning rate is multiplied by this factor when the
        /// validation loss stops improving.
        #[serde(default = "defaults::lr_factor")]
        pub lr_factor: R64,
        /// The number of stalled epochs tolerated before the learning
        /// rate is reduced.
        #[serde(default = "defaults::lr_patience")]
        pub lr_patience: NonZeroUsize,
        #[serde(default = "defaults::min_lr")]
        pub min_lr: R64,
        /// The number of stalled epochs tolerated before training stops.
        #[serde(default = "defaults::early_stopping_patience")]
        pub early_stopping_patience: NonZeroUsize,
        #[serde(with = "tch_serde::serde_device", default = "defaults::device")]
        pub device: Device,
    }

    impl Default for Training {
        fn default() -> Self {
            Self {
                epochs: defaults::epochs(),
                initial_lr: defaults::initial_lr(),
                lr_factor: defaults::lr_factor(),
                lr_patience: defaults::lr_patience(),
                min_lr: defaults::min_lr(),
                early_stopping_patience: defaults::early_stopping_patience(),
                device: defaults::device(),
            }
        }
    }
}

mod output_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Output {
        /// The directory where a timestamped session directory is created.
        pub dir: PathBuf,
    }
}

mod defaults {
    use super::*;

    pub fn bool_false() -> bool {
        false
    }

    pub fn image_size() -> NonZeroUsize {
        NonZeroUsize::new(416).unwrap()
    }

    pub fn batch_size() -> NonZeroUsize {
        NonZeroUsize::new(16).unwrap()
    }

    pub fn epochs() -> NonZeroUsize {
        NonZeroUsize::new(20).unwrap()
    }

    pub fn initial_lr() -> R64 {
        R64::new(0.0001)
    }

    pub fn lr_factor() -> R64 {
        R64::new(0.2)
    }

    pub fn lr_patience() -> NonZeroUsize {
        NonZeroUsize::new(3).unwrap()
    }

    pub fn min_lr() -> R64 {
        R64::new(0.00001)
    }

    pub fn early_stopping_patience() -> NonZeroUsize {
        NonZeroUsize::new(10).unwrap()
    }

    pub fn device() -> Device {
        Device::cuda_if_available()
    }
}
