//! Evaluation configuration format.

use crate::common::*;

pub use config_::*;
pub use dataset_::*;
pub use model_::*;
pub use output_::*;

mod config_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Config {
        pub dataset: Dataset,
        pub model: Model,
        #[serde(default)]
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
        /// The directory of evaluation images along with an annotation file.
        pub dir: PathBuf,
        #[serde(default = "defaults::image_size")]
        pub image_size: NonZeroUsize,
        #[serde(default = "defaults::batch_size")]
        pub batch_size: NonZeroUsize,
    }
}

mod model_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Model {
        /// The trained model weights.
        pub weights_file: PathBuf,
        /// The class index map saved along with the weights.
        pub class_index_file: PathBuf,
        #[serde(with = "tch_serde::serde_device", default = "defaults::device")]
        pub device: Device,
    }
}

mod output_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Output {
        /// The file the evaluation report is written to.
        #[serde(default = "defaults::metrics_file")]
        pub metrics_file: PathBuf,
    }

    impl Default for Output {
        fn default() -> Self {
            Self {
                metrics_file: defaults::metrics_file(),
            }
        }
    }
}

mod defaults {
    use super::*;

    pub fn image_size() -> NonZeroUsize {
        NonZeroUsize::new(416).unwrap()
    }

    pub fn batch_size() -> NonZeroUsize {
        NonZeroUsize::new(16).unwrap()
    }

    pub fn device() -> Device {
        Device::cuda_if_available()
    }

    pub fn metrics_file() -> PathBuf {
        PathBuf::from("metrics.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() -> Result<()> {
        let text = r#"{
            dataset: {
                dir: "data/test",
            },
            model: {
                weights_file: "output/model.ot",
                class_index_file: "output/class_indices.json",
                device: "cpu",
            },
        }"#;
        let config: Config = json5::from_str(text)?;

        ensure!(config.dataset.image_size.get() == 416);
        ensure!(config.dataset.batch_size.get() == 16);
        ensure!(config.model.device == Device::Cpu);
        ensure!(config.output.metrics_file == PathBuf::from("metrics.json"));
        Ok(())
    }
}
