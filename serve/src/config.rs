//! Serving configuration format.

use crate::common::*;

pub use config_::*;
pub use model_::*;
pub use server_::*;

mod config_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Config {
        pub model: Model,
        #[serde(default)]
        pub server: Server,
    }

    impl Config {
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let text = fs::read_to_string(path)?;
            let config = json5::from_str(&text)?;
            Ok(config)
        }
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
        /// The class-to-allergen lookup table.
        pub allergen_file: PathBuf,
        #[serde(default = "defaults::image_size")]
        pub image_size: NonZeroUsize,
        #[serde(with = "tch_serde::serde_device", default = "defaults::device")]
        pub device: Device,
    }
}

mod server_ {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Server {
        #[serde(default = "defaults::address")]
        pub address: String,
        #[serde(default = "defaults::port")]
        pub port: u16,
        /// The per-request budget for one inference call.
        #[serde(default = "defaults::inference_timeout_secs")]
        pub inference_timeout_secs: u64,
    }

    impl Default for Server {
        fn default() -> Self {
            Self {
                address: defaults::address(),
                port: defaults::port(),
                inference_timeout_secs: defaults::inference_timeout_secs(),
            }
        }
    }
}

mod defaults {
    use super::*;

    pub fn image_size() -> NonZeroUsize {
        NonZeroUsize::new(416).unwrap()
    }

    pub fn device() -> Device {
        Device::cuda_if_available()
    }

    pub fn address() -> String {
        "0.0.0.0".to_owned()
    }

    pub fn port() -> u16 {
        5000
    }

    pub fn inference_timeout_secs() -> u64 {
        30
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() -> Result<()> {
        let text = r#"{
            model: {
                weights_file: "output/model.ot",
                class_index_file: "output/class_indices.json",
                allergen_file: "data/class_allergen_map.json",
                device: "cpu",
            },
        }"#;
        let config: Config = json5::from_str(text)?;

        ensure!(config.model.image_size.get() == 416);
        ensure!(config.model.device == Device::Cpu);
        ensure!(config.server.address == "0.0.0.0");
        ensure!(config.server.port == 5000);
        ensure!(config.server.inference_timeout_secs == 30);
        Ok(())
    }
}
