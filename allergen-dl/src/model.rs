//! The food image classifier and its prediction types.

use crate::{classes::ClassIndexMap, common::*};

/// Smallest top confidence, in percent, for a prediction to count as a
/// detection. Confidences are compared after rounding to two decimals.
pub const DETECTION_THRESHOLD_PERCENT: f64 = 35.0;

/// ResNet-50 image classifier with its weight store.
pub struct Classifier {
    vs: nn::VarStore,
    net: nn::FuncT<'static>,
    num_classes: usize,
}

impl Classifier {
    /// Creates a classifier with freshly initialized weights.
    pub fn new(num_classes: usize, device: Device) -> Result<Self> {
        ensure!(num_classes > 0, "num_classes must be positive");

        let vs = nn::VarStore::new(device);
        let net = vision::resnet::resnet50(&vs.root(), num_classes as i64);

        Ok(Self {
            vs,
            net,
            num_classes,
        })
    }

    /// Creates a classifier and loads trained weights.
    pub fn load(
        weights_file: impl AsRef<Path>,
        num_classes: usize,
        device: Device,
    ) -> Result<Self> {
        let weights_file = weights_file.as_ref();
        let mut classifier = Self::new(num_classes, device)?;
        classifier.vs.load(weights_file).with_context(|| {
            format!(
                "failed to load model weights from '{}'",
                weights_file.display()
            )
        })?;
        Ok(classifier)
    }

    pub fn save(&self, weights_file: impl AsRef<Path>) -> Result<()> {
        let weights_file = weights_file.as_ref();
        self.vs.save(weights_file).with_context(|| {
            format!(
                "failed to save model weights to '{}'",
                weights_file.display()
            )
        })?;
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    /// Computes class logits for a `[batch, 3, size, size]` image batch.
    pub fn forward_t(&self, images: &Tensor, train: bool) -> Tensor {
        self.net.forward_t(images, train)
    }

    /// Computes per-class probabilities without tracking gradients.
    pub fn predict(&self, images: &Tensor) -> Tensor {
        tch::no_grad(|| self.net.forward_t(images, false).softmax(-1, Kind::Float))
    }
}

/// Confidence of one class in percent, rounded to two decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassConfidence {
    pub label: String,
    pub percent: f64,
}

impl ClassConfidence {
    /// Formats the confidence in the `xx.xx%` client format.
    pub fn formatted(&self) -> String {
        format!("{:.2}%", self.percent)
    }
}

/// The outcome of classifying one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The class with the highest probability.
    pub label: String,
    /// Per-class confidences in class index order.
    pub confidences: Vec<ClassConfidence>,
}

impl Prediction {
    /// Builds a prediction from one row of class probabilities.
    ///
    /// The confidence list follows the class index order rather than the
    /// probability order.
    pub fn from_probabilities(probabilities: &Tensor, classes: &ClassIndexMap) -> Result<Self> {
        let num_entries = probabilities.size1()?;
        ensure!(
            num_entries == classes.num_classes() as i64,
            "expect {} class probabilities, but get {}",
            classes.num_classes(),
            num_entries
        );

        let probabilities = probabilities.to_device(Device::Cpu).to_kind(Kind::Float);
        let (_, max_index) = probabilities.max_dim(0, false);
        let max_index = i64::from(&max_index) as usize;
        let label = classes
            .get_class(max_index)
            .ok_or_else(|| format_err!("no class at index {}", max_index))?
            .to_owned();

        let confidences: Vec<_> = Vec::<f32>::from(&probabilities)
            .into_iter()
            .zip_eq(classes.iter())
            .map(|(probability, class)| ClassConfidence {
                label: class.to_owned(),
                percent: round_percent(probability as f64 * 100.0),
            })
            .collect();

        Ok(Self { label, confidences })
    }

    /// The highest rounded class confidence in percent.
    pub fn max_percent(&self) -> f64 {
        self.confidences
            .iter()
            .map(|confidence| confidence.percent)
            .fold(0.0, f64::max)
    }

    /// Whether the prediction reaches [DETECTION_THRESHOLD_PERCENT].
    /// Confidences strictly below the threshold do not count.
    pub fn is_detection(&self) -> bool {
        self.max_percent() >= DETECTION_THRESHOLD_PERCENT
    }
}

/// Rounds a percent value to two decimals, matching the `xx.xx%` format
/// served to clients.
pub fn round_percent(percent: f64) -> f64 {
    (percent * 100.0).round() / 100.0
}
