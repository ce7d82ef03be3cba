//! The shared serving state.

use crate::{common::*, config::Config};
use tokio::sync::Mutex;

pub type AppState = Arc<AppContext>;

/// Everything one request needs, loaded once at startup.
///
/// The classifier sits behind a mutex so that concurrent requests take
/// turns instead of assuming the model is reentrant.
pub struct AppContext {
    classifier: Mutex<Classifier>,
    classes: ClassIndexMap,
    allergens: AllergenMap,
    loader: ImageLoader,
    inference_timeout: Duration,
}

impl AppContext {
    /// Loads every model artifact named by the configuration.
    pub fn load(config: &Config) -> Result<Self> {
        let classes = ClassIndexMap::load_index_file(&config.model.class_index_file)?;
        let allergens = AllergenMap::open(&config.model.allergen_file)?;
        let classifier = Classifier::load(
            &config.model.weights_file,
            classes.num_classes(),
            config.model.device,
        )?;
        let loader = ImageLoader::new(config.model.image_size.get(), None)?;

        Self::from_parts(
            classifier,
            classes,
            allergens,
            loader,
            Duration::from_secs(config.server.inference_timeout_secs),
        )
    }

    /// Assembles a context from already loaded parts, checking that the
    /// classifier, the class index map and the allergen map agree.
    pub fn from_parts(
        classifier: Classifier,
        classes: ClassIndexMap,
        allergens: AllergenMap,
        loader: ImageLoader,
        inference_timeout: Duration,
    ) -> Result<Self> {
        ensure!(
            classifier.num_classes() == classes.num_classes(),
            "the classifier predicts {} classes, but the class index map lists {}",
            classifier.num_classes(),
            classes.num_classes()
        );
        allergens.validate_against(&classes)?;

        Ok(Self {
            classifier: Mutex::new(classifier),
            classes,
            allergens,
            loader,
            inference_timeout,
        })
    }

    pub fn classifier(&self) -> &Mutex<Classifier> {
        &self.classifier
    }

    pub fn classes(&self) -> &ClassIndexMap {
        &self.classes
    }

    pub fn allergens(&self) -> &AllergenMap {
        &self.allergens
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn inference_timeout(&self) -> Duration {
        self.inference_timeout
    }
}
