//! Batched access to a labeled image dataset.

use crate::{
    annotation::{self, Annotation},
    classes::ClassIndexMap,
    common::*,
    processor::{BatchAugmentor, ImageLoader},
};

/// Batch generator options.
#[derive(Debug)]
pub struct BatchGeneratorInit {
    /// Directory holding the images and the `_annotations.csv` file.
    pub dataset_dir: PathBuf,
    pub classes: Arc<ClassIndexMap>,
    pub batch_size: NonZeroUsize,
    pub loader: ImageLoader,
    /// Optional augmentation applied to every generated image batch.
    pub augmentor: Option<BatchAugmentor>,
}

impl BatchGeneratorInit {
    pub fn build(self) -> Result<BatchGenerator> {
        let Self {
            dataset_dir,
            classes,
            batch_size,
            loader,
            augmentor,
        } = self;

        let annotations = annotation::load_annotations(&dataset_dir)?;

        Ok(BatchGenerator {
            annotations,
            image_dir: dataset_dir,
            classes,
            batch_size,
            loader,
            augmentor,
        })
    }
}

/// An indexable sequence of image and label batches over one dataset split.
///
/// Images that cannot be read or decoded are skipped with a warning, so a
/// batch may carry fewer samples than `batch_size`, down to none. Image and
/// label batches always have matching lengths.
#[derive(Debug)]
pub struct BatchGenerator {
    annotations: Vec<Annotation>,
    image_dir: PathBuf,
    classes: Arc<ClassIndexMap>,
    batch_size: NonZeroUsize,
    loader: ImageLoader,
    augmentor: Option<BatchAugmentor>,
}

impl BatchGenerator {
    /// The number of batches per epoch, including the trailing partial
    /// batch.
    pub fn num_batches(&self) -> usize {
        let batch_size = self.batch_size.get();
        (self.annotations.len() + batch_size - 1) / batch_size
    }

    pub fn num_samples(&self) -> usize {
        self.annotations.len()
    }

    pub fn classes(&self) -> &ClassIndexMap {
        &self.classes
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Loads the batch at `index` as an image tensor of shape
    /// `[len, channels, size, size]` and a one-hot label tensor of shape
    /// `[len, num_classes]`, both on the loader device.
    ///
    /// A class name absent from the class index map is an error. An
    /// unreadable image only shrinks the batch.
    pub fn batch(&self, index: usize) -> Result<(Tensor, Tensor)> {
        let num_batches = self.num_batches();
        ensure!(
            index < num_batches,
            "the batch index {} is out of range, the generator has {} batches",
            index,
            num_batches
        );

        let batch_size = self.batch_size.get();
        let start = index * batch_size;
        let end = cmp::min(start + batch_size, self.annotations.len());

        let mut images = vec![];
        let mut class_indexes = vec![];

        for Annotation { filename, class } in &self.annotations[start..end] {
            let class_index = self.classes.get_index(class).ok_or_else(|| {
                format_err!(
                    "the class '{}' of '{}' is not listed in the class index map",
                    class,
                    filename
                )
            })?;

            let image_file = self.image_dir.join(filename);
            let image = match self.loader.load(&image_file) {
                Ok(image) => image,
                Err(err) => {
                    warn!("skipping sample '{}': {:#}", image_file.display(), err);
                    continue;
                }
            };

            images.push(image);
            class_indexes.push(class_index as i64);
        }

        let device = self.loader.device();
        let (images, labels) = if images.is_empty() {
            let size = self.loader.image_size() as i64;
            let channels = self.loader.image_channels() as i64;
            let num_classes = self.classes.num_classes() as i64;
            (
                Tensor::zeros(&[0, channels, size, size], (Kind::Float, device)),
                Tensor::zeros(&[0, num_classes], (Kind::Float, device)),
            )
        } else {
            let images = Tensor::stack(&images, 0);
            let class_indexes = Tensor::of_slice(&class_indexes).to_device(device);
            let labels = Tensor::eye(self.classes.num_classes() as i64, (Kind::Float, device))
                .index_select(0, &class_indexes);
            (images, labels)
        };

        let images = match &self.augmentor {
            Some(augmentor) => augmentor.forward(&images)?,
            None => images,
        };

        Ok((images, labels))
    }

    /// Reshuffles the sample order. Training drivers call this between
    /// epochs; evaluation never does.
    pub fn on_epoch_end(&mut self) {
        let mut rng = StdRng::from_entropy();
        self.annotations.shuffle(&mut rng);
    }
}
