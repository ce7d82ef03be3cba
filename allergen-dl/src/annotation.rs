//! Annotation files of labeled food images.

use crate::common::*;

pub const ANNOTATION_FILE_NAME: &str = "_annotations.csv";

/// One labeled image from an annotation file.
///
/// The class name is stored in canonical form. Bounding box columns in the
/// source file are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Annotation {
    pub filename: String,
    pub class: String,
}

/// Converts a class label to its canonical form: trimmed, lowercased, with
/// spaces replaced by underscores.
pub fn canonicalize(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Loads the `_annotations.csv` file of a dataset directory.
///
/// Class names are canonicalized. A missing annotation file or a malformed
/// row is an error.
pub fn load_annotations(dataset_dir: impl AsRef<Path>) -> Result<Vec<Annotation>> {
    let dataset_dir = dataset_dir.as_ref();
    let annotation_file = dataset_dir.join(ANNOTATION_FILE_NAME);
    ensure!(
        annotation_file.is_file(),
        "the annotation file '{}' does not exist",
        annotation_file.display()
    );

    let annotations: Vec<Annotation> = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&annotation_file)
        .with_context(|| format!("failed to open '{}'", annotation_file.display()))?
        .deserialize()
        .try_collect()
        .with_context(|| format!("malformed annotation in '{}'", annotation_file.display()))?;

    let annotations: Vec<_> = annotations
        .into_iter()
        .map(|Annotation { filename, class }| Annotation {
            filename,
            class: canonicalize(&class),
        })
        .collect();

    Ok(annotations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_labels() -> Result<()> {
        ensure!(canonicalize(" Egg ") == "egg");
        ensure!(canonicalize("Milk Based Beverage") == "milk_based_beverage");
        ensure!(canonicalize("pizza") == "pizza");

        // canonicalization is idempotent
        for name in [" Egg ", "Whole Egg Boiled", "ICECREAM", "bread_loaf"] {
            let once = canonicalize(name);
            ensure!(canonicalize(&once) == once);
        }

        Ok(())
    }

    #[test]
    fn load_annotations_from_csv() -> Result<()> {
        let dataset_dir = tempfile::tempdir()?;
        fs::write(
            dataset_dir.path().join(ANNOTATION_FILE_NAME),
            "filename,width,height,class,xmin,ymin,xmax,ymax\n\
             001.jpg,416,416, Egg ,10,10,100,100\n\
             002.jpg,416,416,Milk Based Beverage,20,20,200,200\n",
        )?;

        let annotations = load_annotations(dataset_dir.path())?;
        ensure!(annotations.len() == 2);
        ensure!(annotations[0].filename == "001.jpg");
        ensure!(annotations[0].class == "egg");
        ensure!(annotations[1].class == "milk_based_beverage");

        Ok(())
    }

    #[test]
    fn missing_annotation_file() -> Result<()> {
        let dataset_dir = tempfile::tempdir()?;
        ensure!(load_annotations(dataset_dir.path()).is_err());
        Ok(())
    }
}
