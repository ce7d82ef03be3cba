//! The mapping between class names and dense class indexes.

use crate::{annotation::canonicalize, common::*};

/// A bijective mapping between canonical class names and indexes `0..N`.
///
/// The map is created from an ordered class list at training time and
/// persisted as a JSON object from class name to index. Every consumer of a
/// trained model loads the persisted map instead of re-deriving the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndexMap {
    classes: IndexSet<String>,
}

impl ClassIndexMap {
    /// Loads an ordered class list file, one class name per line. The line
    /// order defines the class index.
    pub fn load_classes_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read classes file '{}'", path.display()))?;
        let lines: Vec<_> = content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();
        let classes: IndexSet<String> = lines.iter().map(|line| canonicalize(line)).collect();
        ensure!(
            lines.len() == classes.len(),
            "duplicated class names found in '{}'",
            path.display()
        );
        ensure!(
            !classes.is_empty(),
            "no classes found in '{}'",
            path.display()
        );
        Ok(Self { classes })
    }

    /// Loads a persisted class index file written by [save](Self::save).
    pub fn load_index_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read class index file '{}'", path.display()))?;
        let index_map: HashMap<String, usize> = serde_json::from_str(&content)
            .with_context(|| format!("malformed class index file '{}'", path.display()))?;
        Self::from_index_map(index_map)
            .with_context(|| format!("invalid class index file '{}'", path.display()))
    }

    /// Builds the map from explicit name-to-index assignments. The indexes
    /// must cover `0..N` without gaps or duplicates.
    pub fn from_index_map(index_map: HashMap<String, usize>) -> Result<Self> {
        ensure!(!index_map.is_empty(), "the class index map must not be empty");

        let num_classes = index_map.len();
        let mut slots: Vec<Option<String>> = vec![None; num_classes];

        for (name, index) in index_map {
            ensure!(
                name == canonicalize(&name),
                "the class name '{}' is not in canonical form",
                name
            );
            ensure!(
                index < num_classes,
                "the class index {} of '{}' is out of range, expect indexes within 0..{}",
                index,
                name,
                num_classes
            );
            ensure!(
                slots[index].is_none(),
                "the class index {} is assigned more than once",
                index
            );
            slots[index] = Some(name);
        }

        let classes: IndexSet<String> = slots.into_iter().flatten().collect();
        ensure!(
            classes.len() == num_classes,
            "the class indexes do not cover 0..{}",
            num_classes
        );

        Ok(Self { classes })
    }

    /// Writes the map as a JSON object from class name to index.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let index_map: BTreeMap<&str, usize> = self
            .classes
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_str(), index))
            .collect();
        let text = serde_json::to_string_pretty(&index_map)?;
        fs::write(path, text)
            .with_context(|| format!("failed to write class index file '{}'", path.display()))?;
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn get_index(&self, class: &str) -> Option<usize> {
        self.classes.get_index_of(class)
    }

    pub fn get_class(&self, index: usize) -> Option<&str> {
        self.classes.get_index(index).map(|name| name.as_str())
    }

    /// Iterates class names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|name| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_file_defines_index_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let classes_file = dir.path().join("classes.txt");
        fs::write(&classes_file, "egg\nWhole Egg Boiled\nmilk\n")?;

        let classes = ClassIndexMap::load_classes_file(&classes_file)?;
        ensure!(classes.num_classes() == 3);
        ensure!(classes.get_index("egg") == Some(0));
        ensure!(classes.get_index("whole_egg_boiled") == Some(1));
        ensure!(classes.get_index("milk") == Some(2));
        ensure!(classes.get_class(1) == Some("whole_egg_boiled"));
        ensure!(classes.get_index("pizza") == None);

        Ok(())
    }

    #[test]
    fn duplicated_classes_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let classes_file = dir.path().join("classes.txt");
        fs::write(&classes_file, "egg\nmilk\nEgg\n")?;
        ensure!(ClassIndexMap::load_classes_file(&classes_file).is_err());
        Ok(())
    }

    #[test]
    fn index_map_must_be_dense() -> Result<()> {
        let dense: HashMap<String, usize> = vec![("egg", 0), ("milk", 1), ("pizza", 2)]
            .into_iter()
            .map(|(name, index)| (name.to_owned(), index))
            .collect();
        ensure!(ClassIndexMap::from_index_map(dense).is_ok());

        let gap: HashMap<String, usize> = vec![("egg", 0), ("milk", 2)]
            .into_iter()
            .map(|(name, index)| (name.to_owned(), index))
            .collect();
        ensure!(ClassIndexMap::from_index_map(gap).is_err());

        let duplicate: HashMap<String, usize> = vec![("egg", 0), ("milk", 0)]
            .into_iter()
            .map(|(name, index)| (name.to_owned(), index))
            .collect();
        ensure!(ClassIndexMap::from_index_map(duplicate).is_err());

        let out_of_range: HashMap<String, usize> = vec![("egg", 1)]
            .into_iter()
            .map(|(name, index)| (name.to_owned(), index))
            .collect();
        ensure!(ClassIndexMap::from_index_map(out_of_range).is_err());

        ensure!(ClassIndexMap::from_index_map(HashMap::new()).is_err());

        Ok(())
    }

    #[test]
    fn save_and_load_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let classes_file = dir.path().join("classes.txt");
        let index_file = dir.path().join("class_indices.json");
        fs::write(&classes_file, "cheese\negg\nmilk\n")?;

        let classes = ClassIndexMap::load_classes_file(&classes_file)?;
        classes.save(&index_file)?;
        let reloaded = ClassIndexMap::load_index_file(&index_file)?;
        ensure!(classes == reloaded);

        Ok(())
    }
}
