//! The static mapping from food classes to allergen information.

use crate::{classes::ClassIndexMap, common::*};

/// Allergen information attached to one food class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergenRecord {
    pub allergen: String,
    pub description: String,
}

/// Read-only lookup table from canonical class labels to allergen records.
#[derive(Debug, Clone)]
pub struct AllergenMap {
    records: HashMap<String, AllergenRecord>,
}

impl AllergenMap {
    /// Loads the allergen map from a JSON file keyed by canonical class
    /// labels.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read allergen file '{}'", path.display()))?;
        let records: HashMap<String, AllergenRecord> = serde_json::from_str(&content)
            .with_context(|| format!("malformed allergen file '{}'", path.display()))?;
        Self::from_records(records)
            .with_context(|| format!("invalid allergen file '{}'", path.display()))
    }

    pub fn from_records(records: HashMap<String, AllergenRecord>) -> Result<Self> {
        ensure!(!records.is_empty(), "the allergen map must not be empty");
        Ok(Self { records })
    }

    pub fn get(&self, class: &str) -> Option<&AllergenRecord> {
        self.records.get(class)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Checks that every class of the index map has an allergen record.
    ///
    /// A missing record means the shipped data files drifted apart, so the
    /// caller is expected to fail at startup rather than serve requests.
    pub fn validate_against(&self, classes: &ClassIndexMap) -> Result<()> {
        for class in classes.iter() {
            ensure!(
                self.records.contains_key(class),
                "the class '{}' has no allergen record",
                class
            );
        }
        Ok(())
    }
}
