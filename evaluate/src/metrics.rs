//! Classification metrics.

use crate::common::*;

pub use confusion_matrix::*;
pub use report::*;

mod confusion_matrix {
    use super::*;

    /// A square matrix of prediction counts indexed by actual class first
    /// and predicted class second.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ConfusionMatrix {
        counts: Vec<Vec<usize>>,
    }

    impl ConfusionMatrix {
        pub fn new(num_classes: usize) -> Result<Self> {
            ensure!(
                num_classes > 0,
                "num_classes must be positive, but get {}",
                num_classes
            );
            Ok(Self {
                counts: vec![vec![0; num_classes]; num_classes],
            })
        }

        pub fn num_classes(&self) -> usize {
            self.counts.len()
        }

        /// Records one classified sample.
        pub fn add(&mut self, actual: usize, predicted: usize) -> Result<()> {
            let num_classes = self.num_classes();
            ensure!(
                actual < num_classes && predicted < num_classes,
                "the class pair ({}, {}) is out of range, expect indexes within 0..{}",
                actual,
                predicted,
                num_classes
            );
            self.counts[actual][predicted] += 1;
            Ok(())
        }

        pub fn count(&self, actual: usize, predicted: usize) -> Option<usize> {
            self.counts.get(actual)?.get(predicted).copied()
        }

        pub fn counts(&self) -> &[Vec<usize>] {
            &self.counts
        }

        pub fn total(&self) -> usize {
            self.counts.iter().flatten().sum()
        }

        /// The ratio of correctly classified samples, or zero for an empty
        /// matrix.
        pub fn accuracy(&self) -> f64 {
            let total = self.total();
            if total == 0 {
                return 0.0;
            }
            let correct: usize = (0..self.num_classes()).map(|index| self.counts[index][index]).sum();
            correct as f64 / total as f64
        }

        /// Computes precision, recall and F1 of one class. Ratios with a zero
        /// denominator are reported as zero.
        pub fn class_metrics(&self, index: usize) -> Option<ClassMetrics> {
            let num_classes = self.num_classes();
            if index >= num_classes {
                return None;
            }

            let true_positives = self.counts[index][index];
            let support: usize = self.counts[index].iter().sum();
            let predicted: usize = (0..num_classes).map(|actual| self.counts[actual][index]).sum();

            let precision = ratio(true_positives, predicted);
            let recall = ratio(true_positives, support);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };

            Some(ClassMetrics {
                precision,
                recall,
                f1,
                support,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ClassMetrics {
        pub precision: f64,
        pub recall: f64,
        pub f1: f64,
        pub support: usize,
    }

    fn ratio(numerator: usize, denominator: usize) -> f64 {
        if denominator == 0 {
            0.0
        } else {
            numerator as f64 / denominator as f64
        }
    }
}

mod report {
    use super::*;

    /// The evaluation summary written to the metrics file.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EvaluationReport {
        pub loss: f64,
        pub accuracy: f64,
        pub num_samples: usize,
        pub per_class: Vec<ClassReport>,
        pub confusion_matrix: Vec<Vec<usize>>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ClassReport {
        pub class: String,
        pub precision: f64,
        pub recall: f64,
        pub f1: f64,
        pub support: usize,
    }

    impl EvaluationReport {
        pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
            let path = path.as_ref();
            let text = serde_json::to_string_pretty(self)?;
            fs::write(path, text)
                .with_context(|| format!("failed to write metrics file '{}'", path.display()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::abs_diff_eq;

    #[test]
    fn confusion_matrix_counts_pairs() -> Result<()> {
        let mut matrix = ConfusionMatrix::new(3)?;
        matrix.add(0, 0)?;
        matrix.add(0, 2)?;
        matrix.add(2, 2)?;

        ensure!(matrix.count(0, 0) == Some(1));
        ensure!(matrix.count(0, 2) == Some(1));
        ensure!(matrix.count(2, 2) == Some(1));
        ensure!(matrix.count(1, 1) == Some(0));
        ensure!(matrix.count(3, 0) == None);
        ensure!(matrix.total() == 3);
        ensure!(abs_diff_eq!(matrix.accuracy(), 2.0 / 3.0));
        Ok(())
    }

    #[test]
    fn precision_recall_and_f1_match_hand_computed_values() -> Result<()> {
        let mut matrix = ConfusionMatrix::new(3)?;
        for _ in 0..3 {
            matrix.add(0, 0)?;
        }
        matrix.add(0, 1)?;
        for _ in 0..2 {
            matrix.add(1, 1)?;
        }
        matrix.add(2, 0)?;
        for _ in 0..4 {
            matrix.add(2, 2)?;
        }

        let class0 = matrix.class_metrics(0).ok_or_else(|| format_err!("no class 0"))?;
        ensure!(abs_diff_eq!(class0.precision, 0.75));
        ensure!(abs_diff_eq!(class0.recall, 0.75));
        ensure!(abs_diff_eq!(class0.f1, 0.75));
        ensure!(class0.support == 4);

        let class1 = matrix.class_metrics(1).ok_or_else(|| format_err!("no class 1"))?;
        ensure!(abs_diff_eq!(class1.precision, 2.0 / 3.0));
        ensure!(abs_diff_eq!(class1.recall, 1.0));
        ensure!(abs_diff_eq!(class1.f1, 0.8));
        ensure!(class1.support == 2);

        let class2 = matrix.class_metrics(2).ok_or_else(|| format_err!("no class 2"))?;
        ensure!(abs_diff_eq!(class2.precision, 1.0));
        ensure!(abs_diff_eq!(class2.recall, 0.8));
        ensure!(abs_diff_eq!(class2.f1, 8.0 / 9.0));
        ensure!(class2.support == 5);

        ensure!(abs_diff_eq!(matrix.accuracy(), 9.0 / 11.0));
        Ok(())
    }

    #[test]
    fn unseen_classes_report_zero_metrics() -> Result<()> {
        let matrix = ConfusionMatrix::new(2)?;
        let metrics = matrix
            .class_metrics(0)
            .ok_or_else(|| format_err!("no class 0"))?;

        ensure!(metrics.precision == 0.0);
        ensure!(metrics.recall == 0.0);
        ensure!(metrics.f1 == 0.0);
        ensure!(metrics.support == 0);
        ensure!(matrix.accuracy() == 0.0);
        Ok(())
    }

    #[test]
    fn out_of_range_pairs_are_rejected() -> Result<()> {
        let mut matrix = ConfusionMatrix::new(2)?;
        ensure!(matrix.add(0, 2).is_err());
        ensure!(matrix.add(2, 0).is_err());
        ensure!(ConfusionMatrix::new(0).is_err());
        Ok(())
    }
}
