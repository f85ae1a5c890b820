//! Metrics for classification evaluation
//!
//! - Confusion matrix with overall and per-class accuracy
//! - Running average for per-epoch loss tracking

use serde::{Deserialize, Serialize};

/// Confusion Matrix for multi-class classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Matrix data (row = actual, column = predicted)
    /// Stored as a flat vector in row-major order
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Create confusion matrix from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction to the matrix.
    /// Out-of-range indices are ignored.
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            let idx = actual * self.num_classes + predicted;
            self.matrix[idx] += 1;
        }
    }

    /// Get the count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Overall accuracy in percent
    pub fn accuracy_percent(&self) -> f64 {
        let total = self.total();
        if total > 0 {
            100.0 * self.correct() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Recall per actual class in percent; `None` for classes with no samples
    pub fn per_class_accuracy(&self) -> Vec<Option<f64>> {
        (0..self.num_classes)
            .map(|row| {
                let support: usize = (0..self.num_classes).map(|col| self.get(row, col)).sum();
                if support == 0 {
                    None
                } else {
                    Some(100.0 * self.get(row, row) as f64 / support as f64)
                }
            })
            .collect()
    }

    /// Save confusion matrix to CSV
    pub fn save_csv(&self, path: &std::path::Path) -> std::io::Result<()> {
        let mut content = String::new();

        content.push_str("actual\\predicted");
        for col in 0..self.num_classes {
            content.push_str(&format!(",{}", col));
        }
        content.push('\n');

        for row in 0..self.num_classes {
            content.push_str(&format!("{}", row));
            for col in 0..self.num_classes {
                content.push_str(&format!(",{}", self.get(row, col)));
            }
            content.push('\n');
        }

        std::fs::write(path, content)
    }
}

/// Running average for tracking metrics during training
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}
