//! K-fold cross-validation splits

use crate::error::{EvChargeError, Result};
use serde::{Deserialize, Serialize};

/// A single train/validation split over row positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter.
///
/// Folds are contiguous blocks in row order; the first `n % k` folds hold
/// one extra row.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate the folds for `n_samples` rows
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(EvChargeError::Validation(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(EvChargeError::Validation(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let indices: Vec<usize> = (0..n_samples).collect();

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let splits = KFold::new(5).split(100).unwrap();
        assert_eq!(splits.len(), 5);

        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }
        assert_eq!(splits[1].test_indices, (20..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let splits = KFold::new(3).split(11).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 4, 3]);

        let mut covered: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        covered.sort_unstable();
        assert_eq!(covered, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_too_few_samples() {
        assert!(KFold::new(5).split(3).is_err());
        assert!(KFold::new(1).split(10).is_err());
    }
}
