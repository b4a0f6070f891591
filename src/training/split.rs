//! Index-aligned train/test split
//!
//! The split is expressed as row positions only; features, durations,
//! energy and power are all partitioned with the same [`IndexSplit`].

use crate::config::SplitConfig;
use crate::error::{EvChargeError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Disjoint train and test row positions covering `0..n_samples`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl IndexSplit {
    pub fn n_samples(&self) -> usize {
        self.train.len() + self.test.len()
    }
}

/// Split `n_samples` row positions into train and test.
///
/// The test side holds `ceil(test_fraction * n_samples)` rows. With
/// `shuffle`, positions are permuted by a ChaCha8 generator seeded with
/// `config.seed`; the test set is the head of the permutation. Without it,
/// the last rows form the test set.
pub fn train_test_split(n_samples: usize, config: &SplitConfig) -> Result<IndexSplit> {
    let fraction = config.test_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(EvChargeError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: fraction.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n_test = (fraction * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(EvChargeError::Validation(format!(
            "cannot split {} rows with test_fraction {}: one side would be empty",
            n_samples, fraction
        )));
    }

    let mut positions: Vec<usize> = (0..n_samples).collect();
    if config.shuffle {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        positions.shuffle(&mut rng);
        let train = positions.split_off(n_test);
        Ok(IndexSplit {
            train,
            test: positions,
        })
    } else {
        let test = positions.split_off(n_samples - n_test);
        Ok(IndexSplit {
            train: positions,
            test,
        })
    }
}
