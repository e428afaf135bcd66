//! Random undersampling for class rebalancing.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::BrfError;

/// How far majority classes are reduced toward the minority class.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SamplingStrategy {
    /// Reduce every class to the minority class count.
    Auto,
    /// Reduce every class to `ceil(minority_count * ratio)`, capped at the
    /// class's own count. `Auto` is equivalent to `Ratio(1.0)`.
    Ratio(f64),
}

/// Random undersampler: selects a class-rebalanced subset of the rows.
///
/// Selection is a pure function of the stored seed and the label vector, so
/// calling [`RandomUnderSampler::fit_resample`] twice on the same data
/// returns elementwise-identical output. The rarest class always keeps all
/// of its rows.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomUnderSampler {
    seed: u64,
    strategy: SamplingStrategy,
}

impl RandomUnderSampler {
    /// Create a new sampler with the given seed and the `Auto` strategy.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            strategy: SamplingStrategy::Auto,
        }
    }

    /// Set the sampling strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Return the sampler's seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the sampling strategy.
    #[must_use]
    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// Return a class-rebalanced subset of `(features, labels)`.
    ///
    /// # Errors
    ///
    /// | Variant                            | When                                  |
    /// |------------------------------------|---------------------------------------|
    /// | [`BrfError::EmptyDataset`]         | `features` is empty                   |
    /// | [`BrfError::LabelCountMismatch`]   | `labels.len() != features.len()`      |
    /// | [`BrfError::InvalidSamplingRatio`] | `Ratio(r)` with `r <= 0`              |
    pub fn fit_resample(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<(Vec<Vec<f64>>, Vec<usize>), BrfError> {
        let indices = self.sample_indices(labels, features.len())?;
        let x_res: Vec<Vec<f64>> = indices.iter().map(|&i| features[i].clone()).collect();
        let y_res: Vec<usize> = indices.iter().map(|&i| labels[i]).collect();
        Ok((x_res, y_res))
    }

    /// Select the row indices of the rebalanced subset, sorted ascending.
    ///
    /// Within each class the kept rows are chosen without replacement from a
    /// seeded shuffle; the ascending sort makes the output order independent
    /// of class layout in the input.
    pub(crate) fn sample_indices(
        &self,
        labels: &[usize],
        n_samples: usize,
    ) -> Result<Vec<usize>, BrfError> {
        if n_samples == 0 {
            return Err(BrfError::EmptyDataset);
        }
        if labels.len() != n_samples {
            return Err(BrfError::LabelCountMismatch {
                expected: n_samples,
                got: labels.len(),
            });
        }
        let ratio = match self.strategy {
            SamplingStrategy::Auto => 1.0,
            SamplingStrategy::Ratio(r) => {
                if r <= 0.0 || !r.is_finite() {
                    return Err(BrfError::InvalidSamplingRatio { ratio: r });
                }
                r
            }
        };

        let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;
        let mut class_indices: Vec<Vec<usize>> = vec![vec![]; n_classes];
        for (i, &label) in labels.iter().enumerate() {
            class_indices[label].push(i);
        }

        let minority_count = class_indices
            .iter()
            .filter(|c| !c.is_empty())
            .map(Vec::len)
            .min()
            .unwrap_or(0);
        let target = ((minority_count as f64) * ratio).ceil() as usize;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut selected = Vec::new();
        for indices in &mut class_indices {
            if indices.is_empty() {
                continue;
            }
            if indices.len() <= target {
                // Rarest classes keep every row.
                selected.extend_from_slice(indices);
            } else {
                indices.shuffle(&mut rng);
                selected.extend_from_slice(&indices[..target]);
            }
        }
        selected.sort_unstable();

        debug!(
            n_samples,
            n_selected = selected.len(),
            minority_count,
            "undersampled dataset"
        );

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::{RandomUnderSampler, SamplingStrategy};
    use crate::error::BrfError;

    /// 3 rows of class 0, 10 of class 1, 30 of class 2.
    fn make_imbalanced() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (class, count) in [(0usize, 3usize), (1, 10), (2, 30)] {
            for i in 0..count {
                features.push(vec![class as f64 * 10.0 + i as f64, 0.0]);
                labels.push(class);
            }
        }
        (features, labels)
    }

    #[test]
    fn balances_to_minority_count() {
        let (features, labels) = make_imbalanced();
        let sampler = RandomUnderSampler::new(7);
        let (x_res, y_res) = sampler.fit_resample(&features, &labels).unwrap();

        assert_eq!(x_res.len(), y_res.len());
        for class in 0..3 {
            let count = y_res.iter().filter(|&&y| y == class).count();
            assert_eq!(count, 3, "class {class} should be reduced to 3 rows");
        }
    }

    #[test]
    fn rarest_class_keeps_all_rows() {
        let (features, labels) = make_imbalanced();
        let sampler = RandomUnderSampler::new(7);
        let (x_res, y_res) = sampler.fit_resample(&features, &labels).unwrap();

        // Class 0 rows are the first three inputs; all must survive.
        let kept: Vec<&Vec<f64>> = x_res
            .iter()
            .zip(&y_res)
            .filter(|&(_, &y)| y == 0)
            .map(|(x, _)| x)
            .collect();
        assert_eq!(kept.len(), 3);
        for (i, row) in kept.iter().enumerate() {
            assert_eq!(row.as_slice(), features[i].as_slice());
        }
    }

    #[test]
    fn deterministic_across_calls() {
        let (features, labels) = make_imbalanced();
        let sampler = RandomUnderSampler::new(99);
        let (x1, y1) = sampler.fit_resample(&features, &labels).unwrap();
        let (x2, y2) = sampler.fit_resample(&features, &labels).unwrap();
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);
    }

    #[test]
    fn different_seeds_differ() {
        let (features, labels) = make_imbalanced();
        let (_, y1) = RandomUnderSampler::new(1)
            .fit_resample(&features, &labels)
            .unwrap();
        let (x1, _) = RandomUnderSampler::new(1)
            .fit_resample(&features, &labels)
            .unwrap();
        let (x2, y2) = RandomUnderSampler::new(2)
            .fit_resample(&features, &labels)
            .unwrap();
        assert_eq!(y1.len(), y2.len());
        assert_ne!(x1, x2, "seeds 1 and 2 should select different majority rows");
    }

    #[test]
    fn ratio_strategy_keeps_more_majority_rows() {
        let (features, labels) = make_imbalanced();
        let sampler =
            RandomUnderSampler::new(7).with_strategy(SamplingStrategy::Ratio(2.0));
        let (_, y_res) = sampler.fit_resample(&features, &labels).unwrap();

        assert_eq!(y_res.iter().filter(|&&y| y == 0).count(), 3);
        assert_eq!(y_res.iter().filter(|&&y| y == 1).count(), 6);
        assert_eq!(y_res.iter().filter(|&&y| y == 2).count(), 6);
    }

    #[test]
    fn invalid_ratio_error() {
        let (features, labels) = make_imbalanced();
        let sampler =
            RandomUnderSampler::new(7).with_strategy(SamplingStrategy::Ratio(0.0));
        let err = sampler.fit_resample(&features, &labels).unwrap_err();
        assert!(matches!(err, BrfError::InvalidSamplingRatio { .. }));
    }

    #[test]
    fn empty_input_error() {
        let sampler = RandomUnderSampler::new(7);
        let err = sampler.fit_resample(&[], &[]).unwrap_err();
        assert!(matches!(err, BrfError::EmptyDataset));
    }

    #[test]
    fn single_class_passes_through() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0]];
        let labels = vec![0, 0, 0];
        let sampler = RandomUnderSampler::new(7);
        let (x_res, y_res) = sampler.fit_resample(&features, &labels).unwrap();
        assert_eq!(x_res, features);
        assert_eq!(y_res, labels);
    }
}
