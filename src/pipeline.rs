//! Per-member resample-then-fit pipeline.

use crate::error::BrfError;
use crate::sampler::RandomUnderSampler;
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// Composition of one [`RandomUnderSampler`] step and one decision-tree step.
///
/// An ensemble member's pipeline is built from the member's already-fitted
/// components without refitting them: both steps are deterministic in their
/// stored seeds, so [`SamplerPipeline::fit`] on the raw data reproduces the
/// exact resample and the exact tree the member holds. The pipeline and the
/// standalone components are two views of the same computation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SamplerPipeline {
    sampler: RandomUnderSampler,
    tree_config: DecisionTreeConfig,
    tree: DecisionTree,
}

impl SamplerPipeline {
    pub(crate) fn new(
        sampler: RandomUnderSampler,
        tree_config: DecisionTreeConfig,
        tree: DecisionTree,
    ) -> Self {
        Self {
            sampler,
            tree_config,
            tree,
        }
    }

    /// Return the resampling step.
    #[must_use]
    pub fn sampler(&self) -> &RandomUnderSampler {
        &self.sampler
    }

    /// Return the tree step's configuration.
    #[must_use]
    pub fn tree_config(&self) -> &DecisionTreeConfig {
        &self.tree_config
    }

    /// Return the fitted tree step.
    #[must_use]
    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// Run the pipeline end-to-end on raw data: resample, then fit the tree
    /// on the resampled subset. Returns a new fitted pipeline; the receiver
    /// is untouched.
    ///
    /// # Errors
    ///
    /// Propagates sampler and tree-fit errors unchanged.
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<SamplerPipeline, BrfError> {
        let (x_res, y_res) = self.sampler.fit_resample(features, labels)?;
        let tree = self.tree_config.fit(&x_res, &y_res, None)?;
        Ok(Self {
            sampler: self.sampler.clone(),
            tree_config: self.tree_config.clone(),
            tree,
        })
    }

    /// Predict the class label for a single sample via the tree step.
    ///
    /// # Errors
    ///
    /// Returns [`BrfError::PredictionFeatureMismatch`] on a feature-count
    /// mismatch.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, BrfError> {
        self.tree.predict(sample)
    }

    /// Return the class probability distribution for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`BrfError::PredictionFeatureMismatch`] on a feature-count
    /// mismatch.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>, BrfError> {
        self.tree.predict_proba(sample)
    }

    /// Predict class labels for a batch of samples.
    ///
    /// # Errors
    ///
    /// Returns [`BrfError::PredictionFeatureMismatch`] if any sample has the
    /// wrong feature count.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, BrfError> {
        features.iter().map(|sample| self.predict(sample)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SamplerPipeline;
    use crate::sampler::RandomUnderSampler;
    use crate::tree::DecisionTreeConfig;

    fn make_imbalanced() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (class, count) in [(0usize, 5usize), (1, 40)] {
            for i in 0..count {
                features.push(vec![class as f64 * 10.0 + (i % 7) as f64, i as f64 * 0.1]);
                labels.push(class);
            }
        }
        (features, labels)
    }

    #[test]
    fn refit_reproduces_held_tree() {
        let (features, labels) = make_imbalanced();
        let sampler = RandomUnderSampler::new(13);
        let tree_config = DecisionTreeConfig::new().with_seed(13);

        let (x_res, y_res) = sampler.fit_resample(&features, &labels).unwrap();
        let tree = tree_config.fit(&x_res, &y_res, None).unwrap();
        let pipeline = SamplerPipeline::new(sampler, tree_config, tree);

        let refitted = pipeline.fit(&features, &labels).unwrap();
        for sample in &features {
            assert_eq!(
                pipeline.predict(sample).unwrap(),
                refitted.predict(sample).unwrap()
            );
            assert_eq!(
                pipeline.predict_proba(sample).unwrap(),
                refitted.predict_proba(sample).unwrap()
            );
        }
    }

    #[test]
    fn sampler_step_matches_standalone() {
        let (features, labels) = make_imbalanced();
        let sampler = RandomUnderSampler::new(5);
        let tree_config = DecisionTreeConfig::new().with_seed(5);
        let (x_res, y_res) = sampler.fit_resample(&features, &labels).unwrap();
        let tree = tree_config.fit(&x_res, &y_res, None).unwrap();
        let pipeline = SamplerPipeline::new(sampler.clone(), tree_config, tree);

        let (x1, y1) = sampler.fit_resample(&features, &labels).unwrap();
        let (x2, y2) = pipeline.sampler().fit_resample(&features, &labels).unwrap();
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);
    }
}
