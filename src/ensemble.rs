//! Balanced Random Forest training with parallel member construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument, warn};

use crate::config::BalancedForestConfig;
use crate::error::BrfError;
use crate::importance::mean_importances;
use crate::oob::compute_oob;
use crate::pipeline::SamplerPipeline;
use crate::sampler::RandomUnderSampler;
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// One ensemble member: a sampler, the tree it fed, and their pipeline view.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Member {
    sampler: RandomUnderSampler,
    tree: DecisionTree,
    pipeline: SamplerPipeline,
    oob_indices: Vec<usize>,
}

/// Balanced Random Forest classifier.
///
/// Each member draws a bootstrap sample, undersamples it toward class
/// balance with its own [`RandomUnderSampler`], and fits its own decision
/// tree; predictions average the member probability distributions. Supports
/// out-of-bag scoring and warm-start growth.
///
/// Members are seeded from the ensemble seed and the member index alone, so
/// training is reproducible, embarrassingly parallel, and warm-start growth
/// yields the same member `k` a from-scratch fit would.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BalancedRandomForestClassifier {
    config: BalancedForestConfig,
    members: Vec<Member>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Vec<f64>,
    oob_score: Option<f64>,
}

/// Derive a member's seed from the ensemble seed and the member index.
///
/// splitmix64-style finalizer; pure in its inputs so members can be trained
/// in any order or skipped (warm start) without consuming a shared stream.
fn member_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Generate a bootstrap sample (n draws with replacement) and the
/// out-of-bag indices.
fn bootstrap_sample(n_samples: usize, rng: &mut impl Rng) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let mut bootstrap_indices = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let idx = rng.gen_range(0..n_samples);
        bootstrap_indices.push(idx);
        in_bag[idx] = true;
    }
    let oob_indices: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (bootstrap_indices, oob_indices)
}

/// Validate the training triple and return `(n_samples, n_features)`.
fn validate_dataset(
    features: &[Vec<f64>],
    labels: &[usize],
    sample_weight: Option<&[f64]>,
) -> Result<(usize, usize), BrfError> {
    if features.is_empty() {
        return Err(BrfError::EmptyDataset);
    }
    let n_samples = features.len();
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(BrfError::ZeroFeatures);
    }
    if labels.len() != n_samples {
        return Err(BrfError::LabelCountMismatch {
            expected: n_samples,
            got: labels.len(),
        });
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(BrfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        for (feature_index, &val) in row.iter().enumerate() {
            if !val.is_finite() {
                return Err(BrfError::NonFiniteValue {
                    sample_index,
                    feature_index,
                });
            }
        }
    }
    if let Some(w) = sample_weight {
        if w.len() != n_samples {
            return Err(BrfError::SampleWeightMismatch {
                expected: n_samples,
                got: w.len(),
            });
        }
        for (sample_index, &weight) in w.iter().enumerate() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(BrfError::InvalidSampleWeight {
                    sample_index,
                    weight,
                });
            }
        }
    }
    Ok((n_samples, n_features))
}

/// Train one member on its own bootstrap draw and balanced resample.
fn train_member(
    config: &BalancedForestConfig,
    index: usize,
    features: &[Vec<f64>],
    labels: &[usize],
    sample_weight: Option<&[f64]>,
    n_classes: usize,
    max_features: usize,
) -> Result<Member, BrfError> {
    let seed = member_seed(config.seed, index as u64);
    let n_samples = features.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let (rows, oob_indices) = if config.bootstrap {
        bootstrap_sample(n_samples, &mut rng)
    } else {
        ((0..n_samples).collect(), Vec::new())
    };

    let boot_features: Vec<Vec<f64>> = rows.iter().map(|&i| features[i].clone()).collect();
    let boot_labels: Vec<usize> = rows.iter().map(|&i| labels[i]).collect();
    let boot_weights: Option<Vec<f64>> =
        sample_weight.map(|w| rows.iter().map(|&i| w[i]).collect());

    // Balance the (bootstrap) draw toward the minority class.
    let sampler = RandomUnderSampler::new(seed).with_strategy(config.sampling_strategy);
    let keep = sampler.sample_indices(&boot_labels, boot_labels.len())?;
    let x_res: Vec<Vec<f64>> = keep.iter().map(|&i| boot_features[i].clone()).collect();
    let y_res: Vec<usize> = keep.iter().map(|&i| boot_labels[i]).collect();
    let w_res: Option<Vec<f64>> = boot_weights
        .as_ref()
        .map(|w| keep.iter().map(|&i| w[i]).collect());

    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features))
        .with_n_classes(Some(n_classes))
        .with_seed(seed);
    let tree = tree_config.fit(&x_res, &y_res, w_res.as_deref())?;

    debug!(
        member = index,
        n_bootstrap = rows.len(),
        n_resampled = y_res.len(),
        n_oob = oob_indices.len(),
        "member trained"
    );

    // Pipeline view of the same computation; no refit.
    let pipeline = SamplerPipeline::new(sampler.clone(), tree_config, tree.clone());

    Ok(Member {
        sampler,
        tree,
        pipeline,
        oob_indices,
    })
}

impl BalancedRandomForestClassifier {
    /// Create an unfitted classifier from a configuration.
    #[must_use]
    pub fn new(config: BalancedForestConfig) -> Self {
        Self {
            config,
            members: Vec::new(),
            n_features: 0,
            n_classes: 0,
            feature_importances: Vec::new(),
            oob_score: None,
        }
    }

    /// Borrow the configuration.
    #[must_use]
    pub fn config(&self) -> &BalancedForestConfig {
        &self.config
    }

    /// Set a configuration parameter from its string representation.
    ///
    /// Fitted members are untouched; the change takes effect on the next
    /// [`fit`](Self::fit) call.
    ///
    /// # Errors
    ///
    /// See [`BalancedForestConfig::set_param`].
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<(), BrfError> {
        self.config.set_param(key, value)
    }

    /// Return a configuration parameter's string representation.
    #[must_use]
    pub fn get_param(&self, key: &str) -> Option<String> {
        self.config.get_param(key)
    }

    /// Fit the ensemble.
    ///
    /// Without warm start, any previously fitted members are discarded and
    /// `n_estimators` fresh members are trained. With warm start, existing
    /// members are kept and only the members needed to reach `n_estimators`
    /// are trained and appended.
    ///
    /// # Errors
    ///
    /// | Variant                             | When                                             |
    /// |-------------------------------------|--------------------------------------------------|
    /// | [`BrfError::OobRequiresBootstrap`]  | `oob_score=true` with `bootstrap=false`          |
    /// | [`BrfError::WarmStartShrink`]       | warm start with fewer estimators than fitted     |
    /// | [`BrfError::WarmStartFeatureMismatch`] | warm start with a different feature count     |
    /// | [`BrfError::EmptyDataset`] etc.     | dataset validation (see [`DecisionTreeConfig`])  |
    /// | propagated                          | any sampler or tree-fit failure, unchanged       |
    #[instrument(skip_all, fields(n_estimators = self.config.n_estimators, n_samples = features.len()))]
    pub fn fit(
        &mut self,
        features: &[Vec<f64>],
        labels: &[usize],
        sample_weight: Option<&[f64]>,
    ) -> Result<(), BrfError> {
        // --- Configuration errors come before any member training ---
        if self.config.oob_score && !self.config.bootstrap {
            return Err(BrfError::OobRequiresBootstrap);
        }

        let (n_samples, n_features) = validate_dataset(features, labels, sample_weight)?;
        let max_features = self.config.max_features.resolve(n_features)?;

        let start = if self.config.warm_start {
            let fitted = self.members.len();
            if self.config.n_estimators < fitted {
                return Err(BrfError::WarmStartShrink {
                    requested: self.config.n_estimators,
                    fitted,
                });
            }
            if fitted > 0 && self.config.n_estimators == fitted {
                warn!(
                    n_estimators = fitted,
                    "warm-start fitting without increasing n_estimators does not fit new members"
                );
            }
            if fitted > 0 && n_features != self.n_features {
                return Err(BrfError::WarmStartFeatureMismatch {
                    expected: self.n_features,
                    got: n_features,
                });
            }
            fitted
        } else {
            self.members.clear();
            0
        };

        let inferred_classes = labels.iter().max().copied().unwrap_or(0) + 1;
        self.n_classes = if start > 0 {
            self.n_classes.max(inferred_classes)
        } else {
            inferred_classes
        };
        self.n_features = n_features;

        info!(
            n_samples,
            n_features,
            n_classes = self.n_classes,
            new_members = self.config.n_estimators - start,
            existing_members = start,
            "training balanced random forest"
        );

        let n_classes = self.n_classes;
        let config = &self.config;
        let mut new_members = (start..config.n_estimators)
            .into_par_iter()
            .map(|i| {
                train_member(
                    config,
                    i,
                    features,
                    labels,
                    sample_weight,
                    n_classes,
                    max_features,
                )
            })
            .collect::<Result<Vec<Member>, BrfError>>()?;
        self.members.append(&mut new_members);

        let per_member: Vec<Vec<f64>> = self
            .members
            .iter()
            .map(|m| m.tree.feature_importances())
            .collect();
        self.feature_importances = mean_importances(&per_member, n_features);

        self.oob_score = if self.config.oob_score {
            let trees: Vec<&DecisionTree> = self.members.iter().map(|m| &m.tree).collect();
            let oob: Vec<&[usize]> = self
                .members
                .iter()
                .map(|m| m.oob_indices.as_slice())
                .collect();
            Some(compute_oob(&trees, &oob, features, labels, self.n_classes)?)
        } else {
            None
        };

        info!(
            n_members = self.members.len(),
            oob_score = self.oob_score,
            "balanced random forest training complete"
        );

        Ok(())
    }

    /// Return the averaged class probability distribution for one sample.
    ///
    /// The member leaf distributions are averaged and renormalized to sum
    /// to 1.0.
    ///
    /// # Errors
    ///
    /// [`BrfError::NotFitted`] before any fit;
    /// [`BrfError::PredictionFeatureMismatch`] on a feature-count mismatch.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>, BrfError> {
        if self.members.is_empty() {
            return Err(BrfError::NotFitted);
        }
        if sample.len() != self.n_features {
            return Err(BrfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut avg = vec![0.0f64; self.n_classes];
        for member in &self.members {
            let proba = member.tree.predict_proba(sample)?;
            for (i, p) in proba.iter().enumerate() {
                avg[i] += p;
            }
        }
        let n = self.members.len() as f64;
        avg.iter_mut().for_each(|v| *v /= n);
        let total: f64 = avg.iter().sum();
        if total > 0.0 {
            avg.iter_mut().for_each(|v| *v /= total);
        }
        Ok(avg)
    }

    /// Predict the class label for one sample.
    ///
    /// Argmax of the averaged distribution; probability ties break toward
    /// the lowest class index.
    ///
    /// # Errors
    ///
    /// Same as [`predict_proba`](Self::predict_proba).
    pub fn predict(&self, sample: &[f64]) -> Result<usize, BrfError> {
        let proba = self.predict_proba(sample)?;
        let mut predicted = 0usize;
        for (class, &p) in proba.iter().enumerate() {
            if p > proba[predicted] {
                predicted = class;
            }
        }
        Ok(predicted)
    }

    /// Predict class labels for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Same as [`predict_proba`](Self::predict_proba), for any sample.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, BrfError> {
        features
            .into_par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }

    /// Return probability distributions for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Same as [`predict_proba`](Self::predict_proba), for any sample.
    pub fn predict_proba_batch(
        &self,
        features: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>, BrfError> {
        features
            .into_par_iter()
            .map(|sample| self.predict_proba(sample))
            .collect()
    }

    /// Mean accuracy of [`predict`](Self::predict) against `labels`.
    ///
    /// # Errors
    ///
    /// [`BrfError::LabelCountMismatch`] when lengths differ, plus any
    /// prediction error.
    pub fn score(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<f64, BrfError> {
        if labels.len() != features.len() {
            return Err(BrfError::LabelCountMismatch {
                expected: features.len(),
                got: labels.len(),
            });
        }
        if features.is_empty() {
            return Err(BrfError::EmptyDataset);
        }
        let predictions = self.predict_batch(features)?;
        let correct = predictions
            .iter()
            .zip(labels)
            .filter(|&(&p, &l)| p == l)
            .count();
        Ok(correct as f64 / labels.len() as f64)
    }

    // --- Fitted attributes ---

    /// Return the fitted per-member samplers, in member order.
    #[must_use]
    pub fn samplers(&self) -> Vec<&RandomUnderSampler> {
        self.members.iter().map(|m| &m.sampler).collect()
    }

    /// Return the fitted per-member trees, in member order.
    #[must_use]
    pub fn estimators(&self) -> Vec<&DecisionTree> {
        self.members.iter().map(|m| &m.tree).collect()
    }

    /// Return the per-member pipeline views, in member order.
    #[must_use]
    pub fn pipelines(&self) -> Vec<&SamplerPipeline> {
        self.members.iter().map(|m| &m.pipeline).collect()
    }

    /// Return the ensemble feature importances (mean of per-member
    /// normalized MDI vectors; length `n_features`).
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Return the out-of-bag accuracy, if computed.
    #[must_use]
    pub fn oob_score(&self) -> Option<f64> {
        self.oob_score
    }

    /// Return the per-member out-of-bag row indices, in member order.
    #[must_use]
    pub fn oob_indices(&self) -> Vec<&[usize]> {
        self.members.iter().map(|m| m.oob_indices.as_slice()).collect()
    }

    /// Return the number of fitted members.
    #[must_use]
    pub fn n_members(&self) -> usize {
        self.members.len()
    }

    /// Return the number of features seen during fit.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes seen during fit.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::{BalancedRandomForestClassifier, member_seed};
    use crate::config::{BalancedForestConfig, MaxFeatures};
    use crate::error::BrfError;

    /// 3-class dataset with class counts 10 / 30 / 160 and separable
    /// clusters along feature 0.
    fn make_imbalanced() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (class, count) in [(0usize, 10usize), (1, 30), (2, 160)] {
            for i in 0..count {
                let x = class as f64 * 10.0 + (i % 10) as f64 * 0.3;
                let y = (i % 7) as f64 * 0.2;
                features.push(vec![x, y]);
                labels.push(class);
            }
        }
        (features, labels)
    }

    #[test]
    fn member_seed_is_pure_and_distinct() {
        assert_eq!(member_seed(42, 3), member_seed(42, 3));
        assert_ne!(member_seed(42, 3), member_seed(42, 4));
        assert_ne!(member_seed(42, 3), member_seed(43, 3));
    }

    #[test]
    fn fit_creates_one_member_per_estimator() {
        let (features, labels) = make_imbalanced();
        let config = BalancedForestConfig::new(10).unwrap().with_seed(0);
        let mut clf = BalancedRandomForestClassifier::new(config);
        clf.fit(&features, &labels, None).unwrap();

        assert_eq!(clf.n_members(), 10);
        assert_eq!(clf.samplers().len(), 10);
        assert_eq!(clf.estimators().len(), 10);
        assert_eq!(clf.pipelines().len(), 10);
        assert_eq!(clf.feature_importances().len(), 2);
    }

    #[test]
    fn minority_class_is_predicted() {
        let (features, labels) = make_imbalanced();
        let config = BalancedForestConfig::new(30)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .with_seed(0);
        let mut clf = BalancedRandomForestClassifier::new(config);
        clf.fit(&features, &labels, None).unwrap();

        // Points inside each cluster, including the rare one.
        assert_eq!(clf.predict(&[1.0, 0.4]).unwrap(), 0);
        assert_eq!(clf.predict(&[11.0, 0.4]).unwrap(), 1);
        assert_eq!(clf.predict(&[21.0, 0.4]).unwrap(), 2);
    }

    #[test]
    fn predict_proba_sums_to_one() {
        let (features, labels) = make_imbalanced();
        let config = BalancedForestConfig::new(10).unwrap().with_seed(0);
        let mut clf = BalancedRandomForestClassifier::new(config);
        clf.fit(&features, &labels, None).unwrap();

        for sample in features.iter().take(20) {
            let proba = clf.predict_proba(sample).unwrap();
            assert_eq!(proba.len(), 3);
            let sum: f64 = proba.iter().sum();
            assert!((sum - 1.0).abs() < 1e-10, "sum = {sum}");
        }
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels) = make_imbalanced();
        let mut clf1 = BalancedRandomForestClassifier::new(
            BalancedForestConfig::new(10).unwrap().with_seed(99),
        );
        let mut clf2 = BalancedRandomForestClassifier::new(
            BalancedForestConfig::new(10).unwrap().with_seed(99),
        );
        clf1.fit(&features, &labels, None).unwrap();
        clf2.fit(&features, &labels, None).unwrap();

        assert_eq!(
            clf1.predict_batch(&features).unwrap(),
            clf2.predict_batch(&features).unwrap()
        );
    }

    #[test]
    fn warm_start_growth_matches_fresh_fit() {
        let (features, labels) = make_imbalanced();

        let mut grown = BalancedRandomForestClassifier::new(
            BalancedForestConfig::new(4).unwrap().with_warm_start(true).with_seed(7),
        );
        grown.fit(&features, &labels, None).unwrap();
        grown.set_param("n_estimators", "8").unwrap();
        grown.fit(&features, &labels, None).unwrap();

        let mut fresh = BalancedRandomForestClassifier::new(
            BalancedForestConfig::new(8).unwrap().with_seed(7),
        );
        fresh.fit(&features, &labels, None).unwrap();

        assert_eq!(grown.n_members(), 8);
        assert_eq!(
            grown.predict_batch(&features).unwrap(),
            fresh.predict_batch(&features).unwrap()
        );
    }

    #[test]
    fn warm_start_refit_with_different_feature_count_error() {
        let (features, labels) = make_imbalanced();
        let mut clf = BalancedRandomForestClassifier::new(
            BalancedForestConfig::new(3).unwrap().with_warm_start(true).with_seed(7),
        );
        clf.fit(&features, &labels, None).unwrap();

        let wider: Vec<Vec<f64>> = features
            .iter()
            .map(|row| {
                let mut r = row.clone();
                r.push(0.0);
                r
            })
            .collect();
        clf.set_param("n_estimators", "6").unwrap();
        let err = clf.fit(&wider, &labels, None).unwrap_err();
        assert!(matches!(
            err,
            BrfError::WarmStartFeatureMismatch { expected: 2, got: 3 }
        ));
    }

    #[test]
    fn refit_without_warm_start_rebuilds() {
        let (features, labels) = make_imbalanced();
        let mut clf = BalancedRandomForestClassifier::new(
            BalancedForestConfig::new(5).unwrap().with_seed(7),
        );
        clf.fit(&features, &labels, None).unwrap();
        clf.set_param("n_estimators", "3").unwrap();
        clf.fit(&features, &labels, None).unwrap();
        assert_eq!(clf.n_members(), 3);
    }

    #[test]
    fn oob_without_bootstrap_error() {
        let (features, labels) = make_imbalanced();
        let config = BalancedForestConfig::new(5)
            .unwrap()
            .with_bootstrap(false)
            .with_oob_score(true);
        let mut clf = BalancedRandomForestClassifier::new(config);
        let err = clf.fit(&features, &labels, None).unwrap_err();
        assert!(matches!(err, BrfError::OobRequiresBootstrap));
        assert!(err.to_string().contains("bootstrap"));
    }

    #[test]
    fn no_bootstrap_trains_on_full_input() {
        let (features, labels) = make_imbalanced();
        let config = BalancedForestConfig::new(5)
            .unwrap()
            .with_bootstrap(false)
            .with_seed(3);
        let mut clf = BalancedRandomForestClassifier::new(config);
        clf.fit(&features, &labels, None).unwrap();
        for oob in clf.oob_indices() {
            assert!(oob.is_empty());
        }
    }

    #[test]
    fn oob_score_in_unit_interval() {
        let (features, labels) = make_imbalanced();
        let config = BalancedForestConfig::new(30)
            .unwrap()
            .with_oob_score(true)
            .with_seed(0);
        let mut clf = BalancedRandomForestClassifier::new(config);
        clf.fit(&features, &labels, None).unwrap();
        let oob = clf.oob_score().expect("oob_score must be computed");
        assert!((0.0..=1.0).contains(&oob), "oob = {oob}");
    }

    #[test]
    fn not_fitted_error() {
        let clf = BalancedRandomForestClassifier::new(
            BalancedForestConfig::new(5).unwrap(),
        );
        let err = clf.predict(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, BrfError::NotFitted));
    }

    #[test]
    fn sample_weight_accepted() {
        let (features, labels) = make_imbalanced();
        let weights: Vec<f64> = (0..labels.len()).map(|i| 0.5 + (i % 4) as f64 * 0.25).collect();
        let config = BalancedForestConfig::new(5).unwrap().with_seed(0);
        let mut clf = BalancedRandomForestClassifier::new(config);
        clf.fit(&features, &labels, Some(&weights)).unwrap();
        assert_eq!(clf.n_members(), 5);
    }

    #[test]
    fn sample_weight_length_mismatch_error() {
        let (features, labels) = make_imbalanced();
        let weights = vec![1.0; 3];
        let mut clf = BalancedRandomForestClassifier::new(
            BalancedForestConfig::new(5).unwrap(),
        );
        let err = clf.fit(&features, &labels, Some(&weights)).unwrap_err();
        assert!(matches!(err, BrfError::SampleWeightMismatch { .. }));
    }
}
