//! Stratified k-fold cross-validation and grid search over the classifier.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::config::BalancedForestConfig;
use crate::ensemble::BalancedRandomForestClassifier;
use crate::error::BrfError;

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Results of stratified k-fold cross-validation.
#[derive(Debug)]
pub struct CrossValidationResult {
    /// Accuracy for each fold.
    pub fold_accuracies: Vec<f64>,
    /// Mean accuracy across folds.
    pub mean_accuracy: f64,
    /// Standard deviation of fold accuracies.
    pub std_accuracy: f64,
    /// Number of folds.
    pub n_folds: usize,
    /// Total number of samples.
    pub n_samples: usize,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`BrfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, BrfError> {
        if n_folds < 2 {
            return Err(BrfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run stratified k-fold cross-validation of the classifier described
    /// by `config`.
    ///
    /// Splits the data into `n_folds` folds with approximately equal class
    /// distribution in each fold; each fold trains a fresh ensemble on the
    /// remaining folds and scores the held-out fold.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`BrfError::EmptyDataset`] | zero samples |
    /// | [`BrfError::LabelCountMismatch`] | label count differs from sample count |
    /// | [`BrfError::TooFewSamplesForFolds`] | a class has fewer samples than folds |
    /// | Other errors | from underlying training |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len()))]
    pub fn evaluate(
        &self,
        config: &BalancedForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<CrossValidationResult, BrfError> {
        if features.is_empty() {
            return Err(BrfError::EmptyDataset);
        }
        if labels.len() != features.len() {
            return Err(BrfError::LabelCountMismatch {
                expected: features.len(),
                got: labels.len(),
            });
        }

        let n_samples = features.len();
        let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;
        let fold_assignments = self.stratified_split(labels, n_classes)?;

        let mut fold_accuracies = Vec::with_capacity(self.n_folds);

        for fold in 0..self.n_folds {
            let mut train_features = Vec::new();
            let mut train_labels = Vec::new();
            let mut test_features = Vec::new();
            let mut test_labels = Vec::new();

            for (i, &assigned_fold) in fold_assignments.iter().enumerate() {
                if assigned_fold == fold {
                    test_features.push(features[i].clone());
                    test_labels.push(labels[i]);
                } else {
                    train_features.push(features[i].clone());
                    train_labels.push(labels[i]);
                }
            }

            // Each fold trains with different randomness.
            let fold_config = config
                .clone()
                .with_seed(config.seed().wrapping_add(fold as u64));
            let mut clf = BalancedRandomForestClassifier::new(fold_config);
            clf.fit(&train_features, &train_labels, None)?;

            let fold_accuracy = clf.score(&test_features, &test_labels)?;
            fold_accuracies.push(fold_accuracy);

            info!(fold, accuracy = fold_accuracy, "fold completed");
        }

        let mean_accuracy = fold_accuracies.iter().sum::<f64>() / self.n_folds as f64;
        let std_accuracy = {
            let variance = fold_accuracies
                .iter()
                .map(|&a| (a - mean_accuracy).powi(2))
                .sum::<f64>()
                / self.n_folds as f64;
            variance.sqrt()
        };

        info!(mean_accuracy, std_accuracy, "cross-validation complete");

        Ok(CrossValidationResult {
            fold_accuracies,
            mean_accuracy,
            std_accuracy,
            n_folds: self.n_folds,
            n_samples,
        })
    }

    /// Create stratified fold assignments.
    ///
    /// Groups samples by class, shuffles within each class, then
    /// round-robins across folds so each fold gets approximately equal
    /// representation of each class.
    fn stratified_split(&self, labels: &[usize], n_classes: usize) -> Result<Vec<usize>, BrfError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut class_indices: Vec<Vec<usize>> = vec![vec![]; n_classes];
        for (i, &label) in labels.iter().enumerate() {
            class_indices[label].push(i);
        }

        for (class, indices) in class_indices.iter().enumerate() {
            if !indices.is_empty() && indices.len() < self.n_folds {
                return Err(BrfError::TooFewSamplesForFolds {
                    class,
                    count: indices.len(),
                    n_folds: self.n_folds,
                });
            }
        }

        let mut fold_assignments = vec![0usize; labels.len()];
        for indices in &mut class_indices {
            indices.shuffle(&mut rng);
            for (j, &idx) in indices.iter().enumerate() {
                fold_assignments[idx] = j % self.n_folds;
            }
        }

        Ok(fold_assignments)
    }
}

/// Exhaustive search over string-keyed parameter candidates, scored by
/// cross-validated accuracy.
///
/// Parameters are applied through [`BalancedForestConfig::set_param`], so
/// anything that interface accepts can be searched.
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: Vec<(String, Vec<String>)>,
    cv: CrossValidation,
}

/// Result of a grid search.
#[derive(Debug)]
pub struct GridSearchResult {
    /// The winning `(parameter, value)` assignments.
    pub best_params: Vec<(String, String)>,
    /// Mean cross-validated accuracy of the winning candidate.
    pub best_score: f64,
    /// Number of candidates evaluated.
    pub n_candidates: usize,
}

impl GridSearch {
    /// Create a grid search scored by the given cross-validation.
    #[must_use]
    pub fn new(cv: CrossValidation) -> Self {
        Self {
            grid: Vec::new(),
            cv,
        }
    }

    /// Add a parameter and its candidate values to the grid.
    #[must_use]
    pub fn with_param(mut self, name: &str, values: &[&str]) -> Self {
        self.grid.push((
            name.to_string(),
            values.iter().map(|v| (*v).to_string()).collect(),
        ));
        self
    }

    /// Evaluate every combination in the grid and return the best one.
    ///
    /// Candidates are enumerated in row-major grid order; a strictly better
    /// score is required to displace the current best, so earlier candidates
    /// win ties.
    ///
    /// # Errors
    ///
    /// Returns [`BrfError::EmptyParamGrid`] when no parameters were added or
    /// a parameter has no candidate values; parameter and training errors
    /// propagate unchanged.
    #[instrument(skip_all, fields(n_params = self.grid.len()))]
    pub fn fit(
        &self,
        base: &BalancedForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<GridSearchResult, BrfError> {
        if self.grid.is_empty() || self.grid.iter().any(|(_, values)| values.is_empty()) {
            return Err(BrfError::EmptyParamGrid);
        }

        let mut best_params: Option<Vec<(String, String)>> = None;
        let mut best_score = f64::NEG_INFINITY;
        let mut n_candidates = 0usize;

        let mut selection = vec![0usize; self.grid.len()];
        loop {
            let candidate: Vec<(String, String)> = self
                .grid
                .iter()
                .zip(&selection)
                .map(|((name, values), &vi)| (name.clone(), values[vi].clone()))
                .collect();

            let mut config = base.clone();
            for (name, value) in &candidate {
                config.set_param(name, value)?;
            }

            let result = self.cv.evaluate(&config, features, labels)?;
            n_candidates += 1;
            debug!(?candidate, score = result.mean_accuracy, "candidate evaluated");

            if result.mean_accuracy > best_score {
                best_score = result.mean_accuracy;
                best_params = Some(candidate);
            }

            // Advance the mixed-radix selection counter.
            let mut pos = self.grid.len();
            loop {
                if pos == 0 {
                    break;
                }
                pos -= 1;
                selection[pos] += 1;
                if selection[pos] < self.grid[pos].1.len() {
                    break;
                }
                selection[pos] = 0;
            }
            if selection.iter().all(|&v| v == 0) {
                break;
            }
        }

        let best_params = best_params.expect("at least one candidate was evaluated");
        info!(best_score, n_candidates, "grid search complete");

        Ok(GridSearchResult {
            best_params,
            best_score,
            n_candidates,
        })
    }
}
