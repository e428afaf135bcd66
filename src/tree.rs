use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::error::BrfError;
use crate::node::{Node, NodeIndex};
use crate::split::{SplitCriterion, find_best_split};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `Gini`                |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all features) |
/// | `n_classes`         | `None` (inferred)     |
/// | `seed`              | 42                    |
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) n_classes: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_classes: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth. `None` means grow until leaves are pure
    /// or stopping conditions are met.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the maximum number of features to consider at each split.
    /// `None` means consider all features.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Pin the number of classes instead of inferring it from the labels.
    ///
    /// An ensemble trains each member on a subset of the data; pinning keeps
    /// leaf distributions sized consistently even when a subset is missing
    /// the highest class label.
    #[must_use]
    pub fn with_n_classes(mut self, n_classes: Option<usize>) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a decision tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]` — row-major layout.
    /// `labels[sample_idx]` — class labels (zero-based).
    /// `sample_weight` — optional per-sample weights; `None` means uniform.
    ///
    /// # Errors
    ///
    /// | Variant                                | When                                            |
    /// |----------------------------------------|-------------------------------------------------|
    /// | [`BrfError::EmptyDataset`]             | `features` is empty                             |
    /// | [`BrfError::ZeroFeatures`]             | rows have zero feature columns                  |
    /// | [`BrfError::FeatureCountMismatch`]     | rows have inconsistent lengths                  |
    /// | [`BrfError::LabelCountMismatch`]       | `labels.len() != features.len()`                |
    /// | [`BrfError::SampleWeightMismatch`]     | weight vector length differs from rows          |
    /// | [`BrfError::InvalidSampleWeight`]      | a weight is negative or non-finite              |
    /// | [`BrfError::NonFiniteValue`]           | any feature value is NaN or infinite            |
    /// | [`BrfError::InvalidMaxFeatures`]       | `max_features` resolves outside [1, n_features] |
    /// | [`BrfError::InvalidMaxDepth`]          | `max_depth` is `Some(0)`                        |
    /// | [`BrfError::InvalidMinSamplesSplit`]   | `min_samples_split` < 2                         |
    /// | [`BrfError::InvalidMinSamplesLeaf`]    | `min_samples_leaf` < 1                          |
    #[instrument(skip(self, features, labels, sample_weight), fields(n_samples = features.len()))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        sample_weight: Option<&[f64]>,
    ) -> Result<DecisionTree, BrfError> {
        // --- Validate inputs ---
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

        let weights: Vec<f64> = match sample_weight {
            Some(w) => {
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
                w.to_vec()
            }
            None => vec![1.0; n_samples],
        };

        // --- Validate config ---
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(BrfError::InvalidMaxDepth { max_depth: 0 });
        }

        if self.min_samples_split < 2 {
            return Err(BrfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }

        if self.min_samples_leaf < 1 {
            return Err(BrfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(BrfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        // --- Derived values ---
        let inferred = labels.iter().max().copied().unwrap_or(0) + 1;
        let n_classes = self.n_classes.unwrap_or(inferred).max(inferred);

        debug!(n_samples, n_features, n_classes, max_features, "fitting decision tree");

        // Convert to column-major layout for split search.
        let col_features: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
            .collect();

        let sample_indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();

        let root = build_tree(
            &col_features,
            labels,
            &weights,
            &sample_indices,
            n_classes,
            self,
            0,
            &mut rng,
            &mut arena,
            max_features,
        );

        debug!(root_index = root.index(), n_nodes = arena.len(), "decision tree built");

        Ok(DecisionTree {
            nodes: arena,
            n_features,
            n_classes,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively build the arena-based decision tree.
///
/// Returns the [`NodeIndex`] of the node just created in `arena`.
#[allow(clippy::too_many_arguments)]
fn build_tree(
    col_features: &[Vec<f64>],
    labels: &[usize],
    weights: &[f64],
    sample_indices: &[usize],
    n_classes: usize,
    config: &DecisionTreeConfig,
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
    max_features: usize,
) -> NodeIndex {
    let n_samples = sample_indices.len();

    // Accumulate weighted class mass.
    let mut class_mass = vec![0.0f64; n_classes];
    for &si in sample_indices {
        class_mass[labels[si]] += weights[si];
    }
    let total_weight: f64 = class_mass.iter().sum();

    let impurity = config.criterion.impurity(&class_mass, total_weight);

    let make_leaf = |arena: &mut Vec<Node>| -> NodeIndex {
        let distribution: Vec<f64> = if total_weight > 0.0 {
            class_mass.iter().map(|&m| m / total_weight).collect()
        } else {
            vec![0.0; n_classes]
        };
        // Strict > keeps the lowest class index on ties.
        let mut prediction = 0usize;
        for (class, &m) in class_mass.iter().enumerate() {
            if m > class_mass[prediction] {
                prediction = class;
            }
        }
        let idx = arena.len();
        arena.push(Node::Leaf {
            prediction,
            distribution,
            impurity,
            weight: total_weight,
        });
        NodeIndex::new(idx)
    };

    let depth_exceeded = config.max_depth.is_some_and(|max_d| depth >= max_d);
    let too_few = n_samples < config.min_samples_split;
    let pure = impurity == 0.0;

    if too_few || pure || depth_exceeded {
        return make_leaf(arena);
    }

    let split_result = find_best_split(
        col_features,
        labels,
        weights,
        sample_indices,
        n_classes,
        config.criterion,
        max_features,
        config.min_samples_leaf,
        rng,
    );

    let split = match split_result {
        Some(s) => s,
        None => return make_leaf(arena),
    };

    // Arena pattern: reserve index, recurse, then overwrite with the split.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        prediction: 0,
        distribution: vec![0.0; n_classes],
        impurity,
        weight: total_weight,
    });

    let left_idx = build_tree(
        col_features,
        labels,
        weights,
        &split.left_indices,
        n_classes,
        config,
        depth + 1,
        rng,
        arena,
        max_features,
    );

    let right_idx = build_tree(
        col_features,
        labels,
        weights,
        &split.right_indices,
        n_classes,
        config,
        depth + 1,
        rng,
        arena,
        max_features,
    );

    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: left_idx,
        right: right_idx,
        impurity,
        weight: total_weight,
        impurity_decrease: split.impurity_decrease,
    };

    NodeIndex::new(node_idx)
}

/// A fitted CART decision tree.
///
/// Stored as an arena-based `Vec<Node>` with index references for
/// cache-friendly traversal and trivial serialization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the class label for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`BrfError::PredictionFeatureMismatch`] when
    /// `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, BrfError> {
        if sample.len() != self.n_features {
            return Err(BrfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let leaf = self.traverse(sample);
        match &self.nodes[leaf] {
            Node::Leaf { prediction, .. } => Ok(*prediction),
            Node::Split { .. } => unreachable!("traverse always ends at a leaf"),
        }
    }

    /// Return the class probability distribution for a single sample.
    ///
    /// The returned `Vec` has length `n_classes`, summing to 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`BrfError::PredictionFeatureMismatch`] when
    /// `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>, BrfError> {
        if sample.len() != self.n_features {
            return Err(BrfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let leaf = self.traverse(sample);
        match &self.nodes[leaf] {
            Node::Leaf { distribution, .. } => Ok(distribution.clone()),
            Node::Split { .. } => unreachable!("traverse always ends at a leaf"),
        }
    }

    /// Compute Mean Decrease in Impurity (MDI) feature importances.
    ///
    /// Accumulates each split's weighted `impurity_decrease` by feature,
    /// then normalizes the totals to sum to 1.0. Returns a `Vec` of length
    /// `n_features`; all zeros when the tree is a single leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[*feature] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the total number of nodes in the tree.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));
        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => {
                    if d > max_depth {
                        max_depth = d;
                    }
                }
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }
        max_depth
    }

    /// Traverse the tree from the root and return the arena index of the leaf.
    fn traverse(&self, sample: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if sample[*feature] <= *threshold {
                        idx = left.index();
                    } else {
                        idx = right.index();
                    }
                }
            }
        }
    }
}
