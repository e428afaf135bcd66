use rand::Rng;

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its weighted class mass.
    ///
    /// Returns `0.0` when `total_weight` is zero (pure node).
    ///
    /// For `Gini`: `1 - Σ(p_i²)` where `p_i = class_weight_i / total_weight`.
    /// For `Entropy`: `-Σ(p_i · ln(p_i))` summed only over classes with
    /// positive weight.
    #[must_use]
    pub fn impurity(&self, class_weights: &[f64], total_weight: f64) -> f64 {
        if total_weight <= 0.0 {
            return 0.0;
        }
        match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_weights
                    .iter()
                    .map(|&w| {
                        let p = w / total_weight;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => {
                -class_weights
                    .iter()
                    .filter(|&&w| w > 0.0)
                    .map(|&w| {
                        let p = w / total_weight;
                        p * p.ln()
                    })
                    .sum::<f64>()
            }
        }
    }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Zero-based feature column used for the split.
    pub(crate) feature: usize,
    /// Threshold value.
    pub(crate) threshold: f64,
    /// Weighted impurity decrease from this split (MDI formula).
    pub(crate) impurity_decrease: f64,
    /// Sample indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split among a random subset of features.
///
/// For each of `max_features` randomly chosen features, sorts the
/// `(value, sample)` pairs, scans left-to-right with incremental weighted
/// class-mass updates, and tracks the globally best split by weighted
/// impurity decrease.
///
/// Returns `None` when no valid split exists (all values identical, or any
/// split would violate `min_samples_leaf`).
///
/// # Column-major layout
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
/// `sample_indices` index into the inner Vecs; `weights[sample_idx]` is the
/// per-sample training weight.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    labels: &[usize],
    weights: &[f64],
    sample_indices: &[usize],
    n_classes: usize,
    criterion: SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = features.len();
    let n_samples = sample_indices.len();

    if n_samples < 2 || n_features == 0 {
        return None;
    }

    // Build parent weighted class mass.
    let mut parent_mass = vec![0.0f64; n_classes];
    for &si in sample_indices {
        parent_mass[labels[si]] += weights[si];
    }
    let parent_weight: f64 = parent_mass.iter().sum();
    let parent_impurity = criterion.impurity(&parent_mass, parent_weight);

    // Partial Fisher-Yates: shuffle only the first `max_features` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }
    let selected_features = &feature_order[..take];

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(usize, f64)> = None;

    for &feat_idx in selected_features {
        let feat_col = &features[feat_idx];

        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (feat_col[si], si))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        // Incremental scan: left grows from empty, right shrinks from full.
        let mut left_mass = vec![0.0f64; n_classes];
        let mut right_mass = parent_mass.clone();
        let mut left_weight = 0.0f64;

        for i in 0..(n_samples - 1) {
            let (val_i, si) = sorted[i];
            let class_i = labels[si];
            let w_i = weights[si];

            // Move sample i from right to left.
            left_mass[class_i] += w_i;
            right_mass[class_i] -= w_i;
            left_weight += w_i;
            let right_weight = parent_weight - left_weight;

            // Skip if next value is identical (no valid boundary here).
            let val_next = sorted[i + 1].0;
            if val_i == val_next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n_samples - n_left;
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let left_impurity = criterion.impurity(&left_mass, left_weight);
            let right_impurity = criterion.impurity(&right_mass, right_weight);

            // Weighted MDI formula.
            let decrease = parent_weight * parent_impurity
                - left_weight * left_impurity
                - right_weight * right_impurity;

            if decrease > best_decrease {
                best_decrease = decrease;
                let threshold = (val_i + val_next) / 2.0;
                best = Some((feat_idx, threshold));
            }
        }
    }

    let (best_feature, threshold) = best?;

    // Partition sample_indices into left/right.
    let feat_col = &features[best_feature];
    let mut left_indices = Vec::with_capacity(n_samples / 2);
    let mut right_indices = Vec::with_capacity(n_samples / 2);
    for &si in sample_indices {
        if feat_col[si] <= threshold {
            left_indices.push(si);
        } else {
            right_indices.push(si);
        }
    }

    Some(SplitResult {
        feature: best_feature,
        threshold,
        impurity_decrease: best_decrease,
        left_indices,
        right_indices,
    })
}
