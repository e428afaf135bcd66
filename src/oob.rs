//! Out-of-bag (OOB) scoring for the balanced ensemble.

use tracing::warn;

use crate::error::BrfError;
use crate::tree::DecisionTree;

/// Compute the out-of-bag accuracy.
///
/// For each training row, the leaf probability distributions of every member
/// whose bootstrap missed that row are summed; the OOB prediction is the
/// argmax of the accumulated vector (ties toward the lower class). Rows that
/// were in-bag for every member have no OOB prediction and are excluded from
/// the score; partial coverage logs a warning since the estimate degrades
/// with few estimators.
pub(crate) fn compute_oob(
    trees: &[&DecisionTree],
    oob_indices_per_member: &[&[usize]],
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
) -> Result<f64, BrfError> {
    let n_samples = features.len();

    let mut accumulated: Vec<Vec<f64>> = vec![vec![0.0; n_classes]; n_samples];
    let mut has_oob = vec![false; n_samples];

    for (member_idx, oob_indices) in oob_indices_per_member.iter().enumerate() {
        for &sample_idx in *oob_indices {
            let proba = trees[member_idx].predict_proba(&features[sample_idx])?;
            for (class, p) in proba.iter().enumerate() {
                accumulated[sample_idx][class] += p;
            }
            has_oob[sample_idx] = true;
        }
    }

    let n_covered = has_oob.iter().filter(|&&h| h).count();
    if n_covered == 0 {
        return Err(BrfError::OobEvaluationFailed {
            reason: "no sample was out-of-bag for any estimator".to_string(),
        });
    }
    if n_covered < n_samples {
        warn!(
            n_covered,
            n_samples,
            "some samples were never out-of-bag; OOB score may be inaccurate with too few estimators"
        );
    }

    let mut correct = 0usize;
    for (i, probs) in accumulated.iter().enumerate() {
        if !has_oob[i] {
            continue;
        }
        // Strict > keeps the lowest class index on ties.
        let mut predicted = 0usize;
        for (class, &p) in probs.iter().enumerate() {
            if p > probs[predicted] {
                predicted = class;
            }
        }
        if predicted == labels[i] {
            correct += 1;
        }
    }

    Ok(correct as f64 / n_covered as f64)
}

#[cfg(test)]
mod tests {
    use super::compute_oob;
    use crate::error::BrfError;
    use crate::tree::DecisionTreeConfig;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = vec![
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![10.0],
            vec![11.0],
            vec![12.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        (features, labels)
    }

    #[test]
    fn perfect_tree_scores_one() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels, None).unwrap();
        let oob: Vec<usize> = (0..6).collect();
        let score =
            compute_oob(&[&tree], &[oob.as_slice()], &features, &labels, 2).unwrap();
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn uncovered_rows_are_excluded() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels, None).unwrap();
        // Only rows 0 and 3 are out-of-bag; the other four are ignored.
        let oob = vec![0usize, 3];
        let score =
            compute_oob(&[&tree], &[oob.as_slice()], &features, &labels, 2).unwrap();
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_coverage_is_an_error() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels, None).unwrap();
        let empty: Vec<usize> = Vec::new();
        let err =
            compute_oob(&[&tree], &[empty.as_slice()], &features, &labels, 2).unwrap_err();
        assert!(matches!(err, BrfError::OobEvaluationFailed { .. }));
    }
}
