//! Feature importance aggregation across ensemble members.

/// Average per-member normalized MDI importances into one vector.
///
/// Each member contributes a vector of length `n_features` that already sums
/// to 1.0 (or is all zeros for a single-leaf tree); the ensemble importance
/// is the elementwise mean.
pub(crate) fn mean_importances(per_member: &[Vec<f64>], n_features: usize) -> Vec<f64> {
    let mut totals = vec![0.0f64; n_features];
    if per_member.is_empty() {
        return totals;
    }
    for member in per_member {
        for (i, &val) in member.iter().enumerate() {
            if i < n_features {
                totals[i] += val;
            }
        }
    }
    let n = per_member.len() as f64;
    totals.iter_mut().for_each(|v| *v /= n);
    totals
}

#[cfg(test)]
mod tests {
    use super::mean_importances;

    #[test]
    fn mean_of_two_members() {
        let per_member = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let mean = mean_importances(&per_member, 2);
        assert_eq!(mean, vec![0.5, 0.5]);
    }

    #[test]
    fn empty_members_all_zero() {
        let mean = mean_importances(&[], 3);
        assert_eq!(mean, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn normalized_members_stay_normalized() {
        let per_member = vec![vec![0.7, 0.3], vec![0.2, 0.8], vec![0.5, 0.5]];
        let mean = mean_importances(&per_member, 2);
        let total: f64 = mean.iter().sum();
        assert!((total - 1.0).abs() < 1e-12, "total = {total}");
    }
}
