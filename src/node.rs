use std::fmt;

/// Index into a `Vec<Node>` arena, identifying a specific node in a decision tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` where children are referenced by
/// [`NodeIndex`] rather than pointers. Class mass is tracked as weighted
/// sums so that `sample_weight` flows through impurity, leaf distributions,
/// and importances.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Zero-based feature column used for the split.
        feature: usize,
        /// Threshold value: samples with feature <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Impurity at this node before splitting.
        impurity: f64,
        /// Total sample weight that reached this node.
        weight: f64,
        /// Weighted decrease in impurity from this split.
        impurity_decrease: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Predicted class (argmax of distribution, ties toward lower class).
        prediction: usize,
        /// Normalized class probability distribution (weighted).
        distribution: Vec<f64>,
        /// Impurity at this leaf.
        impurity: f64,
        /// Total sample weight in this leaf.
        weight: f64,
    },
}

impl Node {
    /// Return the impurity at this node (before splitting for interior nodes).
    #[must_use]
    pub fn impurity(&self) -> f64 {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the total training weight that reached this node.
    #[must_use]
    pub fn weight(&self) -> f64 {
        match self {
            Node::Split { weight, .. } | Node::Leaf { weight, .. } => *weight,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, NodeIndex};

    fn make_leaf() -> Node {
        Node::Leaf {
            prediction: 1,
            distribution: vec![0.2, 0.8],
            impurity: 0.32,
            weight: 10.0,
        }
    }

    fn make_split() -> Node {
        Node::Split {
            feature: 2,
            threshold: 3.5,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            impurity: 0.48,
            weight: 20.0,
            impurity_decrease: 0.16,
        }
    }

    #[test]
    fn node_index_roundtrip() {
        let ni = NodeIndex::new(42);
        assert_eq!(ni.index(), 42);
        assert_eq!(format!("{ni}"), "42");
    }

    #[test]
    fn leaf_is_leaf() {
        assert!(make_leaf().is_leaf());
        assert!(!make_split().is_leaf());
    }

    #[test]
    fn node_weight_and_impurity() {
        assert!((make_leaf().weight() - 10.0).abs() < f64::EPSILON);
        assert!((make_split().weight() - 20.0).abs() < f64::EPSILON);
        assert!((make_leaf().impurity() - 0.32).abs() < f64::EPSILON);
        assert!((make_split().impurity() - 0.48).abs() < f64::EPSILON);
    }
}
