//! Balanced Random Forest classification for class-imbalanced datasets.
//!
//! Each ensemble member draws its own bootstrap sample, rebalances it with a
//! random undersampler (majority classes reduced toward the minority count),
//! and fits its own CART decision tree; predictions average the member
//! probability distributions. Supports out-of-bag scoring, warm-start
//! growth, per-sample weights, parallel training via rayon, and stratified
//! cross-validation with grid search over string-keyed parameters.
//!
//! ```
//! use balanced_forest::{BalancedForestConfig, BalancedRandomForestClassifier};
//!
//! let features = vec![
//!     vec![0.1, 0.0], vec![0.2, 0.1], vec![0.3, 0.2],
//!     vec![5.0, 0.0], vec![5.1, 0.1], vec![5.2, 0.2],
//!     vec![5.3, 0.0], vec![5.4, 0.1], vec![5.5, 0.2],
//! ];
//! let labels = vec![0, 0, 0, 1, 1, 1, 1, 1, 1];
//!
//! let config = BalancedForestConfig::new(10).unwrap().with_seed(42);
//! let mut clf = BalancedRandomForestClassifier::new(config);
//! clf.fit(&features, &labels, None).unwrap();
//! assert_eq!(clf.predict(&[0.15, 0.05]).unwrap(), 0);
//! ```

mod config;
mod ensemble;
mod error;
mod eval;
mod importance;
mod node;
mod oob;
mod pipeline;
mod sampler;
mod split;
mod tree;

pub use config::{BalancedForestConfig, MaxFeatures};
pub use ensemble::BalancedRandomForestClassifier;
pub use error::BrfError;
pub use eval::{CrossValidation, CrossValidationResult, GridSearch, GridSearchResult};
pub use node::{Node, NodeIndex};
pub use pipeline::SamplerPipeline;
pub use sampler::{RandomUnderSampler, SamplingStrategy};
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};
