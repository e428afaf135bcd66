//! Configuration builder for the Balanced Random Forest classifier.

use crate::error::BrfError;
use crate::sampler::SamplingStrategy;
use crate::split::SplitCriterion;

/// Strategy for determining the number of features to consider at each split.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MaxFeatures {
    /// Square root of total features.
    Sqrt,
    /// Log base 2 of total features.
    Log2,
    /// A fraction of total features (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

impl MaxFeatures {
    /// Resolve the strategy to a concrete feature count.
    pub(crate) fn resolve(self, n_features: usize) -> Result<usize, BrfError> {
        let resolved = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(BrfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// Configuration for Balanced Random Forest training.
///
/// Construct via [`BalancedForestConfig::new`], then chain `with_*` methods.
/// String-keyed access through [`set_param`](Self::set_param) /
/// [`get_param`](Self::get_param) lets generic search tooling treat the
/// classifier as a black box.
///
/// # Defaults
///
/// | Parameter           | Default   |
/// |---------------------|-----------|
/// | `bootstrap`         | `true`    |
/// | `oob_score`         | `false`   |
/// | `warm_start`        | `false`   |
/// | `sampling_strategy` | `Auto`    |
/// | `max_features`      | `Sqrt`    |
/// | `max_depth`         | `None`    |
/// | `min_samples_split` | 2         |
/// | `min_samples_leaf`  | 1         |
/// | `criterion`         | `Gini`    |
/// | `seed`              | 42        |
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BalancedForestConfig {
    pub(crate) n_estimators: usize,
    pub(crate) bootstrap: bool,
    pub(crate) oob_score: bool,
    pub(crate) warm_start: bool,
    pub(crate) sampling_strategy: SamplingStrategy,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) seed: u64,
}

impl BalancedForestConfig {
    /// Create a new config with the given number of estimators.
    ///
    /// Takes a signed count so the classic misconfigurations are
    /// reportable rather than silently truncated.
    ///
    /// # Errors
    ///
    /// Returns [`BrfError::InvalidEstimatorCount`] if `n_estimators <= 0`.
    pub fn new(n_estimators: i64) -> Result<Self, BrfError> {
        if n_estimators <= 0 {
            return Err(BrfError::InvalidEstimatorCount { n_estimators });
        }
        Ok(Self {
            n_estimators: n_estimators as usize,
            bootstrap: true,
            oob_score: false,
            warm_start: false,
            sampling_strategy: SamplingStrategy::Auto,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            seed: 42,
        })
    }

    // --- Setters ---

    /// Enable or disable bootstrap sampling per member.
    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Enable or disable out-of-bag scoring (requires bootstrap).
    #[must_use]
    pub fn with_oob_score(mut self, oob_score: bool) -> Self {
        self.oob_score = oob_score;
        self
    }

    /// Enable or disable warm-start incremental fitting.
    #[must_use]
    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    /// Set the undersampling strategy used for each member.
    #[must_use]
    pub fn with_sampling_strategy(mut self, sampling_strategy: SamplingStrategy) -> Self {
        self.sampling_strategy = sampling_strategy;
        self
    }

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
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

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of estimators.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Return whether bootstrap sampling is enabled.
    #[must_use]
    pub fn bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Return whether out-of-bag scoring is enabled.
    #[must_use]
    pub fn oob_score(&self) -> bool {
        self.oob_score
    }

    /// Return whether warm-start fitting is enabled.
    #[must_use]
    pub fn warm_start(&self) -> bool {
        self.warm_start
    }

    /// Return the undersampling strategy.
    #[must_use]
    pub fn sampling_strategy(&self) -> SamplingStrategy {
        self.sampling_strategy
    }

    /// Return the max features strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    // --- String-keyed parameter access for search tooling ---

    /// Set a parameter from its string representation.
    ///
    /// Recognized keys: `n_estimators`, `bootstrap`, `oob_score`,
    /// `warm_start`, `max_depth` (`none` or a positive integer),
    /// `min_samples_split`, `min_samples_leaf`, `seed`.
    ///
    /// # Errors
    ///
    /// | Variant                              | When                                   |
    /// |--------------------------------------|----------------------------------------|
    /// | [`BrfError::ParamNotAnInteger`]      | value does not parse as an integer     |
    /// | [`BrfError::ParamNotABoolean`]       | value does not parse as `true`/`false` |
    /// | [`BrfError::InvalidEstimatorCount`]  | `n_estimators <= 0`                    |
    /// | [`BrfError::UnknownParam`]           | unrecognized key                       |
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<(), BrfError> {
        match key {
            "n_estimators" => {
                let n: i64 = value.parse().map_err(|_| BrfError::ParamNotAnInteger {
                    param: "n_estimators",
                    value: value.to_string(),
                })?;
                if n <= 0 {
                    return Err(BrfError::InvalidEstimatorCount { n_estimators: n });
                }
                self.n_estimators = n as usize;
            }
            "bootstrap" => self.bootstrap = parse_bool("bootstrap", value)?,
            "oob_score" => self.oob_score = parse_bool("oob_score", value)?,
            "warm_start" => self.warm_start = parse_bool("warm_start", value)?,
            "max_depth" => {
                if value.eq_ignore_ascii_case("none") {
                    self.max_depth = None;
                } else {
                    let d = parse_usize("max_depth", value)?;
                    if d == 0 {
                        return Err(BrfError::InvalidMaxDepth { max_depth: 0 });
                    }
                    self.max_depth = Some(d);
                }
            }
            "min_samples_split" => {
                self.min_samples_split = parse_usize("min_samples_split", value)?;
            }
            "min_samples_leaf" => {
                self.min_samples_leaf = parse_usize("min_samples_leaf", value)?;
            }
            "seed" => {
                let s: u64 = value.parse().map_err(|_| BrfError::ParamNotAnInteger {
                    param: "seed",
                    value: value.to_string(),
                })?;
                self.seed = s;
            }
            other => {
                return Err(BrfError::UnknownParam {
                    param: other.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Return a parameter's string representation, or `None` for an
    /// unrecognized key.
    #[must_use]
    pub fn get_param(&self, key: &str) -> Option<String> {
        match key {
            "n_estimators" => Some(self.n_estimators.to_string()),
            "bootstrap" => Some(self.bootstrap.to_string()),
            "oob_score" => Some(self.oob_score.to_string()),
            "warm_start" => Some(self.warm_start.to_string()),
            "max_depth" => Some(match self.max_depth {
                Some(d) => d.to_string(),
                None => "none".to_string(),
            }),
            "min_samples_split" => Some(self.min_samples_split.to_string()),
            "min_samples_leaf" => Some(self.min_samples_leaf.to_string()),
            "seed" => Some(self.seed.to_string()),
            _ => None,
        }
    }
}

fn parse_bool(param: &'static str, value: &str) -> Result<bool, BrfError> {
    match value {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        _ => Err(BrfError::ParamNotABoolean {
            param,
            value: value.to_string(),
        }),
    }
}

fn parse_usize(param: &'static str, value: &str) -> Result<usize, BrfError> {
    value.parse().map_err(|_| BrfError::ParamNotAnInteger {
        param,
        value: value.to_string(),
    })
}
