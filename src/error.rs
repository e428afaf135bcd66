/// Errors from Balanced Random Forest operations.
#[derive(Debug, thiserror::Error)]
pub enum BrfError {
    /// Returned when n_estimators is zero or negative.
    #[error("n_estimators must be greater than zero, got {n_estimators}")]
    InvalidEstimatorCount {
        /// The invalid n_estimators value provided.
        n_estimators: i64,
    },

    /// Returned when a parameter value cannot be parsed as an integer.
    #[error("{param} must be an integer, got '{value}'")]
    ParamNotAnInteger {
        /// Name of the offending parameter.
        param: &'static str,
        /// The unparseable value provided.
        value: String,
    },

    /// Returned when a parameter value cannot be parsed as a boolean.
    #[error("{param} must be a boolean, got '{value}'")]
    ParamNotABoolean {
        /// Name of the offending parameter.
        param: &'static str,
        /// The unparseable value provided.
        value: String,
    },

    /// Returned when setting a parameter the configuration does not have.
    #[error("unknown parameter '{param}'")]
    UnknownParam {
        /// The unrecognized parameter name.
        param: String,
    },

    /// Returned when oob_score is requested without bootstrap sampling.
    #[error("out-of-bag estimation requires bootstrap sampling (oob_score=true needs bootstrap=true)")]
    OobRequiresBootstrap,

    /// Returned when a warm-start fit requests fewer estimators than already fitted.
    #[error(
        "n_estimators={requested} must be larger or equal to the {fitted} estimators already fitted when warm_start=true"
    )]
    WarmStartShrink {
        /// The requested n_estimators value.
        requested: usize,
        /// The number of estimators already fitted.
        fitted: usize,
    },

    /// Returned when a warm-start refit sees a different feature count than
    /// the already fitted members were trained on.
    #[error(
        "warm-start refit got {got} features, but the fitted estimators were trained on {expected}"
    )]
    WarmStartFeatureMismatch {
        /// The feature count the fitted members were trained on.
        expected: usize,
        /// The feature count of the new training data.
        got: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_split is less than 2.
    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// The invalid min_samples_split value provided.
        min_samples_split: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when max_features resolves to 0 or exceeds n_features.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when the sampling ratio is not positive.
    #[error("sampling ratio must be positive, got {ratio}")]
    InvalidSamplingRatio {
        /// The invalid ratio value provided.
        ratio: f64,
    },

    /// Returned when n_folds is less than 2.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid n_folds value provided.
        n_folds: usize,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when the label vector length differs from the sample count.
    #[error("labels have length {got}, expected {expected} to match the feature rows")]
    LabelCountMismatch {
        /// The expected number of labels.
        expected: usize,
        /// The actual number of labels provided.
        got: usize,
    },

    /// Returned when the sample_weight vector length differs from the sample count.
    #[error("sample_weight has length {got}, expected {expected} to match the feature rows")]
    SampleWeightMismatch {
        /// The expected number of weights.
        expected: usize,
        /// The actual number of weights provided.
        got: usize,
    },

    /// Returned when a sample weight is negative or non-finite.
    #[error("sample_weight[{sample_index}] = {weight} is not a finite non-negative value")]
    InvalidSampleWeight {
        /// The zero-based index of the offending weight.
        sample_index: usize,
        /// The invalid weight value.
        weight: f64,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when predicting with an ensemble that has not been fitted.
    #[error("classifier has not been fitted; call fit before predicting")]
    NotFitted,

    /// Returned when a class has fewer samples than the number of folds.
    #[error("class {class} has only {count} samples, need at least {n_folds} for stratified CV")]
    TooFewSamplesForFolds {
        /// The class label with insufficient samples.
        class: usize,
        /// The number of samples belonging to that class.
        count: usize,
        /// The requested number of folds.
        n_folds: usize,
    },

    /// Returned when OOB scoring finds no sample with any out-of-bag member.
    #[error("OOB evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// Human-readable description of why OOB evaluation failed.
        reason: String,
    },

    /// Returned when a grid search is run with an empty parameter grid.
    #[error("parameter grid is empty; add at least one parameter with candidate values")]
    EmptyParamGrid,
}
