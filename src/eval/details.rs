use crate::ClientError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Details of the flag evaluation's result.
#[derive(Default, Debug)]
pub struct EvaluationDetails<T> {
    /// Value of the feature flag or setting.
    pub value: T,
    /// Name of the feature flag.
    pub key: String,
    /// Indicates whether the default value passed to the evaluation methods is used as the result of the evaluation.
    pub is_default_value: bool,
    /// Name of the strategy that activated the flag (if any).
    pub matched_strategy: Option<String>,
    /// Error in case evaluation failed.
    pub error: Option<ClientError>,
    /// Time of last successful definitions download.
    pub fetch_time: Option<DateTime<Utc>>,
}

impl<T: Default> EvaluationDetails<T> {
    pub(crate) fn from_err(val: T, key: &str, err: ClientError) -> Self {
        Self {
            value: val,
            key: key.to_owned(),
            is_default_value: true,
            error: Some(err),
            ..EvaluationDetails::default()
        }
    }
}

/// A known flag and its evaluated state, as returned by [`crate::Client::get_features`].
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FeatureState {
    /// Name of the feature flag.
    pub name: String,
    /// Result of the evaluation for the given context.
    pub enabled: bool,
}
