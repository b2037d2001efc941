use crate::model::enums::{Operator, StrategyKind};
use crate::variant::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

pub const ROLLOUT_PARAM: &str = "rollout";
pub const PERCENTAGE_PARAM: &str = "percentage";
pub const STICKINESS_PARAM: &str = "stickiness";
pub const GROUP_ID_PARAM: &str = "groupId";
pub const USER_IDS_PARAM: &str = "userIds";
pub const IPS_PARAM: &str = "IPs";
pub const HOST_NAMES_PARAM: &str = "hostNames";

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON parsing failed. ({0})")]
    Parse(String),
}

/// The definitions document served by the backend.
#[derive(Deserialize, Debug)]
struct FeaturesDocument {
    #[serde(default)]
    version: u32,
    features: Vec<FlagDefinition>,
}

/// An immutable view of all flag definitions at a point in time.
///
/// A snapshot is never mutated after construction; refreshes replace it wholesale.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    /// Flag definitions by name.
    pub features: HashMap<String, Arc<FlagDefinition>>,
    /// Version token used for conditional retrieval.
    pub etag: String,
    /// Time of the fetch that produced this snapshot.
    pub fetched_at: DateTime<Utc>,
    /// Version of the definitions document format.
    pub version: u32,
    pub(crate) raw_json: String,
}

impl RepositorySnapshot {
    /// Creates a snapshot from already constructed flag definitions.
    pub fn new(features: Vec<FlagDefinition>, etag: &str) -> Self {
        let fetched_at = Utc::now();
        Self {
            features: features
                .into_iter()
                .map(|mut f| {
                    f.last_updated = fetched_at;
                    post_process(&mut f);
                    (f.name.clone(), Arc::new(f))
                })
                .collect(),
            etag: etag.to_owned(),
            fetched_at,
            version: 1,
            raw_json: String::default(),
        }
    }

    /// Looks up a flag definition by name.
    pub fn get(&self, name: &str) -> Option<&Arc<FlagDefinition>> {
        self.features.get(name)
    }

    /// Returns the names of all known flags, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.features.keys().cloned().collect::<Vec<String>>();
        names.sort();
        names
    }

    /// Returns `true` when the snapshot holds no flags.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of flags in the snapshot.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub(crate) fn serialize(&self) -> String {
        self.fetched_at.timestamp_millis().to_string() + "\n" + &self.etag + "\n" + &self.raw_json
    }

    pub(crate) fn with_time(&self, time: DateTime<Utc>) -> Self {
        Self {
            fetched_at: time,
            ..self.clone()
        }
    }
}

pub fn snapshot_from_json(
    json: &str,
    etag: &str,
    fetched_at: DateTime<Utc>,
) -> Result<RepositorySnapshot, Error> {
    let document = match serde_json::from_str::<FeaturesDocument>(json) {
        Ok(document) => document,
        Err(err) => return Err(Error::Parse(err.to_string())),
    };
    let mut features = HashMap::with_capacity(document.features.len());
    for mut feature in document.features {
        feature.last_updated = fetched_at;
        post_process(&mut feature);
        features.insert(feature.name.clone(), Arc::new(feature));
    }
    Ok(RepositorySnapshot {
        features,
        etag: etag.to_owned(),
        fetched_at,
        version: document.version,
        raw_json: json.to_owned(),
    })
}

pub fn snapshot_from_cached_json(cached_json: &str) -> Result<RepositorySnapshot, Error> {
    let time_index = if let Some(time_index) = cached_json.find('\n') {
        time_index
    } else {
        return Err(Error::Parse(
            "Number of values is fewer than expected".to_owned(),
        ));
    };
    let without_time = &cached_json[time_index + 1..];
    let etag_index = if let Some(etag_index) = without_time.find('\n') {
        etag_index
    } else {
        return Err(Error::Parse(
            "Number of values is fewer than expected".to_owned(),
        ));
    };
    let time_string = &cached_json[..time_index];
    let time = if let Ok(time) = time_string.parse::<i64>() {
        time
    } else {
        return Err(Error::Parse(format!("Invalid fetch time: '{time_string}'")));
    };
    let fetched_at = if let Some(fetched_at) = DateTime::from_timestamp_millis(time) {
        fetched_at
    } else {
        return Err(Error::Parse(format!("Invalid unix millis value: '{time}'")));
    };

    let etag = &without_time[..etag_index];
    let json = &without_time[etag_index + 1..];
    snapshot_from_json(json, etag, fetched_at)
}

fn post_process(feature: &mut FlagDefinition) {
    for strategy in feature.strategies.iter_mut() {
        strategy.normalize(&feature.name);
    }
}

/// Describes a feature flag.
#[derive(Deserialize, Debug, Clone)]
pub struct FlagDefinition {
    /// Unique name of the flag.
    pub name: String,
    /// Whether the flag is globally enabled.
    pub enabled: bool,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Activation strategies (where there is a logical OR relation between the items).
    #[serde(default)]
    pub strategies: Vec<Strategy>,
    /// Variants of the flag.
    #[serde(default)]
    pub variants: Vec<VariantDefinition>,
    /// Time when this definition was received.
    #[serde(skip)]
    pub last_updated: DateTime<Utc>,
}

impl FlagDefinition {
    /// Creates a flag definition without strategies and variants.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use unleash::{FlagDefinition, Strategy};
    ///
    /// let flag = FlagDefinition::new("beta-ui", true)
    ///     .with_strategy(Strategy::new("flexibleRollout", &[("rollout", "100")]));
    /// ```
    pub fn new(name: &str, enabled: bool) -> Self {
        Self {
            name: name.to_owned(),
            enabled,
            description: None,
            strategies: Vec::new(),
            variants: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Appends a strategy.
    pub fn with_strategy(mut self, mut strategy: Strategy) -> Self {
        strategy.normalize(&self.name);
        self.strategies.push(strategy);
        self
    }

    /// Appends a variant.
    pub fn with_variant(mut self, variant: VariantDefinition) -> Self {
        self.variants.push(variant);
        self
    }
}

/// An activation strategy of a flag.
#[derive(Deserialize, Debug, Clone)]
pub struct Strategy {
    /// Backend name of the strategy.
    pub name: String,
    /// The kind resolved from the name.
    #[serde(skip)]
    pub kind: StrategyKind,
    /// Strategy parameters.
    #[serde(default, deserialize_with = "string_map")]
    pub parameters: HashMap<String, String>,
    /// Constraints that all must match before the strategy is considered.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Strategy {
    /// Creates a new strategy with the given backend name and parameters.
    pub fn new(name: &str, parameters: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_owned(),
            kind: StrategyKind::from(name),
            parameters: parameters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            constraints: Vec::new(),
        }
    }

    /// Appends a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Looks up a strategy parameter by name.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(|v| v.as_str())
    }

    fn normalize(&mut self, flag_name: &str) {
        self.kind = StrategyKind::from(self.name.as_str());
        if self.kind != StrategyKind::GradualRollout {
            return;
        }
        if !self.parameters.contains_key(ROLLOUT_PARAM) {
            if let Some(percentage) = self.parameters.get(PERCENTAGE_PARAM).cloned() {
                self.parameters.insert(ROLLOUT_PARAM.to_owned(), percentage);
            }
        }
        let implied_stickiness = match self.name.as_str() {
            "gradualRolloutUserId" => Some("userId"),
            "gradualRolloutSessionId" => Some("sessionId"),
            "gradualRolloutRandom" => Some("random"),
            _ => None,
        };
        if let Some(stickiness) = implied_stickiness {
            self.parameters
                .insert(STICKINESS_PARAM.to_owned(), stickiness.to_owned());
        }
        let group_missing = self
            .parameters
            .get(GROUP_ID_PARAM)
            .map_or(true, |g| g.is_empty());
        if group_missing {
            self.parameters
                .insert(GROUP_ID_PARAM.to_owned(), flag_name.to_owned());
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.constraints.is_empty() {
            write!(f, " ({} constraints)", self.constraints.len())?;
        }
        Ok(())
    }
}

/// A context-field comparison that gates a strategy.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// The context field to compare.
    pub context_name: String,
    /// The comparison operator.
    #[serde(deserialize_with = "operator")]
    pub operator: Operator,
    /// Comparison values for list-based operators.
    #[serde(default)]
    pub values: Vec<String>,
    /// Comparison value for single-value operators.
    #[serde(default)]
    pub value: Option<String>,
    /// Negates the result of the comparison.
    #[serde(default)]
    pub inverted: bool,
    /// Compares strings case-insensitively.
    #[serde(default)]
    pub case_insensitive: bool,
}

impl Constraint {
    /// Creates a list-based constraint.
    pub fn new(context_name: &str, operator: &str, values: &[&str]) -> Self {
        Self {
            context_name: context_name.to_owned(),
            operator: Operator::from(operator.to_owned()),
            values: values.iter().map(|v| v.to_string()).collect(),
            value: None,
            inverted: false,
            case_insensitive: false,
        }
    }

    /// Creates a single-value constraint.
    pub fn single(context_name: &str, operator: &str, value: &str) -> Self {
        Self {
            value: Some(value.to_owned()),
            ..Self::new(context_name, operator, &[])
        }
    }

    /// Negates the constraint.
    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    /// Makes string comparisons case-insensitive.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let not = if self.inverted { "NOT " } else { "" };
        match &self.value {
            Some(value) => write!(f, "{} {not}{} '{value}'", self.context_name, self.operator),
            None => write!(
                f,
                "{} {not}{} [{}]",
                self.context_name,
                self.operator,
                self.values.join(", ")
            ),
        }
    }
}

/// A variant definition of a flag.
#[derive(Deserialize, Debug, Clone)]
pub struct VariantDefinition {
    /// Name of the variant.
    pub name: String,
    /// Relative weight used for weighted selection.
    #[serde(default)]
    pub weight: u32,
    /// Payload returned with the variant.
    #[serde(default)]
    pub payload: Option<Payload>,
    /// Overrides that force this variant for matching contexts.
    #[serde(default)]
    pub overrides: Vec<Override>,
    /// The context field used for sticky selection.
    #[serde(default)]
    pub stickiness: Option<String>,
}

impl VariantDefinition {
    /// Creates a variant definition with the given weight.
    pub fn new(name: &str, weight: u32) -> Self {
        Self {
            name: name.to_owned(),
            weight,
            payload: None,
            overrides: Vec::new(),
            stickiness: None,
        }
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Appends an override.
    pub fn with_override(mut self, context_name: &str, values: &[&str]) -> Self {
        self.overrides.push(Override {
            context_name: context_name.to_owned(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    /// Sets the stickiness field.
    pub fn with_stickiness(mut self, stickiness: &str) -> Self {
        self.stickiness = Some(stickiness.to_owned());
        self
    }
}

/// Forces a variant when the context field matches one of the values.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    /// The context field to compare.
    pub context_name: String,
    /// Values that force the variant.
    #[serde(default)]
    pub values: Vec<String>,
}

fn operator<'de, D>(deserializer: D) -> Result<Operator, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Operator::from)
}

fn string_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<HashMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::String(s) => Some((k, s)),
            serde_json::Value::Null => None,
            other => Some((k, other.to_string())),
        })
        .collect())
}
