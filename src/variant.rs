use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The opaque payload attached to a variant.
///
/// # Examples
///
/// ```rust
/// use unleash::Payload;
///
/// let payload = Payload::new("json", r#"{"color": "blue"}"#);
/// assert_eq!(payload.as_json().unwrap()["color"], "blue");
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Payload {
    /// The payload type (`string`, `json`, `csv`, `number`).
    #[serde(rename = "type")]
    pub payload_type: String,
    /// The raw payload value.
    pub value: String,
}

impl Payload {
    /// Creates a new [`Payload`].
    pub fn new(payload_type: &str, value: &str) -> Self {
        Self {
            payload_type: payload_type.to_owned(),
            value: value.to_owned(),
        }
    }

    /// Reads the value as a string slice.
    pub fn as_str(&self) -> &str {
        self.value.as_str()
    }

    /// Parses the value as JSON. Returns [`None`] if it's not valid JSON.
    pub fn as_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(self.value.as_str()).ok()
    }

    /// Parses the value as a number. Returns [`None`] if it's not a valid `f64`.
    pub fn as_number(&self) -> Option<f64> {
        self.value.trim().parse::<f64>().ok()
    }
}

/// The result of a variant evaluation.
///
/// # Examples
///
/// ```rust
/// use unleash::Variant;
///
/// let fallback = Variant::disabled();
/// assert!(!fallback.enabled);
/// assert_eq!(fallback.name, "disabled");
/// ```
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Name of the variant.
    pub name: String,
    /// Payload of the variant (if any).
    pub payload: Option<Payload>,
    /// Whether this is a real variant of the flag (as opposed to a fallback).
    pub enabled: bool,
    /// Whether the flag itself was enabled for the evaluated context.
    pub feature_enabled: bool,
}

impl Variant {
    /// Creates an enabled [`Variant`] with the given name and payload.
    pub fn new(name: &str, payload: Option<Payload>) -> Self {
        Self {
            name: name.to_owned(),
            payload,
            enabled: true,
            feature_enabled: true,
        }
    }

    /// The default fallback variant returned when no variant could be selected.
    pub fn disabled() -> Self {
        Self {
            name: "disabled".to_owned(),
            payload: None,
            enabled: false,
            feature_enabled: false,
        }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.payload {
            Some(payload) => write!(f, "{} ({}: {})", self.name, payload.payload_type, payload.value),
            None => f.write_str(self.name.as_str()),
        }
    }
}
