use std::fmt::{Display, Formatter};

/// The kind of an activation strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum StrategyKind {
    /// Always activates (subject to constraints).
    #[default]
    Default,
    /// Activates for a stable percentage of contexts (`flexibleRollout`, `gradualRollout*`).
    GradualRollout,
    /// Activates for an allow-list of user identifiers (`userWithId`).
    UserIds,
    /// Activates for callers coming from listed IP addresses or CIDR ranges (`remoteAddress`).
    IpRange,
    /// Activates on listed host names (`applicationHostname`).
    Hostname,
    /// A strategy implemented by the host application.
    Custom(String),
}

impl StrategyKind {
    /// Returns the backend names of the built-in strategies.
    pub fn builtin_names() -> &'static [&'static str] {
        &[
            "default",
            "flexibleRollout",
            "gradualRolloutUserId",
            "gradualRolloutSessionId",
            "gradualRolloutRandom",
            "userWithId",
            "remoteAddress",
            "applicationHostname",
        ]
    }
}

impl From<&str> for StrategyKind {
    fn from(name: &str) -> Self {
        match name {
            "default" => StrategyKind::Default,
            "flexibleRollout"
            | "gradualRolloutUserId"
            | "gradualRolloutSessionId"
            | "gradualRolloutRandom" => StrategyKind::GradualRollout,
            "userWithId" => StrategyKind::UserIds,
            "remoteAddress" => StrategyKind::IpRange,
            "applicationHostname" => StrategyKind::Hostname,
            other => StrategyKind::Custom(other.to_owned()),
        }
    }
}

impl Display for StrategyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Default => f.write_str("default"),
            StrategyKind::GradualRollout => f.write_str("flexibleRollout"),
            StrategyKind::UserIds => f.write_str("userWithId"),
            StrategyKind::IpRange => f.write_str("remoteAddress"),
            StrategyKind::Hostname => f.write_str("applicationHostname"),
            StrategyKind::Custom(name) => f.write_str(name),
        }
    }
}

/// Constraint comparison operator used during the evaluation process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// Checks whether the context field is one of the values.
    In,
    /// Checks whether the context field is not one of the values.
    NotIn,
    /// Checks whether the context field contains any of the values.
    StrContains,
    /// Checks whether the context field starts with any of the values.
    StrStartsWith,
    /// Checks whether the context field ends with any of the values.
    StrEndsWith,
    /// Numeric equality.
    NumEq,
    /// Numeric greater than.
    NumGt,
    /// Numeric greater than or equal.
    NumGte,
    /// Numeric less than.
    NumLt,
    /// Numeric less than or equal.
    NumLte,
    /// Checks whether the context time is after the value.
    DateAfter,
    /// Checks whether the context time is before the value.
    DateBefore,
    /// Semantic version equality.
    SemverEq,
    /// Semantic version greater than.
    SemverGt,
    /// Semantic version less than.
    SemverLt,
    /// An operator this client doesn't know. Never matches.
    Unknown(String),
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        match value.as_str() {
            "IN" => Operator::In,
            "NOT_IN" => Operator::NotIn,
            "STR_CONTAINS" => Operator::StrContains,
            "STR_STARTS_WITH" => Operator::StrStartsWith,
            "STR_ENDS_WITH" => Operator::StrEndsWith,
            "NUM_EQ" => Operator::NumEq,
            "NUM_GT" => Operator::NumGt,
            "NUM_GTE" => Operator::NumGte,
            "NUM_LT" => Operator::NumLt,
            "NUM_LTE" => Operator::NumLte,
            "DATE_AFTER" => Operator::DateAfter,
            "DATE_BEFORE" => Operator::DateBefore,
            "SEMVER_EQ" => Operator::SemverEq,
            "SEMVER_GT" => Operator::SemverGt,
            "SEMVER_LT" => Operator::SemverLt,
            _ => Operator::Unknown(value),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::In => f.write_str("IN"),
            Operator::NotIn => f.write_str("NOT_IN"),
            Operator::StrContains => f.write_str("STR_CONTAINS"),
            Operator::StrStartsWith => f.write_str("STR_STARTS_WITH"),
            Operator::StrEndsWith => f.write_str("STR_ENDS_WITH"),
            Operator::NumEq => f.write_str("NUM_EQ"),
            Operator::NumGt => f.write_str("NUM_GT"),
            Operator::NumGte => f.write_str("NUM_GTE"),
            Operator::NumLt => f.write_str("NUM_LT"),
            Operator::NumLte => f.write_str("NUM_LTE"),
            Operator::DateAfter => f.write_str("DATE_AFTER"),
            Operator::DateBefore => f.write_str("DATE_BEFORE"),
            Operator::SemverEq => f.write_str("SEMVER_EQ"),
            Operator::SemverGt => f.write_str("SEMVER_GT"),
            Operator::SemverLt => f.write_str("SEMVER_LT"),
            Operator::Unknown(op) => f.write_str(op),
        }
    }
}
