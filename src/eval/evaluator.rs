use crate::context::{SESSION_ID, USER_ID};
use crate::errors::ErrorKind;
use crate::eval::constraints::all_match;
use crate::model::enums::StrategyKind;
use crate::model::feature::{
    FlagDefinition, Strategy, GROUP_ID_PARAM, HOST_NAMES_PARAM, IPS_PARAM, ROLLOUT_PARAM,
    STICKINESS_PARAM, USER_IDS_PARAM,
};
use crate::strategy::StrategyRegistry;
use crate::utils::normalized_hash;
use crate::Context;
use log::warn;
use std::borrow::Cow;
use std::net::IpAddr;
use thiserror::Error;

const DEFAULT_STICKINESS: &str = "default";
const RANDOM_STICKINESS: &str = "random";
const ROLLOUT_NORMALIZER: u32 = 100;

#[derive(Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("strategy '{0}' is not supported")]
    UnsupportedStrategy(String),
    #[error("strategy '{0}' is invalid: {1}")]
    Invalid(String, String),
}

/// Evaluates the flag's strategies in order and returns the first one that activates.
///
/// Returns `Ok(None)` when the flag is disabled or none of its strategies activates.
/// Strategies without an implementation are treated as non-activating.
pub fn eval_flag<'a>(
    flag: &'a FlagDefinition,
    context: &Context,
    registry: &StrategyRegistry,
    hostname: &str,
) -> Result<Option<&'a Strategy>, EvalError> {
    if !flag.enabled {
        return Ok(None);
    }
    for strategy in flag.strategies.iter() {
        match evaluate(strategy, context, registry, hostname) {
            Ok(true) => return Ok(Some(strategy)),
            Ok(false) => {}
            Err(EvalError::UnsupportedStrategy(name)) => {
                warn!(event_id = ErrorKind::UnsupportedStrategy.as_u16(); "Strategy '{name}' of flag '{}' is not supported, treating it as not activated.", flag.name);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}

/// Decides whether a single strategy activates for the given `context`.
///
/// Constraints are checked first, a mismatch short-circuits to `false`.
pub fn evaluate(
    strategy: &Strategy,
    context: &Context,
    registry: &StrategyRegistry,
    hostname: &str,
) -> Result<bool, EvalError> {
    if !all_match(&strategy.constraints, context) {
        return Ok(false);
    }
    match &strategy.kind {
        StrategyKind::Default => Ok(true),
        StrategyKind::GradualRollout => eval_rollout(strategy, context),
        StrategyKind::UserIds => Ok(eval_user_ids(strategy, context)),
        StrategyKind::IpRange => Ok(eval_ip_range(strategy, context)),
        StrategyKind::Hostname => Ok(eval_hostname(strategy, hostname)),
        StrategyKind::Custom(name) => match registry.get(name) {
            Some(custom) => Ok(custom.is_enabled(&strategy.parameters, context)),
            None => Err(EvalError::UnsupportedStrategy(name.clone())),
        },
    }
}

/// Resolves the value used for sticky bucketing.
pub(crate) fn stickiness_value<'a>(stickiness: &str, context: &'a Context) -> Option<Cow<'a, str>> {
    match stickiness {
        DEFAULT_STICKINESS => context
            .field(USER_ID)
            .or_else(|| context.field(SESSION_ID))
            .or_else(|| Some(random_id())),
        RANDOM_STICKINESS => Some(random_id()),
        field => context.field(field),
    }
}

fn random_id() -> Cow<'static, str> {
    Cow::Owned(rand::random::<u64>().to_string())
}

fn eval_rollout(strategy: &Strategy, context: &Context) -> Result<bool, EvalError> {
    let rollout = parse_rollout(strategy)?;
    if rollout <= 0.0 {
        return Ok(false);
    }
    let stickiness = strategy.param(STICKINESS_PARAM).unwrap_or(DEFAULT_STICKINESS);
    let sticky = match stickiness_value(stickiness, context) {
        Some(sticky) => sticky,
        None => return Ok(false),
    };
    let group = strategy.param(GROUP_ID_PARAM).unwrap_or_default();
    let bucket = normalized_hash(sticky.as_ref(), group, ROLLOUT_NORMALIZER);
    Ok(f64::from(bucket) <= rollout)
}

fn parse_rollout(strategy: &Strategy) -> Result<f64, EvalError> {
    let raw = if let Some(raw) = strategy.param(ROLLOUT_PARAM) {
        raw
    } else {
        return Err(EvalError::Invalid(
            strategy.name.clone(),
            "rollout parameter is missing".to_owned(),
        ));
    };
    match raw.trim().parse::<f64>() {
        Ok(val) if (0.0..=100.0).contains(&val) => Ok(val),
        _ => Err(EvalError::Invalid(
            strategy.name.clone(),
            format!("rollout '{raw}' is not a percentage"),
        )),
    }
}

fn eval_user_ids(strategy: &Strategy, context: &Context) -> bool {
    let user_id = if let Some(user_id) = context.get_user_id() {
        user_id
    } else {
        return false;
    };
    strategy
        .param(USER_IDS_PARAM)
        .unwrap_or_default()
        .split(',')
        .any(|id| id.trim() == user_id)
}

fn eval_ip_range(strategy: &Strategy, context: &Context) -> bool {
    let remote = if let Some(remote) = context.get_remote_address() {
        remote.trim()
    } else {
        return false;
    };
    let remote_ip = remote.parse::<IpAddr>().ok();
    for entry in strategy.param(IPS_PARAM).unwrap_or_default().split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if entry == remote {
            return true;
        }
        let ip = if let Some(ip) = remote_ip {
            ip
        } else {
            continue;
        };
        let matched = if entry.contains('/') {
            cidr_contains(entry, &ip).unwrap_or(false)
        } else {
            entry.parse::<IpAddr>().is_ok_and(|e| e == ip)
        };
        if matched {
            return true;
        }
    }
    false
}

fn cidr_contains(range: &str, addr: &IpAddr) -> Option<bool> {
    let (net, bits) = range.split_once('/')?;
    let net = net.trim().parse::<IpAddr>().ok()?;
    let bits = bits.trim().parse::<u32>().ok()?;
    match (net, addr) {
        (IpAddr::V4(net), IpAddr::V4(addr)) => {
            if bits > 32 {
                return None;
            }
            let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
            Some(u32::from(net) & mask == u32::from(*addr) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(addr)) => {
            if bits > 128 {
                return None;
            }
            let mask = u128::MAX.checked_shl(128 - bits).unwrap_or(0);
            Some(u128::from(net) & mask == u128::from(*addr) & mask)
        }
        _ => Some(false),
    }
}

fn eval_hostname(strategy: &Strategy, hostname: &str) -> bool {
    strategy
        .param(HOST_NAMES_PARAM)
        .unwrap_or_default()
        .split(',')
        .any(|h| !h.trim().is_empty() && h.trim().eq_ignore_ascii_case(hostname))
}
