use crate::model::enums::Operator;
use crate::model::feature::Constraint;
use crate::Context;
use chrono::{DateTime, Utc};
use semver::Version;

pub fn all_match(constraints: &[Constraint], context: &Context) -> bool {
    constraints.iter().all(|c| is_match(c, context))
}

pub fn is_match(constraint: &Constraint, context: &Context) -> bool {
    if let Operator::Unknown(_) = constraint.operator {
        return false;
    }
    let result = eval_operator(constraint, context);
    result != constraint.inverted
}

fn eval_operator(constraint: &Constraint, context: &Context) -> bool {
    let field = context.field(constraint.context_name.as_str());
    let field = match (&constraint.operator, field) {
        (Operator::NotIn, None) => return true,
        (_, None) => return false,
        (_, Some(field)) => field,
    };
    let user_val = field.as_ref();
    match &constraint.operator {
        Operator::In => contains(constraint, user_val),
        Operator::NotIn => !contains(constraint, user_val),
        Operator::StrContains | Operator::StrStartsWith | Operator::StrEndsWith => {
            eval_string(constraint, user_val)
        }
        Operator::NumEq
        | Operator::NumGt
        | Operator::NumGte
        | Operator::NumLt
        | Operator::NumLte => eval_number(constraint, user_val),
        Operator::DateAfter | Operator::DateBefore => eval_date(constraint, user_val),
        Operator::SemverEq | Operator::SemverGt | Operator::SemverLt => {
            eval_semver(constraint, user_val)
        }
        Operator::Unknown(_) => false,
    }
}

fn single_value(constraint: &Constraint) -> Option<&str> {
    constraint
        .value
        .as_deref()
        .or_else(|| constraint.values.first().map(|v| v.as_str()))
}

fn contains(constraint: &Constraint, user_val: &str) -> bool {
    if constraint.case_insensitive {
        constraint
            .values
            .iter()
            .any(|v| v.to_lowercase() == user_val.to_lowercase())
    } else {
        constraint.values.iter().any(|v| v == user_val)
    }
}

fn eval_string(constraint: &Constraint, user_val: &str) -> bool {
    let user_val = if constraint.case_insensitive {
        user_val.to_lowercase()
    } else {
        user_val.to_owned()
    };
    constraint.values.iter().any(|v| {
        let comp_val = if constraint.case_insensitive {
            v.to_lowercase()
        } else {
            v.to_owned()
        };
        match constraint.operator {
            Operator::StrContains => user_val.contains(comp_val.as_str()),
            Operator::StrStartsWith => user_val.starts_with(comp_val.as_str()),
            _ => user_val.ends_with(comp_val.as_str()),
        }
    })
}

fn eval_number(constraint: &Constraint, user_val: &str) -> bool {
    let user_num = if let Ok(num) = user_val.trim().parse::<f64>() {
        num
    } else {
        return false;
    };
    let comp_num = if let Some(num) = single_value(constraint).and_then(|v| v.trim().parse::<f64>().ok()) {
        num
    } else {
        return false;
    };
    match constraint.operator {
        Operator::NumEq => user_num == comp_num,
        Operator::NumGt => user_num > comp_num,
        Operator::NumGte => user_num >= comp_num,
        Operator::NumLt => user_num < comp_num,
        _ => user_num <= comp_num,
    }
}

fn parse_date(val: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(val.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn eval_date(constraint: &Constraint, user_val: &str) -> bool {
    let (user_date, comp_date) = match (parse_date(user_val), single_value(constraint).and_then(parse_date)) {
        (Some(user_date), Some(comp_date)) => (user_date, comp_date),
        _ => return false,
    };
    match constraint.operator {
        Operator::DateAfter => user_date > comp_date,
        _ => user_date < comp_date,
    }
}

fn eval_semver(constraint: &Constraint, user_val: &str) -> bool {
    let user_ver = if let Ok(ver) = Version::parse(user_val.trim()) {
        ver
    } else {
        return false;
    };
    let comp_ver = if let Some(ver) = single_value(constraint).and_then(|v| Version::parse(v.trim()).ok()) {
        ver
    } else {
        return false;
    };
    match constraint.operator {
        Operator::SemverEq => user_ver == comp_ver,
        Operator::SemverGt => user_ver > comp_ver,
        _ => user_ver < comp_ver,
    }
}
