use crate::eval::evaluator::stickiness_value;
use crate::model::feature::{FlagDefinition, VariantDefinition};
use crate::utils::normalized_hash;
use crate::{Context, Variant};
use std::borrow::Cow;

const DEFAULT_STICKINESS: &str = "default";

/// Selects a variant of an enabled flag for the given `context`.
///
/// Overrides win over weighted selection. Returns [`None`] when the flag has no
/// variants, all of their weights are zero or their sum doesn't fit in a `u32`.
pub fn select_variant(flag: &FlagDefinition, context: &Context) -> Option<Variant> {
    if flag.variants.is_empty() {
        return None;
    }
    if let Some(overridden) = find_override(&flag.variants, context) {
        return Some(to_variant(overridden));
    }
    let total_weight = flag
        .variants
        .iter()
        .map(|v| u64::from(v.weight))
        .sum::<u64>();
    let total_weight = u32::try_from(total_weight).ok().filter(|total| *total > 0)?;
    let stickiness = flag.variants[0]
        .stickiness
        .as_deref()
        .unwrap_or(DEFAULT_STICKINESS);
    let sticky = stickiness_value(stickiness, context)
        .unwrap_or_else(|| Cow::Owned(rand::random::<u64>().to_string()));
    let target = normalized_hash(sticky.as_ref(), flag.name.as_str(), total_weight);

    let mut counter = 0u32;
    for variant in flag.variants.iter() {
        if variant.weight == 0 {
            continue;
        }
        counter += variant.weight;
        if target <= counter {
            return Some(to_variant(variant));
        }
    }
    None
}

fn find_override<'a>(
    variants: &'a [VariantDefinition],
    context: &Context,
) -> Option<&'a VariantDefinition> {
    variants.iter().find(|variant| {
        variant.overrides.iter().any(|o| {
            context
                .field(o.context_name.as_str())
                .is_some_and(|val| o.values.iter().any(|v| v == val.as_ref()))
        })
    })
}

fn to_variant(definition: &VariantDefinition) -> Variant {
    Variant::new(definition.name.as_str(), definition.payload.clone())
}
