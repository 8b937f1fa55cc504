//! Accessory consistency: leather and metal family agreement across the
//! bundle, enforced per the rule set's accessory mode.

use std::collections::BTreeSet;

use ensemble_core::items::Item;
use ensemble_core::registry::{F_LEATHER, F_METAL, F_METAL_FINISH};
use ensemble_core::ruleset::AccessoryMode;

use super::Component;

/// AccessoryConsistency component.
///
/// Under `strict_family` any mismatch zeroes the score; under
/// `coordinated` each mismatch costs half the score; `free` always passes.
pub(super) fn accessory_consistency(items: &[&Item], mode: AccessoryMode) -> Component {
    if mode == AccessoryMode::Free {
        return Component::new(1.0, 1.0, "accessory mode free");
    }

    let leather_families: BTreeSet<&str> = items
        .iter()
        .filter_map(|i| i.leather_family.as_deref())
        .collect();
    let metal_pairs: BTreeSet<(&str, &str)> = items
        .iter()
        .filter_map(|i| {
            i.metal_family
                .as_deref()
                .map(|family| (family, i.metal_finish.as_deref().unwrap_or("")))
        })
        .collect();

    let mismatches =
        leather_families.len().saturating_sub(1) + metal_pairs.len().saturating_sub(1);

    let mut confidence: f64 = 1.0;
    for item in items.iter() {
        if item.leather_family.is_some() {
            confidence = confidence.min(item.confidence_for(F_LEATHER));
        }
        if item.metal_family.is_some() {
            confidence = confidence
                .min(item.confidence_for(F_METAL))
                .min(item.confidence_for(F_METAL_FINISH));
        }
    }

    let score = match mode {
        AccessoryMode::StrictFamily => {
            if mismatches > 0 {
                0.0
            } else {
                1.0
            }
        }
        AccessoryMode::Coordinated => (1.0 - 0.5 * mismatches as f64).max(0.0),
        AccessoryMode::Free => 1.0,
    };

    Component::new(
        score,
        confidence,
        format!(
            "{} leather families, {} metal variants, {mismatches} mismatches",
            leather_families.len(),
            metal_pairs.len()
        ),
    )
}
