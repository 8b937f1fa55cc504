//! Palette harmony: pairwise hue relations over non-neutral items, scaled
//! by circular hue spread, with neutrals as harmony boosters.

use ensemble_core::color::{circular_stddev_deg, relation, HueRelation, Lch};
use ensemble_core::items::Item;
use ensemble_core::registry::F_COLOR;
use ensemble_core::ruleset::Thresholds;

use super::Component;

/// Base score by dominant pairwise relation.
fn relation_base(rel: HueRelation) -> f64 {
    match rel {
        HueRelation::Same => 0.8,
        HueRelation::Analogous => 0.9,
        HueRelation::Complementary => 0.85,
        HueRelation::Triadic => 0.7,
        HueRelation::Unrelated => 0.3,
    }
}

/// Score contribution of a candidate color against one fixed color, used
/// by the replace planner's compatibility ranking.
pub(crate) fn pair_palette_score(a: &Lch, b: &Lch, t: &Thresholds) -> f64 {
    if is_neutral_at(a, t) || is_neutral_at(b, t) {
        return 0.85;
    }
    relation_base(relation(a, b))
}

fn is_neutral_at(c: &Lch, t: &Thresholds) -> bool {
    c.c < t.neutral_chroma
        || c.l <= ensemble_core::defaults::NEUTRAL_L_DARK
        || c.l >= ensemble_core::defaults::NEUTRAL_L_LIGHT
}

/// PaletteHarmony component.
pub(super) fn palette_harmony(items: &[&Item], t: &Thresholds) -> Component {
    let colored: Vec<(&Item, Lch)> = items
        .iter()
        .filter_map(|i| i.color.map(|c| (*i, c)))
        .collect();

    if colored.is_empty() {
        return Component::new(0.85, 1.0, "no colored items; palette unconstrained");
    }

    let confidence = colored
        .iter()
        .map(|(i, _)| i.confidence_for(F_COLOR))
        .fold(1.0, f64::min);

    let (neutrals, chromatic): (Vec<_>, Vec<_>) =
        colored.iter().partition(|(_, c)| is_neutral_at(c, t));
    let neutral_boost = 0.05 * (neutrals.len().min(2) as f64);

    if chromatic.len() < 2 {
        // A palette carried by neutrals (or one accent) is inherently
        // cohesive.
        let score = (0.85 + neutral_boost).min(1.0);
        return Component::new(
            score,
            confidence,
            format!(
                "neutral-led palette ({} neutral, {} accent)",
                neutrals.len(),
                chromatic.len()
            ),
        );
    }

    // Count pairwise relations; pick the dominant one deterministically.
    let mut counts: [(HueRelation, usize); 5] = [
        (HueRelation::Same, 0),
        (HueRelation::Analogous, 0),
        (HueRelation::Complementary, 0),
        (HueRelation::Triadic, 0),
        (HueRelation::Unrelated, 0),
    ];
    let mut pair_count = 0usize;
    for (i, (_, a)) in chromatic.iter().enumerate() {
        for (_, b) in chromatic.iter().skip(i + 1) {
            let rel = relation(a, b);
            for slot in counts.iter_mut() {
                if slot.0 == rel {
                    slot.1 += 1;
                }
            }
            pair_count += 1;
        }
    }
    // First maximum wins so ties resolve toward the stronger relation.
    let mut dominant = counts[0].0;
    let mut dominant_count = counts[0].1;
    for (rel, n) in counts.iter().skip(1) {
        if *n > dominant_count {
            dominant = *rel;
            dominant_count = *n;
        }
    }

    let hues: Vec<f64> = chromatic.iter().map(|(_, c)| c.hue).collect();
    let sigma = circular_stddev_deg(&hues);
    let spread_factor = 1.0 - (sigma / 60.0).min(1.0);

    let score = (relation_base(dominant) * spread_factor + neutral_boost).clamp(0.0, 1.0);
    Component::new(
        score,
        confidence,
        format!(
            "dominant {dominant:?} over {pair_count} pairs, hue spread {sigma:.0} deg, {} neutrals",
            neutrals.len()
        ),
    )
}
