//! Garment-composition components: pattern mix, silhouette balance,
//! formality closeness, and temperature fit.

use ensemble_core::items::{Item, Slot, TempBand, VolumeClass};
use ensemble_core::registry::{F_FIT_PROFILE, F_FORMALITY, F_PATTERN, F_SEASONALITY};
use ensemble_core::ruleset::Thresholds;

use super::Component;

/// PatternMix: one statement pattern is free; each extra pattern eats into
/// the score, and items sharing a pattern scale clash.
pub(super) fn pattern_mix(items: &[&Item], t: &Thresholds) -> Component {
    let patterned: Vec<&&Item> = items.iter().filter(|i| i.is_patterned()).collect();
    let p = patterned.len();

    let base = if t.max_patterns > 1 {
        1.0 - (p.saturating_sub(1) as f64) / ((t.max_patterns - 1) as f64)
    } else if p > 1 {
        0.0
    } else {
        1.0
    };

    let mut scale_clashes = 0usize;
    for (i, a) in patterned.iter().enumerate() {
        for b in patterned.iter().skip(i + 1) {
            let (Some(pa), Some(pb)) = (a.pattern, b.pattern) else {
                continue;
            };
            if let (Some(sa), Some(sb)) = (pa.scale, pb.scale) {
                if sa == sb {
                    scale_clashes += 1;
                }
            }
        }
    }

    let score = (base - t.pattern_scale_penalty * scale_clashes as f64).clamp(0.0, 1.0);
    let confidence = patterned
        .iter()
        .map(|i| i.confidence_for(F_PATTERN))
        .fold(1.0, f64::min);

    Component::new(
        score,
        confidence,
        format!("{p} patterned items, {scale_clashes} scale clashes"),
    )
}

fn pair_volume_score(a: VolumeClass, b: VolumeClass) -> f64 {
    use VolumeClass::*;
    match (a, b) {
        (Fitted, Voluminous) | (Voluminous, Fitted) => 1.0,
        (x, y) if x == y => 0.6,
        _ => 0.8,
    }
}

/// SilhouetteBalance: reward volume contrast between top and bottom
/// layers; penalize stacking structured shoulders.
pub(super) fn silhouette_balance(items: &[&Item]) -> Component {
    let tops: Vec<&&Item> = items
        .iter()
        .filter(|i| i.slot == Slot::Top && i.fit_profile.is_some())
        .collect();
    let bottoms: Vec<&&Item> = items
        .iter()
        .filter(|i| i.slot == Slot::Bottom && i.fit_profile.is_some())
        .collect();

    let mut score;
    let explanation;
    if tops.is_empty() || bottoms.is_empty() {
        score = 0.7;
        explanation = "no top/bottom volume pair to balance".to_string();
    } else {
        let mut sum = 0.0;
        let mut n = 0usize;
        for top in &tops {
            for bottom in &bottoms {
                let (Some(ft), Some(fb)) = (top.fit_profile, bottom.fit_profile) else {
                    continue;
                };
                sum += pair_volume_score(ft.volume_class(), fb.volume_class());
                n += 1;
            }
        }
        score = sum / n as f64;
        explanation = format!("volume contrast over {n} top/bottom pairs");
    }

    let structured = items
        .iter()
        .filter(|i| {
            matches!(
                i.shoulder_structure,
                Some(ensemble_core::items::ShoulderStructure::Structured)
            )
        })
        .count();
    if structured > 1 {
        score -= 0.2;
    }

    let confidence = items
        .iter()
        .filter(|i| i.fit_profile.is_some())
        .map(|i| i.confidence_for(F_FIT_PROFILE))
        .fold(1.0, f64::min);

    Component::new(score.clamp(0.0, 1.0), confidence, explanation)
}

/// Slots whose formality counts double: the visually dominant layers.
fn formality_weight(slot: Slot) -> f64 {
    match slot {
        Slot::Top | Slot::Outer | Slot::Footwear => 2.0,
        _ => 1.0,
    }
}

/// FormalityCloseness: weighted mean distance of item formality from the
/// dressiness target.
pub(super) fn formality_closeness(items: &[&Item], target: u8) -> Component {
    if items.is_empty() {
        return Component::new(1.0, 1.0, "empty bundle");
    }

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for item in items {
        let w = formality_weight(item.slot);
        weighted_sum += w * item.formality as f64;
        weight_sum += w;
    }
    let avg = weighted_sum / weight_sum;
    let score = (1.0 - (avg - target as f64).abs() / 4.0).clamp(0.0, 1.0);

    let confidence = items
        .iter()
        .map(|i| i.confidence_for(F_FORMALITY))
        .fold(1.0, f64::min);

    Component::new(
        score,
        confidence,
        format!("weighted formality {avg:.1} vs target {target}"),
    )
}

/// TemperatureFit: fraction of items rated for the band, with a bonus for
/// an outer layer in cold weather.
pub(super) fn temperature_fit(items: &[&Item], band: TempBand) -> Component {
    if items.is_empty() {
        return Component::new(1.0, 1.0, "empty bundle");
    }

    let suited = items
        .iter()
        .filter(|i| i.seasonality.contains(&band))
        .count();
    let mut score = suited as f64 / items.len() as f64;

    let has_outer = items.iter().any(|i| i.slot == Slot::Outer);
    if band == TempBand::Cold && has_outer {
        score = (score + 0.1).min(1.0);
    }

    let confidence = items
        .iter()
        .map(|i| i.confidence_for(F_SEASONALITY))
        .fold(1.0, f64::min);

    Component::new(
        score,
        confidence,
        format!("{suited}/{} items rated for {}", items.len(), band.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{item, with_fit, with_pattern};
    use ensemble_core::items::{FitProfile, PatternKind, PatternScale};

    #[test]
    fn test_single_pattern_is_free() {
        let t = Thresholds::default();
        let items = [
            with_pattern(item("a", "shirt", Slot::Top, 3), PatternKind::Stripe, Some(PatternScale::Small)),
            item("b", "trousers", Slot::Bottom, 3),
        ];
        let refs: Vec<&_> = items.iter().collect();
        assert!((pattern_mix(&refs, &t).score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shared_scale_penalized() {
        let t = Thresholds::default();
        let clash = [
            with_pattern(item("a", "shirt", Slot::Top, 3), PatternKind::Stripe, Some(PatternScale::Small)),
            with_pattern(item("b", "trousers", Slot::Bottom, 3), PatternKind::Check, Some(PatternScale::Small)),
        ];
        let mixed = [
            with_pattern(item("a", "shirt", Slot::Top, 3), PatternKind::Stripe, Some(PatternScale::Small)),
            with_pattern(item("b", "trousers", Slot::Bottom, 3), PatternKind::Check, Some(PatternScale::Large)),
        ];
        let clash_refs: Vec<&_> = clash.iter().collect();
        let mixed_refs: Vec<&_> = mixed.iter().collect();
        assert!(pattern_mix(&clash_refs, &t).score < pattern_mix(&mixed_refs, &t).score);
    }

    #[test]
    fn test_volume_contrast_beats_same_on_same() {
        let contrast = [
            with_fit(item("a", "shirt", Slot::Top, 3), FitProfile::Oversized),
            with_fit(item("b", "trousers", Slot::Bottom, 3), FitProfile::Slim),
        ];
        let same = [
            with_fit(item("a", "shirt", Slot::Top, 3), FitProfile::Oversized),
            with_fit(item("b", "trousers", Slot::Bottom, 3), FitProfile::Relaxed),
        ];
        let c_refs: Vec<&_> = contrast.iter().collect();
        let s_refs: Vec<&_> = same.iter().collect();
        let c = silhouette_balance(&c_refs);
        let s = silhouette_balance(&s_refs);
        assert!((c.score - 1.0).abs() < 1e-12);
        assert!((s.score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_double_structured_layers_penalized() {
        let mut jacket = with_fit(item("a", "jacket", Slot::Outer, 4), FitProfile::Regular);
        jacket.shoulder_structure = Some(ensemble_core::items::ShoulderStructure::Structured);
        let mut blazer = with_fit(item("b", "blazer", Slot::Mid, 4), FitProfile::Regular);
        blazer.shoulder_structure = Some(ensemble_core::items::ShoulderStructure::Structured);
        let items = [jacket, blazer];
        let refs: Vec<&_> = items.iter().collect();
        assert!((silhouette_balance(&refs).score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_formality_exact_match_is_perfect() {
        let items = [
            item("a", "shirt", Slot::Top, 4),
            item("b", "trousers", Slot::Bottom, 4),
        ];
        let refs: Vec<&_> = items.iter().collect();
        assert!((formality_closeness(&refs, 4).score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_formality_dominant_slots_weighted_double() {
        // Footwear at 1 drags a target-5 outfit down more than a belt at 1.
        let heavy = [item("a", "shoes", Slot::Footwear, 1), item("b", "shirt", Slot::Top, 5)];
        let light = [item("a", "belt", Slot::Belt, 1), item("b", "shirt", Slot::Top, 5)];
        let h_refs: Vec<&_> = heavy.iter().collect();
        let l_refs: Vec<&_> = light.iter().collect();
        assert!(formality_closeness(&h_refs, 5).score < formality_closeness(&l_refs, 5).score);
    }

    #[test]
    fn test_cold_outer_bonus() {
        let mut coat = item("a", "coat", Slot::Outer, 3);
        coat.seasonality = [TempBand::Cold].into_iter().collect();
        let mut shirt = item("b", "shirt", Slot::Top, 3);
        shirt.seasonality = [TempBand::Warm].into_iter().collect();
        let items = [coat, shirt];
        let refs: Vec<&_> = items.iter().collect();
        let c = temperature_fit(&refs, TempBand::Cold);
        assert!((c.score - 0.6).abs() < 1e-12, "0.5 coverage + 0.1 outer bonus");
    }
}
