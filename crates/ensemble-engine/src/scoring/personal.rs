//! Profile-dependent components: style tags, novelty, skin synergy, and
//! proportion fit.

use std::collections::BTreeSet;

use ensemble_core::color::delta_e2000;
use ensemble_core::items::{Item, ShoulderStructure, Slot};
use ensemble_core::profile::{
    HeightClass, Profile, ShoulderHipRatio, SynergyStyle, TorsoLegRatio, Undertone,
    WaistDefinition,
};
use ensemble_core::registry::{F_COLOR, F_STYLE_TAGS};
use ensemble_core::ruleset::Thresholds;

use super::Component;

/// StyleTagMatch: Jaccard similarity of the bundle's tag union with the
/// profile's style signature, zeroed by any forbidden tag.
pub(super) fn style_tag_match(items: &[&Item], profile: &Profile) -> Component {
    let union: BTreeSet<&str> = items
        .iter()
        .flat_map(|i| i.style_tags.iter().map(String::as_str))
        .collect();

    if let Some(forbidden) = union
        .iter()
        .find(|t| profile.forbidden_tags.contains(**t))
    {
        return Component::new(0.0, 1.0, format!("forbidden tag '{forbidden}' present"));
    }

    if profile.style_signature.is_empty() {
        return Component::neutral("no style signature declared");
    }

    let signature: BTreeSet<&str> = profile.style_signature.iter().map(String::as_str).collect();
    let intersection = union.intersection(&signature).count();
    let union_size = union.union(&signature).count();
    let jaccard = if union_size == 0 {
        0.0
    } else {
        intersection as f64 / union_size as f64
    };

    let confidence = items
        .iter()
        .filter(|i| !i.style_tags.is_empty())
        .map(|i| i.confidence_for(F_STYLE_TAGS))
        .fold(1.0, f64::min);

    Component::new(
        jaccard,
        confidence,
        format!("{intersection} of {} signature tags matched", signature.len()),
    )
}

/// NoveltyVariety: penalize items worn in the recent window, decaying with
/// recency rank.
pub(super) fn novelty_variety(items: &[&Item], recent: &[String], t: &Thresholds) -> Component {
    if recent.is_empty() {
        return Component::new(1.0, 1.0, "no wear history");
    }

    let window = t.novelty_window.max(1) as f64;
    let mut penalty = 0.0;
    let mut hits = 0usize;
    for (rank, worn) in recent.iter().take(t.novelty_window).enumerate() {
        if items.iter().any(|i| i.item_id == *worn) {
            penalty += t.novelty_base_penalty * (1.0 - rank as f64 / window);
            hits += 1;
        }
    }

    Component::new(
        (1.0 - penalty).clamp(0.0, 1.0),
        1.0,
        format!("{hits} items worn recently"),
    )
}

/// SkinSynergy: near-face garment colors judged against the skin tone in
/// the preferred delta-E band.
pub(super) fn skin_synergy(items: &[&Item], profile: &Profile, t: &Thresholds) -> Component {
    let Some(appearance) = &profile.appearance_signature else {
        return Component::neutral("no appearance signature; neutral");
    };

    let near_face: Vec<(&Item, _)> = items
        .iter()
        .filter(|i| i.slot.is_near_face())
        .filter_map(|i| i.color.map(|c| (*i, c)))
        .collect();
    if near_face.is_empty() {
        return Component::neutral("no colored near-face items");
    }

    let style = appearance.synergy_style.unwrap_or(SynergyStyle::Auto);
    let resolved = match style {
        SynergyStyle::Auto => match appearance.undertone {
            Some(Undertone::Warm) => SynergyStyle::Harmonize,
            _ => SynergyStyle::Contrast,
        },
        other => other,
    };

    // Gaussian over the deviation from the preferred band edge.
    const SIGMA: f64 = 10.0;
    let mut sum = 0.0;
    for (_, color) in &near_face {
        let de = delta_e2000(&appearance.skin_lch, color);
        let deviation = match resolved {
            SynergyStyle::Contrast => (t.delta_e_distant - de).max(0.0),
            SynergyStyle::Harmonize => (de - t.delta_e_near).max(0.0),
            SynergyStyle::Auto => unreachable!("auto resolved above"),
        };
        sum += (-deviation * deviation / (2.0 * SIGMA * SIGMA)).exp();
    }
    let score = sum / near_face.len() as f64;

    let confidence = near_face
        .iter()
        .map(|(i, _)| i.confidence_for(F_COLOR))
        .fold(1.0, f64::min);

    let mode = match resolved {
        SynergyStyle::Contrast => "contrast",
        SynergyStyle::Harmonize => "harmonize",
        SynergyStyle::Auto => "auto",
    };
    Component::new(
        score,
        confidence,
        format!("{mode} synergy over {} near-face items", near_face.len()),
    )
}

/// ProportionFit: rule lookup keyed by the body signature.
pub(super) fn proportion_fit(items: &[&Item], profile: &Profile) -> Component {
    let Some(body) = &profile.body_signature else {
        return Component::neutral("no body signature; neutral");
    };

    let mut score: f64 = 0.7;
    let mut notes: Vec<String> = Vec::new();

    for item in items {
        match body.torso_leg_ratio {
            Some(TorsoLegRatio::LongTorso) => {
                if item.bottom_rise_class.as_deref() == Some("high") {
                    score += 0.15;
                    notes.push("high rise balances long torso".to_string());
                }
                if item.top_length_class.as_deref() == Some("longline") {
                    score -= 0.1;
                    notes.push("longline top lengthens torso further".to_string());
                }
            }
            Some(TorsoLegRatio::LongLegs) => {
                if matches!(item.bottom_rise_class.as_deref(), Some("mid") | Some("low")) {
                    score += 0.1;
                    notes.push("lower rise balances long legs".to_string());
                }
            }
            _ => {}
        }

        if body.height_class == Some(HeightClass::Petite)
            && item.slot == Slot::Outer
            && item.top_length_class.as_deref() == Some("longline")
        {
            score -= 0.15;
            notes.push("long outer overwhelms petite frame".to_string());
        }

        if body.shoulder_hip_ratio == Some(ShoulderHipRatio::BroadShoulders)
            && item.shoulder_structure == Some(ShoulderStructure::Structured)
        {
            score -= 0.1;
            notes.push("structured shoulder widens broad shoulders".to_string());
        }

        if body.waist_definition == Some(WaistDefinition::Defined) {
            if let Some(emphasis) = item.waist_emphasis.as_deref() {
                if matches!(emphasis, "belted" | "darted" | "wrap" | "empire") {
                    score += 0.1;
                    notes.push("waist emphasis flatters defined waist".to_string());
                }
            }
        }
    }

    let explanation = if notes.is_empty() {
        "no proportion rules triggered".to_string()
    } else {
        notes.join("; ")
    };
    Component::new(score.clamp(0.0, 1.0), 1.0, explanation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{item, with_color, with_tags};
    use ensemble_core::color::Lch;
    use ensemble_core::profile::{AppearanceSignature, BodySignature};

    fn profile_with_tags(tags: &[&str]) -> Profile {
        let mut p = Profile::neutral("u-1");
        p.style_signature = tags.iter().map(|t| t.to_string()).collect();
        p
    }

    #[test]
    fn test_forbidden_tag_zeroes_style_match() {
        let mut profile = profile_with_tags(&["minimal"]);
        profile.forbidden_tags.insert("neon".to_string());
        let items = [with_tags(item("a", "shirt", Slot::Top, 3), &["neon", "minimal"])];
        let refs: Vec<&_> = items.iter().collect();
        let c = style_tag_match(&refs, &profile);
        assert_eq!(c.score, 0.0);
        assert!(c.explanation.contains("neon"));
    }

    #[test]
    fn test_empty_signature_is_neutral() {
        let profile = Profile::neutral("u-1");
        let items = [with_tags(item("a", "shirt", Slot::Top, 3), &["minimal"])];
        let refs: Vec<&_> = items.iter().collect();
        assert!((style_tag_match(&refs, &profile).score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard_full_overlap() {
        let profile = profile_with_tags(&["minimal", "classic"]);
        let items = [
            with_tags(item("a", "shirt", Slot::Top, 3), &["minimal"]),
            with_tags(item("b", "trousers", Slot::Bottom, 3), &["classic"]),
        ];
        let refs: Vec<&_> = items.iter().collect();
        assert!((style_tag_match(&refs, &profile).score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_novelty_recent_item_penalized_with_decay() {
        let t = Thresholds::default();
        let items = [item("worn-1", "shirt", Slot::Top, 3)];
        let refs: Vec<&_> = items.iter().collect();

        let fresh = novelty_variety(&refs, &["other".to_string()], &t);
        assert!((fresh.score - 1.0).abs() < 1e-12);

        let newest = novelty_variety(&refs, &["worn-1".to_string()], &t);
        assert!((newest.score - 0.75).abs() < 1e-12, "full base penalty at rank 0");

        let older = novelty_variety(
            &refs,
            &["a".to_string(), "b".to_string(), "worn-1".to_string()],
            &t,
        );
        assert!(older.score > newest.score, "penalty decays with recency rank");
    }

    #[test]
    fn test_skin_synergy_neutral_without_appearance() {
        let t = Thresholds::default();
        let profile = Profile::neutral("u-1");
        let items = [with_color(item("a", "shirt", Slot::Top, 3), 50.0, 40.0, 20.0)];
        let refs: Vec<&_> = items.iter().collect();
        let c = skin_synergy(&refs, &profile, &t);
        assert!((c.score - 0.5).abs() < 1e-12);
        assert!((c.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_skin_synergy_contrast_prefers_distant_colors() {
        let t = Thresholds::default();
        let mut profile = Profile::neutral("u-1");
        profile.appearance_signature = Some(AppearanceSignature {
            skin_lch: Lch::new(65.0, 20.0, 60.0),
            undertone: Some(Undertone::Cool),
            hair_lch: None,
            eye_lch: None,
            synergy_style: Some(SynergyStyle::Contrast),
        });

        // Distant color: very dark top vs mid skin.
        let distant = [with_color(item("a", "shirt", Slot::Top, 3), 15.0, 30.0, 250.0)];
        // Near color: close to skin.
        let near = [with_color(item("a", "shirt", Slot::Top, 3), 66.0, 21.0, 62.0)];
        let d_refs: Vec<&_> = distant.iter().collect();
        let n_refs: Vec<&_> = near.iter().collect();
        assert!(
            skin_synergy(&d_refs, &profile, &t).score > skin_synergy(&n_refs, &profile, &t).score
        );
    }

    #[test]
    fn test_proportion_neutral_without_body() {
        let profile = Profile::neutral("u-1");
        let items = [item("a", "trousers", Slot::Bottom, 3)];
        let refs: Vec<&_> = items.iter().collect();
        assert!((proportion_fit(&refs, &profile).score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_long_torso_rewards_high_rise() {
        let mut profile = Profile::neutral("u-1");
        profile.body_signature = Some(BodySignature {
            torso_leg_ratio: Some(TorsoLegRatio::LongTorso),
            ..BodySignature::default()
        });

        let mut high = item("a", "trousers", Slot::Bottom, 3);
        high.bottom_rise_class = Some("high".to_string());
        let low = item("b", "trousers", Slot::Bottom, 3);

        let h = [high];
        let l = [low];
        let h_refs: Vec<&_> = h.iter().collect();
        let l_refs: Vec<&_> = l.iter().collect();
        assert!(
            proportion_fit(&h_refs, &profile).score > proportion_fit(&l_refs, &profile).score
        );
    }
}
