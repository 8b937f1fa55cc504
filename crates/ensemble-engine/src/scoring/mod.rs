//! Soft-scoring stack: ten pure components aggregated under renormalized
//! rule-set weights.
//!
//! Every component is a deterministic, side-effect-free function of the
//! committed items plus rule set, profile, and context, returning a score
//! in `[0, 1]`, a confidence (minimum over the attribute confidences it
//! consumed), and an explanation string. Components whose profile inputs
//! are absent report exactly the neutral score with full weight retained,
//! so a reported breakdown always reconstructs the aggregate.

mod accessory;
mod composition;
mod palette;
mod personal;

use ensemble_core::bundle::ComponentScore;
use ensemble_core::items::{Item, TempBand};
use ensemble_core::profile::Profile;
use ensemble_core::ruleset::RuleSet;

pub(crate) use palette::pair_palette_score;

/// A single component's raw output before weighting.
#[derive(Debug, Clone)]
pub struct Component {
    pub score: f64,
    pub confidence: f64,
    pub explanation: String,
}

impl Component {
    pub fn new(score: f64, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            explanation: explanation.into(),
        }
    }

    /// Neutral fallback when a component's profile inputs are absent.
    pub fn neutral(explanation: impl Into<String>) -> Self {
        Self::new(ensemble_core::defaults::NEUTRAL_SCORE, 1.0, explanation)
    }
}

/// Immutable scoring context for one request.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub ruleset: &'a RuleSet,
    pub profile: &'a Profile,
    pub target_dressiness: u8,
    pub band: TempBand,
    /// Recently worn item ids, most recent first.
    pub recent: &'a [String],
}

/// Full score breakdown for a (partial or complete) bundle.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub aggregate: f64,
    pub components: Vec<ComponentScore>,
}

/// Score a set of committed items.
///
/// Weights are renormalized over the configured components, then each
/// contribution is `weight * score * confidence`. The same function drives
/// running scores during beam expansion and the final reported breakdown.
pub fn score_items(items: &[&Item], ctx: &ScoreContext<'_>) -> ScoreBreakdown {
    let t = &ctx.ruleset.thresholds;

    let raw = [
        palette::palette_harmony(items, t),
        composition::pattern_mix(items, t),
        composition::silhouette_balance(items),
        composition::formality_closeness(items, ctx.target_dressiness),
        composition::temperature_fit(items, ctx.band),
        personal::style_tag_match(items, ctx.profile),
        personal::novelty_variety(items, ctx.recent, t),
        accessory::accessory_consistency(items, ctx.ruleset.accessory_mode),
        personal::skin_synergy(items, ctx.profile, t),
        personal::proportion_fit(items, ctx.profile),
    ];

    let pairs = ctx.ruleset.weights.as_pairs();
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();

    let mut aggregate = 0.0;
    let mut components = Vec::with_capacity(raw.len());
    for ((name, weight), component) in pairs.into_iter().zip(raw) {
        let normalized = weight / total;
        aggregate += normalized * component.score * component.confidence;
        components.push(ComponentScore {
            component: name.to_string(),
            score: component.score,
            weight: normalized,
            confidence: component.confidence,
            explanation: component.explanation,
        });
    }

    ScoreBreakdown {
        aggregate,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{context_items, item, with_color};
    use ensemble_core::items::Slot;
    use ensemble_core::profile::Profile;
    use ensemble_core::ruleset::RuleSet;

    #[test]
    fn test_aggregate_within_bounds() {
        let ruleset = RuleSet::builtin();
        let profile = Profile::neutral("u-1");
        let items = [
            with_color(item("shirt-1", "shirt", Slot::Top, 4), 95.0, 2.0, 180.0),
            with_color(item("trousers-1", "trousers", Slot::Bottom, 4), 25.0, 2.0, 250.0),
            with_color(item("shoes-1", "shoes", Slot::Footwear, 5), 5.0, 1.0, 0.0),
        ];
        let refs: Vec<&_> = items.iter().collect();
        let ctx = ScoreContext {
            ruleset: &ruleset,
            profile: &profile,
            target_dressiness: 4,
            band: TempBand::Warm,
            recent: &[],
        };
        let breakdown = score_items(&refs, &ctx);

        assert!((0.0..=1.0).contains(&breakdown.aggregate));
        for c in &breakdown.components {
            assert!((0.0..=1.0).contains(&c.score), "{}: {}", c.component, c.score);
            assert!((0.0..=1.0).contains(&c.confidence));
        }
    }

    #[test]
    fn test_breakdown_reconstructs_aggregate() {
        let ruleset = RuleSet::builtin();
        let profile = Profile::neutral("u-1");
        let items = context_items();
        let refs: Vec<&_> = items.iter().collect();
        let ctx = ScoreContext {
            ruleset: &ruleset,
            profile: &profile,
            target_dressiness: 3,
            band: TempBand::Mild,
            recent: &[],
        };
        let breakdown = score_items(&refs, &ctx);

        let reconstructed: f64 = breakdown
            .components
            .iter()
            .map(|c| c.weight * c.score * c.confidence)
            .sum();
        assert!((reconstructed - breakdown.aggregate).abs() < 1e-9);
    }

    #[test]
    fn test_absent_signatures_yield_exact_neutral() {
        let ruleset = RuleSet::builtin();
        let profile = Profile::neutral("u-1");
        let items = context_items();
        let refs: Vec<&_> = items.iter().collect();
        let ctx = ScoreContext {
            ruleset: &ruleset,
            profile: &profile,
            target_dressiness: 3,
            band: TempBand::Mild,
            recent: &[],
        };
        let breakdown = score_items(&refs, &ctx);

        for name in ["skin_synergy", "proportion_fit"] {
            let c = breakdown
                .components
                .iter()
                .find(|c| c.component == name)
                .unwrap();
            assert!((c.score - 0.5).abs() < 1e-12, "{name} should be neutral");
            assert!(c.weight > 0.0);
        }
    }

    #[test]
    fn test_all_ten_components_reported() {
        let ruleset = RuleSet::builtin();
        let profile = Profile::neutral("u-1");
        let items = context_items();
        let refs: Vec<&_> = items.iter().collect();
        let ctx = ScoreContext {
            ruleset: &ruleset,
            profile: &profile,
            target_dressiness: 3,
            band: TempBand::Mild,
            recent: &[],
        };
        let breakdown = score_items(&refs, &ctx);
        assert_eq!(breakdown.components.len(), 10);

        let weight_sum: f64 = breakdown.components.iter().map(|c| c.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9, "weights renormalize to 1");
    }
}
