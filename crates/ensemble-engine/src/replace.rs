//! Replace planner: single-slot replacement with group-aware cascade
//! plans.
//!
//! The policy of the item currently in the target slot decides the search:
//! strict sets only swap whole-group (same-group members free, other
//! groups behind a cascade plan), prefer-strict sets try same-group first
//! and pay a penalty for breaking, loose items rank by unary score times
//! compatibility with the fixed items.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use ensemble_core::bundle::{Alternative, AlternativesResult, CascadePlan, CascadeStep};
use ensemble_core::color::delta_e2000;
use ensemble_core::deadline::Deadline;
use ensemble_core::error::{Error, Result};
use ensemble_core::items::{CohesionPolicy, Item, Slot, TempBand};
use ensemble_core::profile::Profile;
use ensemble_core::ruleset::{RuleSet, Template};

use crate::constraints::{self, ConstraintCtx};
use crate::retrieval::{unary_score, CandidateRetriever, RetrievalCtx};
use crate::scoring::{pair_palette_score, score_items, ScoreContext};

/// Inputs for one replace request.
pub struct ReplaceInputs<'a> {
    pub ruleset: &'a RuleSet,
    pub template: &'a Template,
    pub profile: &'a Profile,
    pub target_dressiness: u8,
    pub band: TempBand,
    pub allow_catalog: bool,
    pub recent: &'a [String],
    /// The current bundle, resolved to full items.
    pub bundle_items: &'a BTreeMap<Slot, Item>,
    pub target_slot: Slot,
    /// Slots the user has locked. The target may not be locked; cascade
    /// steps on locked slots are surfaced in the plan rather than applied.
    pub locks: &'a BTreeSet<Slot>,
    pub max_alternatives: usize,
    pub deadline: Deadline,
}

/// Group-aware replacement planner.
#[derive(Clone)]
pub struct ReplacePlanner {
    retriever: CandidateRetriever,
}

/// Candidate sort tier: same-group alternatives rank ahead of set-breaking
/// ones at equal score.
const TIER_SAME_GROUP: u8 = 0;
const TIER_OTHER: u8 = 1;

impl ReplacePlanner {
    pub fn new(retriever: CandidateRetriever) -> Self {
        Self { retriever }
    }

    pub async fn plan(
        &self,
        user_id: &str,
        inputs: &ReplaceInputs<'_>,
    ) -> Result<AlternativesResult> {
        let current = inputs
            .bundle_items
            .get(&inputs.target_slot)
            .ok_or_else(|| {
                Error::InvalidInput(format!("slot {} not present in bundle", inputs.target_slot))
            })?;
        if inputs.locks.contains(&inputs.target_slot) {
            return Err(Error::InvalidInput(format!(
                "target slot {} is locked",
                inputs.target_slot
            )));
        }

        let score_ctx = ScoreContext {
            ruleset: inputs.ruleset,
            profile: inputs.profile,
            target_dressiness: inputs.target_dressiness,
            band: inputs.band,
            recent: inputs.recent,
        };
        let constraint_ctx = ConstraintCtx {
            ruleset: inputs.ruleset,
            template: inputs.template,
            target_dressiness: inputs.target_dressiness,
            band: inputs.band,
            allow_catalog: inputs.allow_catalog,
        };
        let retrieval_ctx = RetrievalCtx {
            ruleset: inputs.ruleset,
            profile: inputs.profile,
            target_dressiness: inputs.target_dressiness,
            band: inputs.band,
            allow_catalog: inputs.allow_catalog,
        };

        let current_items: Vec<&Item> = inputs.bundle_items.values().collect();
        let current_score = score_items(&current_items, &score_ctx).aggregate;

        let shortlist = self
            .retriever
            .shortlist(
                user_id,
                inputs.target_slot,
                ensemble_core::defaults::SHORTLIST_ANCHOR,
                &retrieval_ctx,
            )
            .await?;

        let current_policy = current.coord.as_ref().map(|c| c.policy);
        let mut rosters: BTreeMap<String, Vec<Item>> = BTreeMap::new();
        if let Some(coord) = &current.coord {
            let members = self
                .retriever
                .group_members(user_id, &coord.group_id, inputs.allow_catalog)
                .await?;
            rosters.insert(coord.group_id.clone(), members);
        }

        let mut ranked: Vec<(u8, f64, Alternative)> = Vec::new();
        for candidate in shortlist.iter().map(|r| &r.item) {
            if inputs.deadline.expired() {
                break;
            }
            if candidate.item_id == current.item_id {
                continue;
            }

            let produced = match current_policy {
                Some(CohesionPolicy::Strict) => {
                    self.plan_for_strict(
                        user_id,
                        current,
                        candidate,
                        inputs,
                        &score_ctx,
                        &constraint_ctx,
                        current_score,
                        &mut rosters,
                    )
                    .await?
                }
                Some(CohesionPolicy::PreferStrict) => self.plan_for_prefer_strict(
                    current,
                    candidate,
                    inputs,
                    &score_ctx,
                    &constraint_ctx,
                    current_score,
                    &rosters,
                ),
                _ => self.plan_for_loose(
                    candidate,
                    inputs,
                    &score_ctx,
                    &constraint_ctx,
                    &retrieval_ctx,
                    current_score,
                    &rosters,
                ),
            };

            if let Some(entry) = produced {
                ranked.push(entry);
            }
        }

        ranked.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.total_cmp(&a.1))
                .then_with(|| a.2.item_id.cmp(&b.2.item_id))
        });
        ranked.truncate(inputs.max_alternatives);

        let alternatives: Vec<Alternative> = ranked.into_iter().map(|(_, _, a)| a).collect();
        debug!(
            slot = %inputs.target_slot,
            result_count = alternatives.len(),
            "replace plan complete"
        );

        Ok(AlternativesResult {
            slot: inputs.target_slot,
            current_item_id: current.item_id.clone(),
            alternatives,
            ruleset_version: inputs.ruleset.version.clone(),
        })
    }

    /// Strict current item: same-group swaps are free; any other group
    /// requires a cascade covering every slot the current group occupies.
    #[allow(clippy::too_many_arguments)]
    async fn plan_for_strict(
        &self,
        user_id: &str,
        current: &Item,
        candidate: &Item,
        inputs: &ReplaceInputs<'_>,
        score_ctx: &ScoreContext<'_>,
        constraint_ctx: &ConstraintCtx<'_>,
        current_score: f64,
        rosters: &mut BTreeMap<String, Vec<Item>>,
    ) -> Result<Option<(u8, f64, Alternative)>> {
        let current_group = &current.coord.as_ref().expect("strict implies coord").group_id;

        match &candidate.coord {
            Some(coord) if coord.group_id == *current_group => {
                // Alternate member of the same set for this slot.
                let swapped = swap_single(inputs.bundle_items, inputs.target_slot, candidate);
                Ok(self
                    .finish(
                        &swapped,
                        candidate,
                        rosters,
                        constraint_ctx,
                        score_ctx,
                        current_score,
                        TIER_SAME_GROUP,
                        false,
                        None,
                        "stays within the set".to_string(),
                    ))
            }
            Some(coord) => {
                // Different set: the whole current group cascades out.
                if !rosters.contains_key(&coord.group_id) {
                    let members = self
                        .retriever
                        .group_members(user_id, &coord.group_id, inputs.allow_catalog)
                        .await?;
                    rosters.insert(coord.group_id.clone(), members);
                }
                let replacement_roster = &rosters[&coord.group_id];

                let occupied: Vec<Slot> = inputs
                    .bundle_items
                    .iter()
                    .filter(|(_, item)| {
                        item.coord.as_ref().map(|c| c.group_id.as_str())
                            == Some(current_group.as_str())
                    })
                    .map(|(slot, _)| *slot)
                    .collect();

                let mut swapped = inputs.bundle_items.clone();
                let mut steps = Vec::new();
                for slot in &occupied {
                    let Some(replacement) =
                        replacement_roster.iter().find(|m| m.slot == *slot)
                    else {
                        // The proposed group cannot cover this slot.
                        return Ok(None);
                    };
                    swapped.insert(*slot, replacement.clone());
                    if *slot != inputs.target_slot {
                        steps.push(CascadeStep {
                            slot: *slot,
                            replacement_item_id: replacement.item_id.clone(),
                        });
                    }
                }

                let plan = CascadePlan {
                    broken_group_id: current_group.clone(),
                    replacement_group_id: Some(coord.group_id.clone()),
                    steps,
                };
                Ok(self.finish(
                    &swapped,
                    candidate,
                    rosters,
                    constraint_ctx,
                    score_ctx,
                    current_score,
                    TIER_OTHER,
                    true,
                    Some(plan),
                    "switches to a different set; remaining pieces cascade".to_string(),
                ))
            }
            // A strict set cannot be broken by an unaffiliated item.
            None => Ok(None),
        }
    }

    /// Prefer-strict current item: same-group first, then outside items
    /// with the configured break penalty.
    #[allow(clippy::too_many_arguments)]
    fn plan_for_prefer_strict(
        &self,
        current: &Item,
        candidate: &Item,
        inputs: &ReplaceInputs<'_>,
        score_ctx: &ScoreContext<'_>,
        constraint_ctx: &ConstraintCtx<'_>,
        current_score: f64,
        rosters: &BTreeMap<String, Vec<Item>>,
    ) -> Option<(u8, f64, Alternative)> {
        let current_group = &current.coord.as_ref().expect("prefer_strict implies coord").group_id;
        let same_group = candidate
            .coord
            .as_ref()
            .is_some_and(|c| c.group_id == *current_group);

        let swapped = swap_single(inputs.bundle_items, inputs.target_slot, candidate);
        if same_group {
            self.finish(
                &swapped,
                candidate,
                rosters,
                constraint_ctx,
                score_ctx,
                current_score,
                TIER_SAME_GROUP,
                false,
                None,
                "keeps the set together".to_string(),
            )
        } else {
            let penalty = inputs.ruleset.thresholds.prefer_strict_break_penalty;
            self.finish_with_penalty(
                &swapped,
                candidate,
                rosters,
                constraint_ctx,
                score_ctx,
                current_score,
                TIER_OTHER,
                penalty,
                format!("breaks the set (penalty {penalty:.2} applied)"),
            )
        }
    }

    /// Loose or unaffiliated current item: rank by unary score times
    /// compatibility with the fixed items.
    #[allow(clippy::too_many_arguments)]
    fn plan_for_loose(
        &self,
        candidate: &Item,
        inputs: &ReplaceInputs<'_>,
        score_ctx: &ScoreContext<'_>,
        constraint_ctx: &ConstraintCtx<'_>,
        retrieval_ctx: &RetrievalCtx<'_>,
        current_score: f64,
        rosters: &BTreeMap<String, Vec<Item>>,
    ) -> Option<(u8, f64, Alternative)> {
        let swapped = swap_single(inputs.bundle_items, inputs.target_slot, candidate);
        let fixed: Vec<&Item> = inputs
            .bundle_items
            .iter()
            .filter(|(slot, _)| **slot != inputs.target_slot)
            .map(|(_, item)| item)
            .collect();
        let compat = compatibility(candidate, &fixed, inputs);
        let rank = unary_score(candidate, retrieval_ctx) * compat;

        let entry = self.finish(
            &swapped,
            candidate,
            rosters,
            constraint_ctx,
            score_ctx,
            current_score,
            TIER_SAME_GROUP,
            false,
            None,
            format!("compatibility {compat:.2} with fixed items"),
        )?;
        // Rank loose candidates by unary x compatibility, not raw rescore.
        Some((entry.0, rank, entry.2))
    }

    /// Constraint-check a proposed bundle and build the alternative entry.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        swapped: &BTreeMap<Slot, Item>,
        candidate: &Item,
        rosters: &BTreeMap<String, Vec<Item>>,
        constraint_ctx: &ConstraintCtx<'_>,
        score_ctx: &ScoreContext<'_>,
        current_score: f64,
        tier: u8,
        requires_cascade: bool,
        cascade_plan: Option<CascadePlan>,
        coherence_reason: String,
    ) -> Option<(u8, f64, Alternative)> {
        self.finish_inner(
            swapped,
            candidate,
            rosters,
            constraint_ctx,
            score_ctx,
            current_score,
            tier,
            0.0,
            requires_cascade,
            cascade_plan,
            coherence_reason,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_with_penalty(
        &self,
        swapped: &BTreeMap<Slot, Item>,
        candidate: &Item,
        rosters: &BTreeMap<String, Vec<Item>>,
        constraint_ctx: &ConstraintCtx<'_>,
        score_ctx: &ScoreContext<'_>,
        current_score: f64,
        tier: u8,
        penalty: f64,
        coherence_reason: String,
    ) -> Option<(u8, f64, Alternative)> {
        self.finish_inner(
            swapped,
            candidate,
            rosters,
            constraint_ctx,
            score_ctx,
            current_score,
            tier,
            penalty,
            false,
            None,
            coherence_reason,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_inner(
        &self,
        swapped: &BTreeMap<Slot, Item>,
        candidate: &Item,
        rosters: &BTreeMap<String, Vec<Item>>,
        constraint_ctx: &ConstraintCtx<'_>,
        score_ctx: &ScoreContext<'_>,
        current_score: f64,
        tier: u8,
        penalty: f64,
        requires_cascade: bool,
        cascade_plan: Option<CascadePlan>,
        coherence_reason: String,
    ) -> Option<(u8, f64, Alternative)> {
        if constraints::check_complete(swapped, rosters, constraint_ctx).is_some() {
            return None;
        }
        let items: Vec<&Item> = swapped.values().collect();
        let new_score = (score_items(&items, score_ctx).aggregate - penalty).max(0.0);

        Some((
            tier,
            new_score,
            Alternative {
                item_id: candidate.item_id.clone(),
                new_score,
                delta_vs_current: new_score - current_score,
                requires_cascade,
                cascade_plan,
                coherence_reason,
            },
        ))
    }
}

fn swap_single(
    bundle: &BTreeMap<Slot, Item>,
    slot: Slot,
    candidate: &Item,
) -> BTreeMap<Slot, Item> {
    let mut swapped = bundle.clone();
    swapped.insert(slot, candidate.clone());
    swapped
}

/// Pairwise compatibility of a candidate with the fixed items: palette,
/// pattern-scale, formality, and temperature agreement, averaged.
fn compatibility(candidate: &Item, fixed: &[&Item], inputs: &ReplaceInputs<'_>) -> f64 {
    if fixed.is_empty() {
        return 1.0;
    }
    let t = &inputs.ruleset.thresholds;
    let mut sum = 0.0;
    for other in fixed {
        let palette = match (candidate.color, other.color) {
            (Some(a), Some(b)) => {
                // Harmonious pairs trend high; jarring pairs drag the rank.
                let base = pair_palette_score(&a, &b, t);
                let de = delta_e2000(&a, &b);
                if de < t.delta_e_near && candidate.slot != other.slot {
                    // Nearly identical colors on different garments read
                    // as a deliberate tonal look.
                    base.max(0.85)
                } else {
                    base
                }
            }
            _ => 0.8,
        };
        let pattern = match (candidate.pattern, other.pattern) {
            (Some(a), Some(b)) if !a.is_solid() && !b.is_solid() && a.scale == b.scale => 0.6,
            _ => 1.0,
        };
        let formality =
            1.0 - (candidate.formality as f64 - other.formality as f64).abs() / 4.0;
        let temperature = if candidate.seasonality.contains(&inputs.band) {
            1.0
        } else {
            0.5
        };
        sum += palette * pattern * formality * temperature;
    }
    sum / fixed.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{item, with_color, with_group, InMemoryIndex};
    use ensemble_core::items::CoordSetKind;
    use ensemble_core::profile::Occasion;
    use std::sync::Arc;
    use std::time::Duration;

    fn suit(group: &str, jacket_id: &str, trousers_id: &str) -> (Item, Item) {
        let jacket = with_color(
            with_group(
                item(jacket_id, "jacket", Slot::Outer, 4),
                group,
                "suit_jacket",
                CoordSetKind::Suit,
                CohesionPolicy::Strict,
            ),
            25.0,
            2.0,
            250.0,
        );
        let trousers = with_color(
            with_group(
                item(trousers_id, "trousers", Slot::Bottom, 4),
                group,
                "suit_trousers",
                CoordSetKind::Suit,
                CohesionPolicy::Strict,
            ),
            25.0,
            2.0,
            250.0,
        );
        (jacket, trousers)
    }

    fn bundle_from(items: &[&Item]) -> BTreeMap<Slot, Item> {
        items.iter().map(|i| (i.slot, (*i).clone())).collect()
    }

    #[tokio::test]
    async fn test_strict_replacement_cascades_to_other_group() {
        let (g1_jacket, g1_trousers) = suit("g1", "g1-jacket", "g1-trousers");
        let (g2_jacket, g2_trousers) = suit("g2", "g2-jacket", "g2-trousers");
        let shirt = with_color(item("shirt-w", "shirt", Slot::Top, 4), 95.0, 2.0, 180.0);
        let oxfords = with_color(item("oxfords-b", "shoes", Slot::Footwear, 5), 5.0, 1.0, 0.0);

        let index = InMemoryIndex::with_wardrobe(
            "u-1",
            vec![
                g1_jacket.clone(),
                g1_trousers.clone(),
                g2_jacket.clone(),
                g2_trousers.clone(),
                shirt.clone(),
                oxfords.clone(),
            ],
        );
        let planner = ReplacePlanner::new(CandidateRetriever::new(Arc::new(index)));

        let ruleset = RuleSet::builtin();
        let template = ruleset.templates_for(Occasion::WorkOffice, 4)[0];
        let profile = Profile::neutral("u-1");
        let bundle = bundle_from(&[&g1_jacket, &g1_trousers, &shirt, &oxfords]);
        let locks = BTreeSet::new();

        let inputs = ReplaceInputs {
            ruleset: &ruleset,
            template,
            profile: &profile,
            target_dressiness: 4,
            band: TempBand::Warm,
            allow_catalog: false,
            recent: &[],
            bundle_items: &bundle,
            target_slot: Slot::Bottom,
            locks: &locks,
            max_alternatives: 10,
            deadline: Deadline::after(Duration::from_secs(5)),
        };

        let result = planner.plan("u-1", &inputs).await.unwrap();
        let g2 = result
            .alternatives
            .iter()
            .find(|a| a.item_id == "g2-trousers")
            .expect("g2 trousers offered");
        assert!(g2.requires_cascade);
        let plan = g2.cascade_plan.as_ref().unwrap();
        assert_eq!(plan.broken_group_id, "g1");
        assert_eq!(plan.replacement_group_id.as_deref(), Some("g2"));
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].slot, Slot::Outer);
        assert_eq!(plan.steps[0].replacement_item_id, "g2-jacket");
    }

    #[tokio::test]
    async fn test_strict_excludes_unaffiliated_items() {
        let (g1_jacket, g1_trousers) = suit("g1", "g1-jacket", "g1-trousers");
        let plain_trousers =
            with_color(item("chinos-1", "chinos", Slot::Bottom, 4), 40.0, 20.0, 80.0);
        let shirt = item("shirt-w", "shirt", Slot::Top, 4);
        let oxfords = item("oxfords-b", "shoes", Slot::Footwear, 5);

        let index = InMemoryIndex::with_wardrobe(
            "u-1",
            vec![
                g1_jacket.clone(),
                g1_trousers.clone(),
                plain_trousers,
                shirt.clone(),
                oxfords.clone(),
            ],
        );
        let planner = ReplacePlanner::new(CandidateRetriever::new(Arc::new(index)));

        let ruleset = RuleSet::builtin();
        let template = ruleset.templates_for(Occasion::WorkOffice, 4)[0];
        let profile = Profile::neutral("u-1");
        let bundle = bundle_from(&[&g1_jacket, &g1_trousers, &shirt, &oxfords]);
        let locks = BTreeSet::new();

        let inputs = ReplaceInputs {
            ruleset: &ruleset,
            template,
            profile: &profile,
            target_dressiness: 4,
            band: TempBand::Warm,
            allow_catalog: false,
            recent: &[],
            bundle_items: &bundle,
            target_slot: Slot::Bottom,
            locks: &locks,
            max_alternatives: 10,
            deadline: Deadline::after(Duration::from_secs(5)),
        };

        let result = planner.plan("u-1", &inputs).await.unwrap();
        assert!(
            result.alternatives.iter().all(|a| a.item_id != "chinos-1"),
            "unaffiliated items cannot break a strict set"
        );
    }

    #[tokio::test]
    async fn test_loose_replacement_ranks_and_reports_delta() {
        let shirt = with_color(item("shirt-w", "shirt", Slot::Top, 3), 95.0, 2.0, 180.0);
        let tee_blue = with_color(item("tee-blue", "t_shirt", Slot::Top, 3), 60.0, 35.0, 250.0);
        let jeans = with_color(item("jeans-1", "jeans", Slot::Bottom, 3), 30.0, 25.0, 265.0);
        let sneakers = item("sneakers-1", "sneakers", Slot::Footwear, 3);

        let index = InMemoryIndex::with_wardrobe(
            "u-1",
            vec![shirt.clone(), tee_blue, jeans.clone(), sneakers.clone()],
        );
        let planner = ReplacePlanner::new(CandidateRetriever::new(Arc::new(index)));

        let ruleset = RuleSet::builtin();
        let template = ruleset.templates_for(Occasion::WorkCasual, 3)[0];
        let profile = Profile::neutral("u-1");
        let bundle = bundle_from(&[&shirt, &jeans, &sneakers]);
        let locks = BTreeSet::new();

        let inputs = ReplaceInputs {
            ruleset: &ruleset,
            template,
            profile: &profile,
            target_dressiness: 3,
            band: TempBand::Mild,
            allow_catalog: false,
            recent: &[],
            bundle_items: &bundle,
            target_slot: Slot::Top,
            locks: &locks,
            max_alternatives: 5,
            deadline: Deadline::after(Duration::from_secs(5)),
        };

        let result = planner.plan("u-1", &inputs).await.unwrap();
        assert_eq!(result.current_item_id, "shirt-w");
        assert_eq!(result.alternatives.len(), 1);
        let alt = &result.alternatives[0];
        assert_eq!(alt.item_id, "tee-blue");
        assert!(!alt.requires_cascade);
        // delta is measured against the current bundle's score, which is
        // itself in [0, 1].
        let implied_current = alt.new_score - alt.delta_vs_current;
        assert!((0.0..=1.0).contains(&implied_current));
    }

    #[tokio::test]
    async fn test_locked_target_slot_rejected() {
        let shirt = item("shirt-w", "shirt", Slot::Top, 3);
        let jeans = item("jeans-1", "jeans", Slot::Bottom, 3);
        let sneakers = item("sneakers-1", "sneakers", Slot::Footwear, 3);
        let index = InMemoryIndex::with_wardrobe(
            "u-1",
            vec![shirt.clone(), jeans.clone(), sneakers.clone()],
        );
        let planner = ReplacePlanner::new(CandidateRetriever::new(Arc::new(index)));

        let ruleset = RuleSet::builtin();
        let template = ruleset.templates_for(Occasion::WorkCasual, 3)[0];
        let profile = Profile::neutral("u-1");
        let bundle = bundle_from(&[&shirt, &jeans, &sneakers]);
        let locks: BTreeSet<Slot> = [Slot::Top].into_iter().collect();

        let inputs = ReplaceInputs {
            ruleset: &ruleset,
            template,
            profile: &profile,
            target_dressiness: 3,
            band: TempBand::Mild,
            allow_catalog: false,
            recent: &[],
            bundle_items: &bundle,
            target_slot: Slot::Top,
            locks: &locks,
            max_alternatives: 5,
            deadline: Deadline::after(Duration::from_secs(5)),
        };

        assert!(matches!(
            planner.plan("u-1", &inputs).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
