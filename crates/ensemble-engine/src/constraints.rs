//! Hard-constraint engine.
//!
//! Constraints are pure predicates over a partial bundle plus rule set,
//! context, and template. The partial checks are monotone: once a partial
//! bundle violates one, no extension can satisfy it, so the beam prunes
//! eagerly. Coverage, layering bases, strict-group completeness, and the
//! belt rule are completion-time checks.

use std::collections::{BTreeMap, BTreeSet};

use ensemble_core::constraint::{ConstraintCode, ConstraintViolation};
use ensemble_core::items::{CohesionPolicy, CoordSetKind, Item, Slot, TempBand};
use ensemble_core::ruleset::{BodyCoverage, RuleSet, Template};

/// Immutable constraint context for one request.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintCtx<'a> {
    pub ruleset: &'a RuleSet,
    pub template: &'a Template,
    pub target_dressiness: u8,
    pub band: TempBand,
    pub allow_catalog: bool,
}

impl ConstraintCtx<'_> {
    fn formality_range(&self) -> (u8, u8) {
        let t = &self.ruleset.thresholds;
        (
            self.target_dressiness.saturating_sub(t.formality_tol_lo).max(1),
            (self.target_dressiness + t.formality_tol_hi).min(5),
        )
    }
}

/// Slots a coordinated-set kind is expected to cover when worn whole.
/// Kinds without a fixed composition fall back to whatever members the
/// group actually has.
pub(crate) fn expected_slots(kind: CoordSetKind) -> &'static [Slot] {
    match kind {
        CoordSetKind::Suit => &[Slot::Outer, Slot::Bottom],
        CoordSetKind::Tracksuit | CoordSetKind::KnitSet => &[Slot::Mid, Slot::Bottom],
        CoordSetKind::Separates | CoordSetKind::Other => &[],
    }
}

/// Monotone checks evaluated on every beam child.
///
/// Returns the first violation found, in code-priority order.
pub fn check_partial(items: &[&Item], ctx: &ConstraintCtx<'_>) -> Option<ConstraintViolation> {
    // Strict co-ords must not mix groups.
    let strict_groups: BTreeSet<&str> = items
        .iter()
        .filter_map(|i| i.strict_group().map(|c| c.group_id.as_str()))
        .collect();
    if strict_groups.len() > 1 {
        let offending: Vec<String> = strict_groups.iter().map(|g| g.to_string()).collect();
        return Some(ConstraintViolation::new(
            ConstraintCode::StrictCoordMixed,
            offending,
            "items from different strict sets cannot mix",
        ));
    }

    // One-piece excludes the body layers.
    let one_piece = items.iter().find(|i| i.slot == Slot::OnePiece);
    if let Some(op) = one_piece {
        if let Some(layer) = items.iter().find(|i| i.slot.is_body_layer()) {
            return Some(ConstraintViolation::new(
                ConstraintCode::OnePieceExclusive,
                vec![op.item_id.clone(), layer.item_id.clone()],
                "a one-piece replaces top, mid, and bottom layers",
            ));
        }
    }

    // Formality bounds per item.
    let (lo, hi) = ctx.formality_range();
    if let Some(item) = items
        .iter()
        .find(|i| i.formality < lo || i.formality > hi)
    {
        return Some(ConstraintViolation::new(
            ConstraintCode::FormalityOutOfBounds,
            vec![item.item_id.clone()],
            format!(
                "formality {} outside [{lo}, {hi}] for target {}",
                item.formality, ctx.target_dressiness
            ),
        ));
    }

    // Temperature safety.
    if !ctx.ruleset.thresholds.allow_offband_seasonality {
        if let Some(item) = items.iter().find(|i| !i.seasonality.contains(&ctx.band)) {
            return Some(ConstraintViolation::new(
                ConstraintCode::SeasonMismatch,
                vec![item.item_id.clone()],
                format!("not rated for {}", ctx.band.as_str()),
            ));
        }
    }

    // Catalog cap.
    let cap = if ctx.allow_catalog {
        ctx.ruleset.catalog_cap
    } else {
        0
    };
    let catalog: Vec<&&Item> = items.iter().filter(|i| i.is_catalog()).collect();
    if catalog.len() > cap {
        return Some(ConstraintViolation::new(
            ConstraintCode::CatalogLimit,
            catalog.iter().map(|i| i.item_id.clone()).collect(),
            format!("at most {cap} catalog items allowed"),
        ));
    }

    None
}

/// Completion-time checks over a filled slot map.
///
/// `rosters` maps group ids to their full member lists, as retrieved by
/// the assembler when it committed the group.
pub fn check_complete(
    filled: &BTreeMap<Slot, Item>,
    rosters: &BTreeMap<String, Vec<Item>>,
    ctx: &ConstraintCtx<'_>,
) -> Option<ConstraintViolation> {
    let items: Vec<&Item> = filled.values().collect();
    if let Some(violation) = check_partial(&items, ctx) {
        return Some(violation);
    }

    if let Some(violation) = check_strict_completeness(filled, rosters, ctx) {
        return Some(violation);
    }

    // Body coverage.
    let has_one_piece = filled.contains_key(&Slot::OnePiece);
    let has_separates = filled.contains_key(&Slot::Top) && filled.contains_key(&Slot::Bottom);
    let covered = match ctx.template.body {
        BodyCoverage::OnePiece => has_one_piece,
        BodyCoverage::Separates => has_separates,
        BodyCoverage::Either => has_one_piece || has_separates,
    };
    if !covered {
        return Some(ConstraintViolation::new(
            ConstraintCode::CoverageIncomplete,
            vec![],
            "body coverage incomplete",
        ));
    }

    // Remaining mandatory slots.
    if let Some(slot) = ctx
        .template
        .mandatory_slots()
        .iter()
        .find(|s| !filled.contains_key(s))
    {
        return Some(ConstraintViolation::new(
            ConstraintCode::CoverageIncomplete,
            vec![],
            format!("mandatory slot {slot} unfilled"),
        ));
    }

    // Layering bases: each committed layer with declared bases needs one.
    for slot in filled.keys() {
        if let Some(bases) = ctx.ruleset.layering.bases_of(*slot) {
            if !bases.iter().any(|b| filled.contains_key(b)) {
                return Some(ConstraintViolation::new(
                    ConstraintCode::LayeringOrder,
                    vec![filled[slot].item_id.clone()],
                    format!("{slot} committed without a base layer"),
                ));
            }
        }
    }

    // Belt rule: dressy bottoms with belt loops want a belt.
    if let Some(threshold) = ctx.template.belt_required_at {
        if ctx.target_dressiness >= threshold {
            let looped_bottom = filled
                .get(&Slot::Bottom)
                .filter(|b| b.belt_loops == Some(true));
            if let Some(bottom) = looped_bottom {
                if !filled.contains_key(&Slot::Belt) {
                    return Some(ConstraintViolation::new(
                        ConstraintCode::BeltRequired,
                        vec![bottom.item_id.clone()],
                        format!("belt required at dressiness {threshold}+ with belt loops"),
                    ));
                }
            }
        }
    }

    None
}

/// Every strict group present must cover its required template slots with
/// its own members.
fn check_strict_completeness(
    filled: &BTreeMap<Slot, Item>,
    rosters: &BTreeMap<String, Vec<Item>>,
    ctx: &ConstraintCtx<'_>,
) -> Option<ConstraintViolation> {
    let template_slots: BTreeSet<Slot> = ctx.template.slot_sequence().into_iter().collect();

    let mut strict_groups: BTreeMap<&str, CoordSetKind> = BTreeMap::new();
    for item in filled.values() {
        if let Some(coord) = item.strict_group() {
            strict_groups.insert(coord.group_id.as_str(), coord.kind);
        }
    }

    for (group_id, kind) in strict_groups {
        let mut required: BTreeSet<Slot> = expected_slots(kind)
            .iter()
            .copied()
            .filter(|s| template_slots.contains(s))
            .collect();
        if let Some(roster) = rosters.get(group_id) {
            required.extend(
                roster
                    .iter()
                    .map(|m| m.slot)
                    .filter(|s| template_slots.contains(s)),
            );
        }

        for slot in required {
            let member_committed = filled.get(&slot).is_some_and(|item| {
                item.coord
                    .as_ref()
                    .is_some_and(|c| c.group_id == group_id)
            });
            if !member_committed {
                return Some(ConstraintViolation::new(
                    ConstraintCode::StrictCoordIncomplete,
                    vec![group_id.to_string()],
                    format!("group {group_id} missing member for slot {slot}"),
                ));
            }
        }
    }

    None
}
