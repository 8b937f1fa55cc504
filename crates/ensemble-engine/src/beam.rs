//! Beam-search bundle assembler.
//!
//! Slots are expanded anchor-first in template order, accessories last.
//! Strict (and, when possible, prefer-strict) co-ord candidates commit
//! their whole group atomically. Children failing a monotone hard
//! constraint are pruned with the violation recorded; the surviving
//! children are ranked by running aggregate score and cut to the beam
//! width with a fully deterministic composite key.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use ensemble_core::color::delta_e2000;
use ensemble_core::constraint::{ConstraintCode, ConstraintViolation};
use ensemble_core::deadline::Deadline;
use ensemble_core::error::{Error, Result};
use ensemble_core::items::{CohesionPolicy, Item, Slot, TempBand};
use ensemble_core::profile::Profile;
use ensemble_core::ruleset::{RuleSet, Template};

use crate::cache::SlotShortlists;
use crate::constraints::{self, ConstraintCtx};
use crate::scoring::{score_items, ScoreBreakdown, ScoreContext};

/// Everything the assembler needs for one request, captured up front.
pub struct AssemblerInputs<'a> {
    pub ruleset: &'a RuleSet,
    pub template: &'a Template,
    pub profile: &'a Profile,
    pub target_dressiness: u8,
    pub band: TempBand,
    pub allow_catalog: bool,
    pub recent: &'a [String],
    pub shortlists: &'a SlotShortlists,
    /// Full rosters for every co-ord group seen in the shortlists.
    pub rosters: &'a BTreeMap<String, Vec<Item>>,
    pub beam_width: usize,
    pub deadline: Deadline,
}

/// A completed assembly, before being wrapped into a public bundle.
#[derive(Debug, Clone)]
pub struct AssembledBundle {
    pub filled: BTreeMap<Slot, Item>,
    pub breakdown: ScoreBreakdown,
    /// True when the deadline expired and this is the best-so-far terminal.
    pub partial: bool,
    pub tie_break: String,
}

#[derive(Debug, Clone)]
struct Partial {
    filled: BTreeMap<Slot, Item>,
    score: f64,
    tie: String,
}

impl Partial {
    fn empty() -> Self {
        Self {
            filled: BTreeMap::new(),
            score: 0.0,
            tie: String::new(),
        }
    }

    fn tie_token(filled: &BTreeMap<Slot, Item>) -> String {
        filled
            .values()
            .map(|i| i.item_id.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Records every violation observed during a search so a failed request
/// can report the dominant cause.
#[derive(Debug, Default)]
struct ViolationLedger {
    seen: BTreeMap<&'static str, (ConstraintViolation, usize)>,
}

impl ViolationLedger {
    fn record(&mut self, violation: ConstraintViolation) {
        let entry = self
            .seen
            .entry(violation.code.as_str())
            .or_insert((violation, 0));
        entry.1 += 1;
    }

    /// Highest-priority violation observed, ties broken by frequency.
    fn dominant(&self) -> Option<&ConstraintViolation> {
        self.seen
            .values()
            .min_by_key(|(v, count)| (v.code.priority(), usize::MAX - count))
            .map(|(v, _)| v)
    }
}

pub fn assemble(inputs: &AssemblerInputs<'_>) -> Result<AssembledBundle> {
    let constraint_ctx = ConstraintCtx {
        ruleset: inputs.ruleset,
        template: inputs.template,
        target_dressiness: inputs.target_dressiness,
        band: inputs.band,
        allow_catalog: inputs.allow_catalog,
    };
    let score_ctx = ScoreContext {
        ruleset: inputs.ruleset,
        profile: inputs.profile,
        target_dressiness: inputs.target_dressiness,
        band: inputs.band,
        recent: inputs.recent,
    };

    let order = slot_order(inputs);
    debug!(
        template_id = %inputs.template.template_id,
        anchor = %order[0],
        beam_width = inputs.beam_width,
        "beam search start"
    );

    let mut ledger = ViolationLedger::default();
    let mut beam = vec![Partial::empty()];

    for (step, slot) in order.iter().enumerate() {
        if inputs.deadline.expired() {
            return salvage(&beam, inputs, &constraint_ctx, &score_ctx);
        }

        let mut children: Vec<Partial> = Vec::new();
        for partial in &beam {
            if partial.filled.contains_key(slot) {
                // Filled earlier by an atomic group commit.
                children.push(partial.clone());
                continue;
            }

            if inputs.deadline.expired() {
                return salvage(&beam, inputs, &constraint_ctx, &score_ctx);
            }

            if inputs.template.is_optional(*slot) {
                children.push(partial.clone());
            }

            let candidates = inputs
                .shortlists
                .get(slot)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if candidates.is_empty() && !inputs.template.is_optional(*slot) {
                ledger.record(ConstraintViolation::new(
                    ConstraintCode::CoverageIncomplete,
                    vec![],
                    format!("no candidates for mandatory slot {slot}"),
                ));
                continue;
            }

            for ranked in candidates {
                let candidate = &ranked.item;
                match expand(partial, *slot, candidate, inputs, &constraint_ctx) {
                    Expansion::Child(filled) => {
                        let items: Vec<&Item> = filled.values().collect();
                        match constraints::check_partial(&items, &constraint_ctx) {
                            Some(violation) => {
                                trace!(
                                    slot = %slot,
                                    violation_code = %violation.code,
                                    "child pruned"
                                );
                                ledger.record(violation);
                            }
                            None => {
                                let breakdown = score_items(&items, &score_ctx);
                                let tie = Partial::tie_token(&filled);
                                children.push(Partial {
                                    filled,
                                    score: breakdown.aggregate,
                                    tie,
                                });
                            }
                        }
                    }
                    Expansion::Rejected(violation) => ledger.record(violation),
                }
            }
        }

        // Deterministic top-W cut, deduplicating converged paths.
        children.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.tie.cmp(&b.tie)));
        children.dedup_by(|a, b| a.tie == b.tie);
        children.truncate(inputs.beam_width);

        if children.is_empty() {
            let (code, reason) = ledger
                .dominant()
                .map(|v| (v.code, v.reason.clone()))
                .unwrap_or((
                    ConstraintCode::CoverageIncomplete,
                    format!("no viable candidates for slot {slot}"),
                ));
            debug!(slot = %slot, violation_code = %code, step, "beam emptied");
            return Err(Error::NoBundle {
                code,
                slot: slot.to_string(),
                reason,
            });
        }
        beam = children;
    }

    // Terminal selection among coverage-satisfying beams.
    let mut terminals: Vec<&Partial> = Vec::new();
    for partial in &beam {
        match constraints::check_complete(&partial.filled, inputs.rosters, &constraint_ctx) {
            None => terminals.push(partial),
            Some(violation) => ledger.record(violation),
        }
    }

    if terminals.is_empty() {
        let (code, reason) = ledger
            .dominant()
            .map(|v| (v.code, v.reason.clone()))
            .unwrap_or((
                ConstraintCode::CoverageIncomplete,
                "no terminal satisfied coverage".to_string(),
            ));
        return Err(Error::NoBundle {
            code,
            slot: "completion".to_string(),
            reason,
        });
    }

    terminals.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| catalog_count(a).cmp(&catalog_count(b)))
            .then_with(|| {
                near_face_delta_e(a)
                    .total_cmp(&near_face_delta_e(b))
            })
            .then_with(|| a.tie.cmp(&b.tie))
    });
    let best = terminals[0];

    let items: Vec<&Item> = best.filled.values().collect();
    let breakdown = score_items(&items, &score_ctx);
    Ok(AssembledBundle {
        filled: best.filled.clone(),
        breakdown,
        partial: false,
        tie_break: best.tie.clone(),
    })
}

enum Expansion {
    Child(BTreeMap<Slot, Item>),
    Rejected(ConstraintViolation),
}

/// Commit a candidate into a partial, atomically pulling in its co-ord
/// group when the cohesion policy asks for it.
fn expand(
    partial: &Partial,
    slot: Slot,
    candidate: &Item,
    inputs: &AssemblerInputs<'_>,
    ctx: &ConstraintCtx<'_>,
) -> Expansion {
    let policy = candidate.coord.as_ref().map(|c| c.policy);
    match policy {
        Some(CohesionPolicy::Strict) => {
            commit_group(partial, candidate, inputs, ctx, true)
        }
        Some(CohesionPolicy::PreferStrict) => {
            match commit_group(partial, candidate, inputs, ctx, false) {
                Expansion::Child(filled) => Expansion::Child(filled),
                // A prefer-strict item may be worn outside its set.
                Expansion::Rejected(_) => commit_single(partial, slot, candidate),
            }
        }
        _ => commit_single(partial, slot, candidate),
    }
}

fn commit_single(partial: &Partial, slot: Slot, candidate: &Item) -> Expansion {
    let mut filled = partial.filled.clone();
    filled.insert(slot, candidate.clone());
    Expansion::Child(filled)
}

/// Atomic whole-group commit. For strict groups the group must cover all
/// slots its set kind (and its roster) requires within the template.
fn commit_group(
    partial: &Partial,
    candidate: &Item,
    inputs: &AssemblerInputs<'_>,
    _ctx: &ConstraintCtx<'_>,
    strict: bool,
) -> Expansion {
    let coord = candidate
        .coord
        .as_ref()
        .expect("commit_group requires a coord candidate");
    let group_id = &coord.group_id;

    let template_slots: BTreeSet<Slot> = inputs.template.slot_sequence().into_iter().collect();
    let roster = inputs.rosters.get(group_id).cloned().unwrap_or_default();

    // Members to commit: every roster member whose slot the template uses.
    let mut members: BTreeMap<Slot, Item> = BTreeMap::new();
    for member in &roster {
        if template_slots.contains(&member.slot) {
            members.insert(member.slot, member.clone());
        }
    }

    // The set kind prescribes a minimum composition; a suit without its
    // trousers cannot be worn strictly.
    let mut required: BTreeSet<Slot> = constraints::expected_slots(coord.kind)
        .iter()
        .copied()
        .filter(|s| template_slots.contains(s))
        .collect();
    required.insert(candidate.slot);

    for slot in &required {
        if !members.contains_key(slot) {
            return Expansion::Rejected(ConstraintViolation::new(
                ConstraintCode::StrictCoordIncomplete,
                vec![group_id.clone()],
                format!("group {group_id} missing member for slot {slot}"),
            ));
        }
    }

    let mut filled = partial.filled.clone();
    for (slot, member) in members {
        if let Some(existing) = filled.get(&slot) {
            if existing.item_id != member.item_id {
                if strict {
                    return Expansion::Rejected(ConstraintViolation::new(
                        ConstraintCode::StrictCoordIncomplete,
                        vec![group_id.clone()],
                        format!("slot {slot} already taken; cannot commit group {group_id}"),
                    ));
                }
                // Prefer-strict: leave the occupied slot alone.
                continue;
            }
        }
        filled.insert(slot, member);
    }
    Expansion::Child(filled)
}

/// Anchor-first slot ordering.
///
/// The anchor is the template-declared slot when present, otherwise the
/// first slot whose shortlist carries a co-ord candidate, otherwise the
/// one-piece route, otherwise the first body slot.
fn slot_order(inputs: &AssemblerInputs<'_>) -> Vec<Slot> {
    let sequence = inputs.template.slot_sequence();

    let anchor = inputs
        .template
        .anchor
        .filter(|a| sequence.contains(a))
        .or_else(|| {
            sequence.iter().copied().find(|slot| {
                inputs
                    .shortlists
                    .get(slot)
                    .is_some_and(|candidates| {
                        candidates.iter().any(|c| {
                            c.item.coord.as_ref().is_some_and(|coord| {
                                coord.policy != CohesionPolicy::Loose
                            })
                        })
                    })
            })
        })
        .or_else(|| {
            sequence
                .iter()
                .copied()
                .find(|s| *s == Slot::OnePiece && inputs.shortlists.contains_key(s))
        })
        .unwrap_or(sequence[0]);

    let mut order = vec![anchor];
    order.extend(sequence.into_iter().filter(|s| *s != anchor));
    order
}

fn catalog_count(partial: &Partial) -> usize {
    partial.filled.values().filter(|i| i.is_catalog()).count()
}

/// Mean pairwise delta-E among colored near-face items; terminals with
/// calmer near-face palettes win ties.
fn near_face_delta_e(partial: &Partial) -> f64 {
    let colors: Vec<_> = partial
        .filled
        .values()
        .filter(|i| i.slot.is_near_face())
        .filter_map(|i| i.color)
        .collect();
    if colors.len() < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut n = 0usize;
    for (i, a) in colors.iter().enumerate() {
        for b in colors.iter().skip(i + 1) {
            sum += delta_e2000(a, b);
            n += 1;
        }
    }
    sum / n as f64
}

/// Deadline expiry: return the best coverage-satisfying partial if one
/// exists, else fail with the deadline error.
fn salvage(
    beam: &[Partial],
    inputs: &AssemblerInputs<'_>,
    constraint_ctx: &ConstraintCtx<'_>,
    score_ctx: &ScoreContext<'_>,
) -> Result<AssembledBundle> {
    let mut terminals: Vec<&Partial> = beam
        .iter()
        .filter(|p| constraints::check_complete(&p.filled, inputs.rosters, constraint_ctx).is_none())
        .collect();

    if terminals.is_empty() {
        return Err(Error::Deadline { partial: false });
    }

    terminals.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.tie.cmp(&b.tie)));
    let best = terminals[0];
    let items: Vec<&Item> = best.filled.values().collect();
    let breakdown = score_items(&items, score_ctx);
    debug!(partial = true, score = breakdown.aggregate, "deadline salvage");
    Ok(AssembledBundle {
        filled: best.filled.clone(),
        breakdown,
        partial: true,
        tie_break: best.tie.clone(),
    })
}
