//! Bundle results: assembled outfits, score breakdowns, replacement
//! alternatives and cascade plans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::items::{Owner, Slot};

/// One soft-scoring component's contribution to a bundle score.
///
/// `weight` is the renormalized weight actually used at aggregation time,
/// so `sum(weight * score * confidence)` over a bundle's components
/// reproduces the reported aggregate exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub component: String,
    pub score: f64,
    pub weight: f64,
    pub confidence: f64,
    pub explanation: String,
}

impl ComponentScore {
    /// This component's contribution to the aggregate.
    pub fn contribution(&self) -> f64 {
        self.weight * self.score * self.confidence
    }
}

/// A filled outfit slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSlot {
    pub slot: Slot,
    pub item_id: String,
    pub owner: Owner,
}

/// A complete outfit returned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub bundle_id: Uuid,
    /// Slots in canonical wear order.
    pub slots: Vec<BundleSlot>,
    /// Aggregated soft score in [0, 1].
    pub score: f64,
    pub components: Vec<ComponentScore>,
    pub ruleset_version: String,
    pub template_id: String,
    /// Deterministic tie-break token: the lexicographic item-id tuple.
    pub tie_break: String,
}

impl Bundle {
    /// Recompute the aggregate from the reported breakdown. Matches
    /// `self.score` to within 1e-9 for any bundle the engine returns.
    pub fn reconstruct_score(&self) -> f64 {
        self.components.iter().map(ComponentScore::contribution).sum()
    }

    /// Number of catalog-owned items in the bundle.
    pub fn catalog_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.owner == Owner::Catalog)
            .count()
    }

    /// Item id committed to a slot, if filled.
    pub fn item_in(&self, slot: Slot) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.slot == slot)
            .map(|s| s.item_id.as_str())
    }
}

/// Result of a generate call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResult {
    pub bundle: Bundle,
    /// True when the deadline expired and this is the best-so-far terminal.
    pub partial: bool,
    pub generated_at: DateTime<Utc>,
}

// =============================================================================
// REPLACEMENT
// =============================================================================

/// One entailed replacement within a cascade plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeStep {
    pub slot: Slot,
    pub replacement_item_id: String,
}

/// The additional replacements entailed by breaking a strict co-ord group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadePlan {
    /// Group being vacated.
    pub broken_group_id: String,
    /// Group proposed as the replacement, when the alternative belongs to
    /// one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_group_id: Option<String>,
    pub steps: Vec<CascadeStep>,
}

/// A ranked replacement candidate for a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub item_id: String,
    /// Bundle score with this alternative (and its cascade, if any) applied.
    pub new_score: f64,
    pub delta_vs_current: f64,
    pub requires_cascade: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade_plan: Option<CascadePlan>,
    pub coherence_reason: String,
}

/// Result of a replace call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativesResult {
    pub slot: Slot,
    pub current_item_id: String,
    pub alternatives: Vec<Alternative>,
    pub ruleset_version: String,
}

// =============================================================================
// EXPLANATIONS
// =============================================================================

/// Per-slot explanation notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotExplanation {
    pub slot: Slot,
    pub item_id: String,
    pub notes: Vec<String>,
}

/// Full explanation of a bundle: slot-level notes plus the component
/// breakdown it was scored with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleExplanation {
    pub bundle_id: Uuid,
    pub template_id: String,
    pub ruleset_version: String,
    pub aggregate: f64,
    pub components: Vec<ComponentScore>,
    pub slots: Vec<SlotExplanation>,
}
