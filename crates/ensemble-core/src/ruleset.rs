//! Versioned, immutable rule sets: layering graph, templates, weights,
//! thresholds, and accessory-consistency mode.
//!
//! A rule set is captured once per request (snapshot semantics); the engine
//! never observes a rule set changing mid-request. Publication of a new
//! version invalidates the shortlist cache through the event bus.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults;
use crate::error::{Error, Result};
use crate::items::Slot;
use crate::profile::Occasion;

// =============================================================================
// LAYERING GRAPH
// =============================================================================

/// Directed acyclic layering graph over slot classes. An edge `a -> b`
/// means `a` is worn under `b`; a committed layer with predecessors needs
/// at least one of them present in a complete bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayeringGraph {
    /// Edges keyed by the outer layer, listing its admissible bases.
    bases: BTreeMap<Slot, BTreeSet<Slot>>,
}

impl LayeringGraph {
    pub fn new(edges: &[(Slot, Slot)]) -> Self {
        let mut bases: BTreeMap<Slot, BTreeSet<Slot>> = BTreeMap::new();
        for (inner, outer) in edges {
            bases.entry(*outer).or_default().insert(*inner);
        }
        Self { bases }
    }

    /// Standard layering: tops under mids under outers; a one-piece can
    /// base an outer directly.
    pub fn standard() -> Self {
        Self::new(&[
            (Slot::Top, Slot::Mid),
            (Slot::Top, Slot::Outer),
            (Slot::Mid, Slot::Outer),
            (Slot::OnePiece, Slot::Outer),
        ])
    }

    /// Admissible bases for a layer; empty when the layer needs none.
    pub fn bases_of(&self, slot: Slot) -> Option<&BTreeSet<Slot>> {
        self.bases.get(&slot)
    }

    /// Reject cyclic graphs at rule-set load.
    pub fn validate(&self) -> Result<()> {
        // DFS from every node over the inverted edges.
        fn visit(
            graph: &BTreeMap<Slot, BTreeSet<Slot>>,
            node: Slot,
            path: &mut BTreeSet<Slot>,
        ) -> bool {
            if !path.insert(node) {
                return false;
            }
            let ok = graph
                .get(&node)
                .map(|bases| bases.iter().all(|b| visit(graph, *b, path)))
                .unwrap_or(true);
            path.remove(&node);
            ok
        }

        let mut path = BTreeSet::new();
        for outer in self.bases.keys() {
            if !visit(&self.bases, *outer, &mut path) {
                return Err(Error::InvalidInput(
                    "layering graph contains a cycle".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// How a template covers the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyCoverage {
    /// Top plus bottom are both mandatory.
    Separates,
    /// A one-piece is mandatory.
    OnePiece,
    /// Either a one-piece, or top plus bottom. Terminal coverage enforces
    /// the exclusive-or; candidates for both routes compete in the beam.
    Either,
}

/// Per-occasion outfit recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub template_id: String,
    pub occasion: Occasion,
    pub dressiness_min: u8,
    pub dressiness_max: u8,
    pub body: BodyCoverage,
    /// Mandatory non-body slots (usually footwear).
    pub required: Vec<Slot>,
    /// Optional slots, committed or skipped per beam child.
    pub optional: Vec<Slot>,
    /// Declared anchor slot; when absent the assembler derives the anchor
    /// from co-ord groups or the one-piece route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Slot>,
    /// When set: at or above this dressiness, bottoms with belt loops
    /// require a belt in the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub belt_required_at: Option<u8>,
}

/// Canonical slot iteration order: body layers inside out, then footwear,
/// then accessories last.
const SLOT_ORDER: &[Slot] = &[
    Slot::OnePiece,
    Slot::Top,
    Slot::Bottom,
    Slot::Mid,
    Slot::Outer,
    Slot::Footwear,
    Slot::Hosiery,
    Slot::Belt,
    Slot::Bag,
    Slot::Jewelry,
    Slot::Headwear,
];

impl Template {
    pub fn contains_dressiness(&self, d: u8) -> bool {
        (self.dressiness_min..=self.dressiness_max).contains(&d)
    }

    /// Body slots implied by the coverage rule.
    pub fn body_slots(&self) -> Vec<Slot> {
        match self.body {
            BodyCoverage::Separates => vec![Slot::Top, Slot::Bottom],
            BodyCoverage::OnePiece => vec![Slot::OnePiece],
            BodyCoverage::Either => vec![Slot::OnePiece, Slot::Top, Slot::Bottom],
        }
    }

    /// Every slot the template may fill, in canonical iteration order.
    pub fn slot_sequence(&self) -> Vec<Slot> {
        let members: BTreeSet<Slot> = self
            .body_slots()
            .into_iter()
            .chain(self.required.iter().copied())
            .chain(self.optional.iter().copied())
            .collect();
        SLOT_ORDER
            .iter()
            .copied()
            .filter(|s| members.contains(s))
            .collect()
    }

    pub fn uses_slot(&self, slot: Slot) -> bool {
        self.slot_sequence().contains(&slot)
    }

    /// Whether a slot may be skipped by a beam child. Body slots under
    /// `Either` coverage are individually optional; the terminal coverage
    /// check enforces that one full route was taken.
    pub fn is_optional(&self, slot: Slot) -> bool {
        if self.required.contains(&slot) {
            return false;
        }
        match self.body {
            BodyCoverage::Separates if slot == Slot::Top || slot == Slot::Bottom => false,
            BodyCoverage::OnePiece if slot == Slot::OnePiece => false,
            BodyCoverage::Either
                if slot == Slot::OnePiece || slot == Slot::Top || slot == Slot::Bottom =>
            {
                true
            }
            _ => self.optional.contains(&slot) || !self.body_slots().contains(&slot),
        }
    }

    /// Slots that must be filled in any terminal, independent of the
    /// body-coverage route.
    pub fn mandatory_slots(&self) -> Vec<Slot> {
        let mut slots = self.required.clone();
        match self.body {
            BodyCoverage::Separates => slots.extend([Slot::Top, Slot::Bottom]),
            BodyCoverage::OnePiece => slots.push(Slot::OnePiece),
            BodyCoverage::Either => {}
        }
        slots
    }
}

// =============================================================================
// WEIGHTS AND THRESHOLDS
// =============================================================================

/// Soft-component weights. Non-negative; renormalized at aggregation time,
/// so they need not sum to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weights {
    pub palette_harmony: f64,
    pub pattern_mix: f64,
    pub silhouette_balance: f64,
    pub formality_closeness: f64,
    pub temperature_fit: f64,
    pub style_tag_match: f64,
    pub novelty_variety: f64,
    pub accessory_consistency: f64,
    pub skin_synergy: f64,
    pub proportion_fit: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            palette_harmony: 0.22,
            pattern_mix: 0.12,
            silhouette_balance: 0.12,
            formality_closeness: 0.14,
            temperature_fit: 0.10,
            style_tag_match: 0.08,
            novelty_variety: 0.05,
            accessory_consistency: 0.07,
            skin_synergy: 0.08,
            proportion_fit: 0.10,
        }
    }
}

impl Weights {
    /// Component name / weight pairs in reporting order.
    pub fn as_pairs(&self) -> [(&'static str, f64); 10] {
        [
            ("palette_harmony", self.palette_harmony),
            ("pattern_mix", self.pattern_mix),
            ("silhouette_balance", self.silhouette_balance),
            ("formality_closeness", self.formality_closeness),
            ("temperature_fit", self.temperature_fit),
            ("style_tag_match", self.style_tag_match),
            ("novelty_variety", self.novelty_variety),
            ("accessory_consistency", self.accessory_consistency),
            ("skin_synergy", self.skin_synergy),
            ("proportion_fit", self.proportion_fit),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let pairs = self.as_pairs();
        if pairs.iter().any(|(_, w)| *w < 0.0) {
            return Err(Error::InvalidInput("weights must be non-negative".into()));
        }
        if pairs.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
            return Err(Error::InvalidInput("weights must not all be zero".into()));
        }
        Ok(())
    }
}

/// Numeric thresholds governing scoring and hard constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Chroma under which a color counts as neutral.
    pub neutral_chroma: f64,
    /// Delta-E at or under which two colors read as near.
    pub delta_e_near: f64,
    /// Delta-E at or over which two colors read as distant.
    pub delta_e_distant: f64,
    /// Non-solid pattern count where pattern-mix bottoms out.
    pub max_patterns: usize,
    /// Penalty per pair of patterned items sharing a scale.
    pub pattern_scale_penalty: f64,
    /// Formality tolerance below the dressiness target.
    pub formality_tol_lo: u8,
    /// Formality tolerance above the dressiness target.
    pub formality_tol_hi: u8,
    /// Permit items whose seasonality excludes the context band.
    pub allow_offband_seasonality: bool,
    /// Aggregate penalty for breaking a prefer-strict group on replace.
    pub prefer_strict_break_penalty: f64,
    /// Recent-outfit window for novelty.
    pub novelty_window: usize,
    /// Penalty for the most recently worn item, decaying over the window.
    pub novelty_base_penalty: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            neutral_chroma: defaults::NEUTRAL_CHROMA,
            delta_e_near: defaults::DELTA_E_NEAR,
            delta_e_distant: defaults::DELTA_E_DISTANT,
            max_patterns: defaults::MAX_PATTERNS,
            pattern_scale_penalty: defaults::PATTERN_SCALE_PENALTY,
            formality_tol_lo: defaults::FORMALITY_TOL_LO,
            formality_tol_hi: defaults::FORMALITY_TOL_HI,
            allow_offband_seasonality: false,
            prefer_strict_break_penalty: defaults::PREFER_STRICT_BREAK_PENALTY,
            novelty_window: defaults::NOVELTY_WINDOW,
            novelty_base_penalty: defaults::NOVELTY_BASE_PENALTY,
        }
    }
}

/// Accessory-consistency enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessoryMode {
    StrictFamily,
    Coordinated,
    Free,
}

// =============================================================================
// RULE SET
// =============================================================================

/// Immutable, versioned rule bundle captured once per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub version: String,
    pub layering: LayeringGraph,
    pub templates: Vec<Template>,
    pub weights: Weights,
    pub thresholds: Thresholds,
    pub accessory_mode: AccessoryMode,
    /// Maximum catalog items per bundle when the request allows catalog.
    pub catalog_cap: usize,
}

impl RuleSet {
    /// Built-in default rule set with the standard template repertoire.
    pub fn builtin() -> Self {
        let t = |template_id: &str,
                 occasion: Occasion,
                 dressiness: (u8, u8),
                 body: BodyCoverage,
                 required: Vec<Slot>,
                 optional: Vec<Slot>,
                 belt_required_at: Option<u8>| Template {
            template_id: template_id.to_string(),
            occasion,
            dressiness_min: dressiness.0,
            dressiness_max: dressiness.1,
            body,
            required,
            optional,
            anchor: None,
            belt_required_at,
        };

        RuleSet {
            version: "builtin-1".to_string(),
            layering: LayeringGraph::standard(),
            templates: vec![
                t(
                    "business_separates",
                    Occasion::WorkOffice,
                    (3, 5),
                    BodyCoverage::Separates,
                    vec![Slot::Footwear],
                    vec![Slot::Mid, Slot::Outer, Slot::Belt, Slot::Bag, Slot::Jewelry],
                    Some(4),
                ),
                t(
                    "smart_casual",
                    Occasion::WorkCasual,
                    (2, 4),
                    BodyCoverage::Separates,
                    vec![Slot::Footwear],
                    vec![Slot::Mid, Slot::Outer, Slot::Belt, Slot::Bag],
                    None,
                ),
                t(
                    "casual_day",
                    Occasion::CasualDay,
                    (1, 3),
                    BodyCoverage::Either,
                    vec![Slot::Footwear],
                    vec![Slot::Mid, Slot::Outer, Slot::Bag, Slot::Headwear],
                    None,
                ),
                t(
                    "date_night",
                    Occasion::DateNight,
                    (2, 4),
                    BodyCoverage::Either,
                    vec![Slot::Footwear],
                    vec![Slot::Outer, Slot::Jewelry, Slot::Bag],
                    None,
                ),
                t(
                    "formal_event",
                    Occasion::FormalEvent,
                    (4, 5),
                    BodyCoverage::Either,
                    vec![Slot::Footwear],
                    vec![Slot::Outer, Slot::Belt, Slot::Jewelry, Slot::Bag],
                    Some(4),
                ),
                t(
                    "cocktail",
                    Occasion::CocktailEvening,
                    (4, 5),
                    BodyCoverage::Either,
                    vec![Slot::Footwear],
                    vec![Slot::Outer, Slot::Jewelry, Slot::Bag],
                    None,
                ),
                t(
                    "wedding_guest",
                    Occasion::WeddingGuest,
                    (4, 5),
                    BodyCoverage::Either,
                    vec![Slot::Footwear],
                    vec![Slot::Outer, Slot::Jewelry, Slot::Bag, Slot::Headwear],
                    None,
                ),
                t(
                    "streetwear",
                    Occasion::Streetwear,
                    (1, 2),
                    BodyCoverage::Separates,
                    vec![Slot::Footwear],
                    vec![Slot::Mid, Slot::Outer, Slot::Headwear, Slot::Bag],
                    None,
                ),
                t(
                    "athleisure",
                    Occasion::Athleisure,
                    (1, 2),
                    BodyCoverage::Separates,
                    vec![Slot::Footwear],
                    vec![Slot::Mid, Slot::Outer, Slot::Headwear],
                    None,
                ),
                t(
                    "winter_layering",
                    Occasion::WinterLayering,
                    (2, 4),
                    BodyCoverage::Separates,
                    vec![Slot::Footwear, Slot::Outer],
                    vec![Slot::Mid, Slot::Hosiery, Slot::Headwear, Slot::Bag],
                    None,
                ),
            ],
            weights: Weights::default(),
            thresholds: Thresholds::default(),
            accessory_mode: AccessoryMode::Coordinated,
            catalog_cap: 1,
        }
    }

    /// Validate structural invariants at load: acyclic layering, sane
    /// weights, template depth within the search bound.
    pub fn validate(&self) -> Result<()> {
        self.layering.validate()?;
        self.weights.validate()?;
        for template in &self.templates {
            if template.dressiness_min > template.dressiness_max
                || !(1..=5).contains(&template.dressiness_min)
                || !(1..=5).contains(&template.dressiness_max)
            {
                return Err(Error::InvalidInput(format!(
                    "template {}: bad dressiness range",
                    template.template_id
                )));
            }
            if template.slot_sequence().len() > defaults::MAX_TEMPLATE_SLOTS {
                return Err(Error::InvalidInput(format!(
                    "template {}: too many slots",
                    template.template_id
                )));
            }
        }
        Ok(())
    }

    /// Templates matching an occasion and dressiness target.
    pub fn templates_for(&self, occasion: Occasion, dressiness: u8) -> Vec<&Template> {
        self.templates
            .iter()
            .filter(|t| t.occasion == occasion && t.contains_dressiness(dressiness))
            .collect()
    }
}

/// Persistent rule-set record, read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDoc {
    pub ruleset_id: String,
    pub version: String,
    pub payload: JsonValue,
    pub published_at: DateTime<Utc>,
}

impl RuleSetDoc {
    /// Parse the payload into a validated [`RuleSet`].
    pub fn into_ruleset(self) -> Result<RuleSet> {
        let ruleset: RuleSet = serde_json::from_value(self.payload)?;
        ruleset.validate()?;
        Ok(ruleset)
    }
}
