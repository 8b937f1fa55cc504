//! Garment item model.
//!
//! Items are sparse attribute bags: the taxonomy is carried as attributes
//! (role, slot, families, co-ord membership) rather than hard-coded garment
//! types, so the engine stays category- and gender-agnostic. Which
//! attributes may appear on which role is governed by the
//! [`crate::registry::AttributeRegistry`] at ingress; downstream code
//! assumes valid items.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::color::Lch;
use crate::error::{Error, Result};

// =============================================================================
// SLOTS AND OWNERSHIP
// =============================================================================

/// Outfit slot classes. Every role maps to exactly one slot class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Top,
    Mid,
    Outer,
    Bottom,
    OnePiece,
    Footwear,
    Bag,
    Belt,
    Jewelry,
    Headwear,
    Hosiery,
}

impl Slot {
    /// Stable string form, matching the wire names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Top => "top",
            Slot::Mid => "mid",
            Slot::Outer => "outer",
            Slot::Bottom => "bottom",
            Slot::OnePiece => "one_piece",
            Slot::Footwear => "footwear",
            Slot::Bag => "bag",
            Slot::Belt => "belt",
            Slot::Jewelry => "jewelry",
            Slot::Headwear => "headwear",
            Slot::Hosiery => "hosiery",
        }
    }

    /// Slots considered near the face for skin-synergy scoring.
    pub fn is_near_face(&self) -> bool {
        matches!(self, Slot::Top | Slot::Outer | Slot::Headwear | Slot::Jewelry)
    }

    /// Body-covering slots excluded when a one-piece is worn.
    pub fn is_body_layer(&self) -> bool {
        matches!(self, Slot::Top | Slot::Mid | Slot::Bottom)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an item lives: the user's wardrobe or the global catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Wardrobe,
    Catalog,
}

impl Owner {
    /// Merge rank for retrieval ordering: wardrobe before catalog.
    pub fn rank(&self) -> u8 {
        match self {
            Owner::Wardrobe => 0,
            Owner::Catalog => 1,
        }
    }
}

// =============================================================================
// ATTRIBUTE ENUMS
// =============================================================================

/// Temperature bands, used both for item seasonality and occasion context.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TempBand {
    Cold,
    Cool,
    Mild,
    Warm,
    Hot,
}

impl TempBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            TempBand::Cold => "cold",
            TempBand::Cool => "cool",
            TempBand::Mild => "mild",
            TempBand::Warm => "warm",
            TempBand::Hot => "hot",
        }
    }
}

/// Surface pattern kind. The set is open; unknown kinds are preserved as
/// non-solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Solid,
    Stripe,
    Check,
    Print,
    Texture,
    #[serde(other)]
    Other,
}

/// Pattern scale, used to penalize clashing pattern sizes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PatternScale {
    Micro,
    Small,
    Medium,
    Large,
}

/// Surface pattern: kind plus optional scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<PatternScale>,
}

impl Pattern {
    pub fn is_solid(&self) -> bool {
        self.kind == PatternKind::Solid
    }
}

/// Garment volume profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitProfile {
    Slim,
    Regular,
    Relaxed,
    Oversized,
}

/// Coarse volume class derived from the fit profile, used by silhouette
/// balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeClass {
    Fitted,
    Neutral,
    Voluminous,
}

impl FitProfile {
    pub fn volume_class(&self) -> VolumeClass {
        match self {
            FitProfile::Slim => VolumeClass::Fitted,
            FitProfile::Regular => VolumeClass::Neutral,
            FitProfile::Relaxed | FitProfile::Oversized => VolumeClass::Voluminous,
        }
    }
}

/// Shoulder construction of a garment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoulderStructure {
    Structured,
    Soft,
    None,
}

/// How strongly a coordinated set insists on being worn whole.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CohesionPolicy {
    Strict,
    PreferStrict,
    Loose,
}

/// Kind of coordinated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordSetKind {
    Suit,
    Tracksuit,
    KnitSet,
    Separates,
    #[serde(other)]
    Other,
}

/// Co-ord set membership. Modeled as one struct so the all-or-none
/// invariant on the four group fields holds by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordMembership {
    pub group_id: String,
    pub set_role: String,
    pub kind: CoordSetKind,
    pub policy: CohesionPolicy,
}

// =============================================================================
// ITEM
// =============================================================================

/// A garment item: identity plus a sparse, role-scoped attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub owner: Owner,
    /// Garment role tag from the registry (e.g. "shirt", "trousers").
    pub role: String,
    pub slot: Slot,
    /// Dressiness 1 (most casual) to 5 (most formal).
    pub formality: u8,
    /// Non-empty set of temperature bands the item suits.
    pub seasonality: BTreeSet<TempBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Lch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub style_tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_profile: Option<FitProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_length_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_rise_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoulder_structure: Option<ShoulderStructure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_emphasis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<CoordMembership>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leather_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metal_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metal_finish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bag_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jewelry_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footwear_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub belt_loops: Option<bool>,
    /// Per-attribute confidence for inferred fields. Asserted fields are
    /// absent from the map and read as 1.0.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub confidence: BTreeMap<String, f64>,
}

impl Item {
    /// Confidence of a named attribute; asserted (unlisted) fields are 1.0.
    pub fn confidence_for(&self, field: &str) -> f64 {
        self.confidence.get(field).copied().unwrap_or(1.0)
    }

    /// Minimum confidence over the named attributes.
    pub fn min_confidence(&self, fields: &[&str]) -> f64 {
        fields
            .iter()
            .map(|f| self.confidence_for(f))
            .fold(1.0, f64::min)
    }

    pub fn is_catalog(&self) -> bool {
        self.owner == Owner::Catalog
    }

    /// Whether the item carries a visible non-solid pattern.
    pub fn is_patterned(&self) -> bool {
        self.pattern.map(|p| !p.is_solid()).unwrap_or(false)
    }

    /// Strict-policy co-ord membership, if any.
    pub fn strict_group(&self) -> Option<&CoordMembership> {
        self.coord
            .as_ref()
            .filter(|c| c.policy == CohesionPolicy::Strict)
    }
}

// =============================================================================
// PERSISTENT READ FORMAT
// =============================================================================

/// Persistent item document, read-only to the engine: attributes and
/// confidence are JSON bags as stored by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDoc {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub attributes: JsonValue,
    #[serde(default)]
    pub confidence: JsonValue,
    pub updated_at: DateTime<Utc>,
}

/// Attribute bag as serialized in `ItemDoc.attributes`. Group fields are
/// flat on the wire and folded into [`CoordMembership`] during parsing.
#[derive(Debug, Deserialize)]
struct RawAttributes {
    role: String,
    slot: Slot,
    formality: u8,
    #[serde(default)]
    seasonality: BTreeSet<TempBand>,
    #[serde(default)]
    color: Option<Lch>,
    #[serde(default)]
    pattern: Option<Pattern>,
    #[serde(default)]
    material: Option<String>,
    #[serde(default)]
    style_tags: BTreeSet<String>,
    #[serde(default)]
    fit_profile: Option<FitProfile>,
    #[serde(default)]
    top_length_class: Option<String>,
    #[serde(default)]
    bottom_rise_class: Option<String>,
    #[serde(default)]
    shoulder_structure: Option<ShoulderStructure>,
    #[serde(default)]
    waist_emphasis: Option<String>,
    #[serde(default)]
    group_id: Option<String>,
    #[serde(default)]
    set_role: Option<String>,
    #[serde(default)]
    coord_set_kind: Option<CoordSetKind>,
    #[serde(default)]
    set_cohesion_policy: Option<CohesionPolicy>,
    #[serde(default)]
    leather_family: Option<String>,
    #[serde(default)]
    metal_family: Option<String>,
    #[serde(default)]
    metal_finish: Option<String>,
    #[serde(default)]
    bag_kind: Option<String>,
    #[serde(default)]
    jewelry_kind: Option<String>,
    #[serde(default)]
    footwear_class: Option<String>,
    #[serde(default)]
    belt_loops: Option<bool>,
}

impl ItemDoc {
    /// Parse the document into a typed [`Item`].
    ///
    /// Enforces the structural invariants: formality in 1..=5, non-empty
    /// seasonality, color within LCh bounds, and group fields all set or
    /// all absent. Role-applicability is checked separately by the
    /// attribute registry.
    pub fn into_item(self) -> Result<Item> {
        let owner = if self.user_id.is_some() {
            Owner::Wardrobe
        } else {
            Owner::Catalog
        };
        let raw: RawAttributes = serde_json::from_value(self.attributes)?;

        if !(1..=5).contains(&raw.formality) {
            return Err(Error::InvalidInput(format!(
                "item {}: formality {} outside 1..=5",
                self.item_id, raw.formality
            )));
        }
        if raw.seasonality.is_empty() {
            return Err(Error::InvalidInput(format!(
                "item {}: seasonality must be non-empty",
                self.item_id
            )));
        }
        if let Some(color) = &raw.color {
            if !color.in_bounds() {
                return Err(Error::InvalidInput(format!(
                    "item {}: color out of LCh bounds",
                    self.item_id
                )));
            }
        }

        let coord = match (raw.group_id, raw.set_role, raw.coord_set_kind, raw.set_cohesion_policy)
        {
            (Some(group_id), Some(set_role), Some(kind), Some(policy)) => Some(CoordMembership {
                group_id,
                set_role,
                kind,
                policy,
            }),
            (None, None, None, None) => None,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "item {}: group fields must be all set or all absent",
                    self.item_id
                )))
            }
        };

        let confidence: BTreeMap<String, f64> = match self.confidence {
            JsonValue::Null => BTreeMap::new(),
            other => serde_json::from_value(other)?,
        };

        Ok(Item {
            item_id: self.item_id,
            owner,
            role: raw.role,
            slot: raw.slot,
            formality: raw.formality,
            seasonality: raw.seasonality,
            color: raw.color,
            pattern: raw.pattern,
            material: raw.material,
            style_tags: raw.style_tags,
            fit_profile: raw.fit_profile,
            top_length_class: raw.top_length_class,
            bottom_rise_class: raw.bottom_rise_class,
            shoulder_structure: raw.shoulder_structure,
            waist_emphasis: raw.waist_emphasis,
            coord,
            leather_family: raw.leather_family,
            metal_family: raw.metal_family,
            metal_finish: raw.metal_finish,
            bag_kind: raw.bag_kind,
            jewelry_kind: raw.jewelry_kind,
            footwear_class: raw.footwear_class,
            belt_loops: raw.belt_loops,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(attributes: JsonValue) -> ItemDoc {
        ItemDoc {
            item_id: "itm-1".to_string(),
            user_id: Some("u-1".to_string()),
            attributes,
            confidence: JsonValue::Null,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_minimal_item() {
        let item = doc(json!({
            "role": "shirt",
            "slot": "top",
            "formality": 4,
            "seasonality": ["warm", "mild"],
        }))
        .into_item()
        .unwrap();

        assert_eq!(item.owner, Owner::Wardrobe);
        assert_eq!(item.slot, Slot::Top);
        assert_eq!(item.formality, 4);
        assert!(item.seasonality.contains(&TempBand::Warm));
        assert!(item.coord.is_none());
    }

    #[test]
    fn test_parse_catalog_owner_when_no_user() {
        let mut d = doc(json!({
            "role": "bag",
            "slot": "bag",
            "formality": 3,
            "seasonality": ["mild"],
        }));
        d.user_id = None;
        assert_eq!(d.into_item().unwrap().owner, Owner::Catalog);
    }

    #[test]
    fn test_parse_rejects_empty_seasonality() {
        let err = doc(json!({
            "role": "shirt",
            "slot": "top",
            "formality": 3,
            "seasonality": [],
        }))
        .into_item()
        .unwrap_err();
        assert!(err.to_string().contains("seasonality"));
    }

    #[test]
    fn test_parse_rejects_partial_group_fields() {
        let err = doc(json!({
            "role": "jacket",
            "slot": "outer",
            "formality": 4,
            "seasonality": ["warm"],
            "group_id": "g1",
        }))
        .into_item()
        .unwrap_err();
        assert!(err.to_string().contains("group fields"));
    }

    #[test]
    fn test_parse_full_coord_group() {
        let item = doc(json!({
            "role": "jacket",
            "slot": "outer",
            "formality": 4,
            "seasonality": ["warm", "mild"],
            "group_id": "g1",
            "set_role": "suit_jacket",
            "coord_set_kind": "suit",
            "set_cohesion_policy": "strict",
        }))
        .into_item()
        .unwrap();

        let coord = item.coord.unwrap();
        assert_eq!(coord.group_id, "g1");
        assert_eq!(coord.policy, CohesionPolicy::Strict);
        assert_eq!(coord.kind, CoordSetKind::Suit);
    }

    #[test]
    fn test_parse_rejects_out_of_bounds_color() {
        let err = doc(json!({
            "role": "shirt",
            "slot": "top",
            "formality": 3,
            "seasonality": ["warm"],
            "color": {"l": 120.0, "c": 10.0, "hue": 40.0},
        }))
        .into_item()
        .unwrap_err();
        assert!(err.to_string().contains("LCh bounds"));
    }

    #[test]
    fn test_parse_rejects_formality_out_of_range() {
        let err = doc(json!({
            "role": "shirt",
            "slot": "top",
            "formality": 6,
            "seasonality": ["warm"],
        }))
        .into_item()
        .unwrap_err();
        assert!(err.to_string().contains("formality"));
    }

    #[test]
    fn test_confidence_defaults_to_asserted() {
        let mut d = doc(json!({
            "role": "shirt",
            "slot": "top",
            "formality": 3,
            "seasonality": ["warm"],
        }));
        d.confidence = json!({"color": 0.6});
        let item = d.into_item().unwrap();
        assert!((item.confidence_for("color") - 0.6).abs() < 1e-12);
        assert!((item.confidence_for("formality") - 1.0).abs() < 1e-12);
        assert!((item.min_confidence(&["color", "formality"]) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_pattern_kind_reads_as_non_solid() {
        let item = doc(json!({
            "role": "shirt",
            "slot": "top",
            "formality": 2,
            "seasonality": ["warm"],
            "pattern": {"kind": "paisley", "scale": "small"},
        }))
        .into_item()
        .unwrap();
        assert!(item.is_patterned());
    }

    #[test]
    fn test_slot_ordering_is_stable() {
        // Deterministic merges sort committed slots; the derive order is the
        // wear order from inside out.
        assert!(Slot::Top < Slot::Mid);
        assert!(Slot::Mid < Slot::Outer);
        assert!(Slot::OnePiece < Slot::Footwear);
    }
}
