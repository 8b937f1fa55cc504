//! Attribute registry: role taxonomy and ingress validation.
//!
//! The registry declares which attributes are applicable to which garment
//! roles and which slot class each role occupies. It is static and
//! immutable for the process lifetime; items failing validation are ingress
//! errors and never reach the engine.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::items::{Item, Slot};

// Attribute field names, shared with confidence maps.
pub const F_FORMALITY: &str = "formality";
pub const F_SEASONALITY: &str = "seasonality";
pub const F_COLOR: &str = "color";
pub const F_PATTERN: &str = "pattern";
pub const F_MATERIAL: &str = "material";
pub const F_STYLE_TAGS: &str = "style_tags";
pub const F_FIT_PROFILE: &str = "fit_profile";
pub const F_TOP_LENGTH: &str = "top_length_class";
pub const F_BOTTOM_RISE: &str = "bottom_rise_class";
pub const F_SHOULDER: &str = "shoulder_structure";
pub const F_WAIST_EMPHASIS: &str = "waist_emphasis";
pub const F_GROUP: &str = "group";
pub const F_LEATHER: &str = "leather_family";
pub const F_METAL: &str = "metal_family";
pub const F_METAL_FINISH: &str = "metal_finish";
pub const F_BAG_KIND: &str = "bag_kind";
pub const F_JEWELRY_KIND: &str = "jewelry_kind";
pub const F_FOOTWEAR_CLASS: &str = "footwear_class";
pub const F_BELT_LOOPS: &str = "belt_loops";

/// Fields every garment role may carry.
const COMMON_FIELDS: &[&str] = &[
    F_FORMALITY,
    F_SEASONALITY,
    F_COLOR,
    F_PATTERN,
    F_MATERIAL,
    F_STYLE_TAGS,
];

/// An ingress validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeViolation {
    pub item_id: String,
    pub field: String,
    pub reason: String,
}

/// Declaration of one garment role.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub role: &'static str,
    pub slot: Slot,
    /// Role-specific fields beyond the common set.
    pub extra_fields: &'static [&'static str],
}

/// The process-wide role taxonomy.
#[derive(Debug)]
pub struct AttributeRegistry {
    roles: BTreeMap<&'static str, RoleSpec>,
}

/// Upper-body layer fields.
const TOP_FIELDS: &[&str] = &[F_FIT_PROFILE, F_TOP_LENGTH, F_SHOULDER, F_GROUP];
/// Bottom fields.
const BOTTOM_FIELDS: &[&str] = &[
    F_FIT_PROFILE,
    F_BOTTOM_RISE,
    F_WAIST_EMPHASIS,
    F_BELT_LOOPS,
    F_GROUP,
];
/// One-piece fields combine upper and lower concerns.
const ONE_PIECE_FIELDS: &[&str] = &[
    F_FIT_PROFILE,
    F_TOP_LENGTH,
    F_SHOULDER,
    F_WAIST_EMPHASIS,
    F_GROUP,
];

static BUILTIN: Lazy<AttributeRegistry> = Lazy::new(|| {
    let specs = [
        // Tops.
        RoleSpec { role: "shirt", slot: Slot::Top, extra_fields: TOP_FIELDS },
        RoleSpec { role: "t_shirt", slot: Slot::Top, extra_fields: TOP_FIELDS },
        RoleSpec { role: "blouse", slot: Slot::Top, extra_fields: TOP_FIELDS },
        RoleSpec { role: "polo", slot: Slot::Top, extra_fields: TOP_FIELDS },
        RoleSpec { role: "tank", slot: Slot::Top, extra_fields: TOP_FIELDS },
        // Mid layers.
        RoleSpec { role: "sweater", slot: Slot::Mid, extra_fields: TOP_FIELDS },
        RoleSpec { role: "cardigan", slot: Slot::Mid, extra_fields: TOP_FIELDS },
        RoleSpec { role: "hoodie", slot: Slot::Mid, extra_fields: TOP_FIELDS },
        RoleSpec { role: "vest", slot: Slot::Mid, extra_fields: TOP_FIELDS },
        // Outer layers.
        RoleSpec { role: "jacket", slot: Slot::Outer, extra_fields: TOP_FIELDS },
        RoleSpec { role: "blazer", slot: Slot::Outer, extra_fields: TOP_FIELDS },
        RoleSpec { role: "coat", slot: Slot::Outer, extra_fields: TOP_FIELDS },
        RoleSpec { role: "parka", slot: Slot::Outer, extra_fields: TOP_FIELDS },
        // Bottoms.
        RoleSpec { role: "trousers", slot: Slot::Bottom, extra_fields: BOTTOM_FIELDS },
        RoleSpec { role: "jeans", slot: Slot::Bottom, extra_fields: BOTTOM_FIELDS },
        RoleSpec { role: "chinos", slot: Slot::Bottom, extra_fields: BOTTOM_FIELDS },
        RoleSpec { role: "skirt", slot: Slot::Bottom, extra_fields: BOTTOM_FIELDS },
        RoleSpec { role: "shorts", slot: Slot::Bottom, extra_fields: BOTTOM_FIELDS },
        RoleSpec { role: "joggers", slot: Slot::Bottom, extra_fields: BOTTOM_FIELDS },
        // One-pieces.
        RoleSpec { role: "dress", slot: Slot::OnePiece, extra_fields: ONE_PIECE_FIELDS },
        RoleSpec { role: "jumpsuit", slot: Slot::OnePiece, extra_fields: ONE_PIECE_FIELDS },
        // Footwear.
        RoleSpec {
            role: "shoes",
            slot: Slot::Footwear,
            extra_fields: &[F_FOOTWEAR_CLASS, F_LEATHER],
        },
        RoleSpec {
            role: "sneakers",
            slot: Slot::Footwear,
            extra_fields: &[F_FOOTWEAR_CLASS, F_LEATHER],
        },
        RoleSpec {
            role: "boots",
            slot: Slot::Footwear,
            extra_fields: &[F_FOOTWEAR_CLASS, F_LEATHER],
        },
        RoleSpec {
            role: "heels",
            slot: Slot::Footwear,
            extra_fields: &[F_FOOTWEAR_CLASS, F_LEATHER],
        },
        // Accessories.
        RoleSpec {
            role: "bag",
            slot: Slot::Bag,
            extra_fields: &[F_BAG_KIND, F_LEATHER, F_METAL, F_METAL_FINISH],
        },
        RoleSpec {
            role: "belt",
            slot: Slot::Belt,
            extra_fields: &[F_LEATHER, F_METAL, F_METAL_FINISH],
        },
        RoleSpec {
            role: "necklace",
            slot: Slot::Jewelry,
            extra_fields: &[F_JEWELRY_KIND, F_METAL, F_METAL_FINISH],
        },
        RoleSpec {
            role: "earrings",
            slot: Slot::Jewelry,
            extra_fields: &[F_JEWELRY_KIND, F_METAL, F_METAL_FINISH],
        },
        RoleSpec {
            role: "bracelet",
            slot: Slot::Jewelry,
            extra_fields: &[F_JEWELRY_KIND, F_METAL, F_METAL_FINISH],
        },
        RoleSpec {
            role: "watch",
            slot: Slot::Jewelry,
            extra_fields: &[F_JEWELRY_KIND, F_METAL, F_METAL_FINISH, F_LEATHER],
        },
        // Headwear and hosiery.
        RoleSpec { role: "hat", slot: Slot::Headwear, extra_fields: &[] },
        RoleSpec { role: "beanie", slot: Slot::Headwear, extra_fields: &[] },
        RoleSpec { role: "socks", slot: Slot::Hosiery, extra_fields: &[] },
        RoleSpec { role: "tights", slot: Slot::Hosiery, extra_fields: &[] },
    ];

    let mut roles = BTreeMap::new();
    for spec in specs {
        roles.insert(spec.role, spec);
    }
    AttributeRegistry { roles }
});

impl AttributeRegistry {
    /// The built-in taxonomy, shared for the process lifetime.
    pub fn builtin() -> &'static AttributeRegistry {
        &BUILTIN
    }

    /// Slot class a role occupies, if the role is known.
    pub fn slot_of(&self, role: &str) -> Option<Slot> {
        self.roles.get(role).map(|s| s.slot)
    }

    /// All attribute fields applicable to a role.
    pub fn applicable_fields(&self, role: &str) -> Option<BTreeSet<&'static str>> {
        self.roles.get(role).map(|spec| {
            COMMON_FIELDS
                .iter()
                .chain(spec.extra_fields.iter())
                .copied()
                .collect()
        })
    }

    /// Validate an item against the taxonomy.
    ///
    /// Checks that the role is known, that the item sits in the role's slot
    /// class, and that every present attribute is declared applicable to
    /// the role. Returns an empty list when the item is valid.
    pub fn validate(&self, item: &Item) -> Vec<AttributeViolation> {
        let mut violations = Vec::new();

        let Some(spec) = self.roles.get(item.role.as_str()) else {
            violations.push(AttributeViolation {
                item_id: item.item_id.clone(),
                field: "role".to_string(),
                reason: format!("unknown role '{}'", item.role),
            });
            return violations;
        };

        if item.slot != spec.slot {
            violations.push(AttributeViolation {
                item_id: item.item_id.clone(),
                field: "slot".to_string(),
                reason: format!(
                    "role '{}' belongs to slot '{}', not '{}'",
                    item.role, spec.slot, item.slot
                ),
            });
        }

        let applicable = self
            .applicable_fields(&item.role)
            .unwrap_or_default();
        let mut check = |present: bool, field: &str| {
            if present && !applicable.contains(field) {
                violations.push(AttributeViolation {
                    item_id: item.item_id.clone(),
                    field: field.to_string(),
                    reason: format!("not applicable to role '{}'", item.role),
                });
            }
        };

        check(item.fit_profile.is_some(), F_FIT_PROFILE);
        check(item.top_length_class.is_some(), F_TOP_LENGTH);
        check(item.bottom_rise_class.is_some(), F_BOTTOM_RISE);
        check(item.shoulder_structure.is_some(), F_SHOULDER);
        check(item.waist_emphasis.is_some(), F_WAIST_EMPHASIS);
        check(item.coord.is_some(), F_GROUP);
        check(item.leather_family.is_some(), F_LEATHER);
        check(item.metal_family.is_some(), F_METAL);
        check(item.metal_finish.is_some(), F_METAL_FINISH);
        check(item.bag_kind.is_some(), F_BAG_KIND);
        check(item.jewelry_kind.is_some(), F_JEWELRY_KIND);
        check(item.footwear_class.is_some(), F_FOOTWEAR_CLASS);
        check(item.belt_loops.is_some(), F_BELT_LOOPS);

        violations
    }
}
