//! Shared item builders for unit tests.

use std::collections::{BTreeMap, BTreeSet};

use ensemble_core::color::Lch;
use ensemble_core::items::{
    CohesionPolicy, CoordMembership, CoordSetKind, FitProfile, Item, Owner, Pattern, PatternKind,
    PatternScale, Slot, TempBand,
};

/// Minimal wardrobe item suitable for every band.
pub(crate) fn item(id: &str, role: &str, slot: Slot, formality: u8) -> Item {
    Item {
        item_id: id.to_string(),
        owner: Owner::Wardrobe,
        role: role.to_string(),
        slot,
        formality,
        seasonality: [
            TempBand::Cold,
            TempBand::Cool,
            TempBand::Mild,
            TempBand::Warm,
            TempBand::Hot,
        ]
        .into_iter()
        .collect(),
        color: None,
        pattern: None,
        material: None,
        style_tags: BTreeSet::new(),
        fit_profile: None,
        top_length_class: None,
        bottom_rise_class: None,
        shoulder_structure: None,
        waist_emphasis: None,
        coord: None,
        leather_family: None,
        metal_family: None,
        metal_finish: None,
        bag_kind: None,
        jewelry_kind: None,
        footwear_class: None,
        belt_loops: None,
        confidence: BTreeMap::new(),
    }
}

pub(crate) fn with_color(mut item: Item, l: f64, c: f64, hue: f64) -> Item {
    item.color = Some(Lch::new(l, c, hue));
    item
}

pub(crate) fn with_fit(mut item: Item, fit: FitProfile) -> Item {
    item.fit_profile = Some(fit);
    item
}

pub(crate) fn with_pattern(mut item: Item, kind: PatternKind, scale: Option<PatternScale>) -> Item {
    item.pattern = Some(Pattern { kind, scale });
    item
}

pub(crate) fn with_tags(mut item: Item, tags: &[&str]) -> Item {
    item.style_tags = tags.iter().map(|t| t.to_string()).collect();
    item
}

pub(crate) fn with_group(
    mut item: Item,
    group_id: &str,
    set_role: &str,
    kind: CoordSetKind,
    policy: CohesionPolicy,
) -> Item {
    item.coord = Some(CoordMembership {
        group_id: group_id.to_string(),
        set_role: set_role.to_string(),
        kind,
        policy,
    });
    item
}

pub(crate) fn catalog(mut item: Item) -> Item {
    item.owner = Owner::Catalog;
    item
}

/// A small plausible outfit used by aggregation tests.
pub(crate) fn context_items() -> Vec<Item> {
    vec![
        with_color(item("shirt-1", "shirt", Slot::Top, 3), 80.0, 25.0, 200.0),
        with_color(item("jeans-1", "jeans", Slot::Bottom, 2), 30.0, 30.0, 270.0),
        with_color(item("sneakers-1", "sneakers", Slot::Footwear, 2), 95.0, 2.0, 0.0),
    ]
}

/// In-memory candidate index for unit tests.
pub(crate) struct InMemoryIndex {
    pub wardrobe: BTreeMap<String, Vec<Item>>,
    pub catalog: Vec<Item>,
}

impl InMemoryIndex {
    pub(crate) fn new() -> Self {
        Self {
            wardrobe: BTreeMap::new(),
            catalog: Vec::new(),
        }
    }

    pub(crate) fn with_wardrobe(user_id: &str, items: Vec<Item>) -> Self {
        let mut index = Self::new();
        index.wardrobe.insert(user_id.to_string(), items);
        index
    }

    fn matches(item: &Item, filter: &ensemble_core::traits::IndexFilter) -> bool {
        if filter.slot.is_some_and(|s| s != item.slot) {
            return false;
        }
        if filter
            .seasonality_includes
            .is_some_and(|band| !item.seasonality.contains(&band))
        {
            return false;
        }
        if filter.formality_min.is_some_and(|lo| item.formality < lo) {
            return false;
        }
        if filter.formality_max.is_some_and(|hi| item.formality > hi) {
            return false;
        }
        if item
            .style_tags
            .iter()
            .any(|t| filter.exclude_style_tags.contains(t))
        {
            return false;
        }
        if let Some(group) = &filter.group_id {
            if item.coord.as_ref().map(|c| c.group_id.as_str()) != Some(group.as_str()) {
                return false;
            }
        }
        true
    }

    fn scope_items(&self, scope: &ensemble_core::traits::IndexScope) -> Vec<&Item> {
        match scope {
            ensemble_core::traits::IndexScope::Wardrobe { user_id } => self
                .wardrobe
                .get(user_id)
                .map(|items| items.iter().collect())
                .unwrap_or_default(),
            ensemble_core::traits::IndexScope::Catalog => self.catalog.iter().collect(),
        }
    }
}

#[async_trait::async_trait]
impl ensemble_core::traits::IndexQuery for InMemoryIndex {
    async fn search(
        &self,
        scope: &ensemble_core::traits::IndexScope,
        filter: &ensemble_core::traits::IndexFilter,
        limit: usize,
        _cursor: Option<String>,
    ) -> ensemble_core::error::Result<ensemble_core::traits::IndexPage> {
        let mut items: Vec<Item> = self
            .scope_items(scope)
            .into_iter()
            .filter(|i| Self::matches(i, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        items.truncate(limit);
        Ok(ensemble_core::traits::IndexPage {
            items,
            next_cursor: None,
        })
    }

    async fn get(
        &self,
        scope: &ensemble_core::traits::IndexScope,
        item_id: &str,
    ) -> ensemble_core::error::Result<Option<Item>> {
        Ok(self
            .scope_items(scope)
            .into_iter()
            .find(|i| i.item_id == item_id)
            .cloned())
    }
}
