//! In-memory providers and wardrobe builders shared by the integration
//! tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use ensemble_core::color::Lch;
use ensemble_core::error::Result;
use ensemble_core::items::{
    CohesionPolicy, CoordMembership, CoordSetKind, Item, Owner, Slot, TempBand,
};
use ensemble_core::profile::Profile;
use ensemble_core::ruleset::RuleSet;
use ensemble_core::traits::{
    Clock, IndexFilter, IndexPage, IndexQuery, IndexScope, ProfileProvider, RuleSetProvider,
    WearHistoryProvider,
};
use ensemble_engine::{EngineConfig, OutfitEngine};

// =============================================================================
// ITEM BUILDERS
// =============================================================================

pub fn item(id: &str, role: &str, slot: Slot, formality: u8, bands: &[TempBand]) -> Item {
    Item {
        item_id: id.to_string(),
        owner: Owner::Wardrobe,
        role: role.to_string(),
        slot,
        formality,
        seasonality: bands.iter().copied().collect(),
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

pub fn colored(mut item: Item, l: f64, c: f64, hue: f64) -> Item {
    item.color = Some(Lch::new(l, c, hue));
    item
}

pub fn grouped(mut item: Item, group: &str, set_role: &str, policy: CohesionPolicy) -> Item {
    item.coord = Some(CoordMembership {
        group_id: group.to_string(),
        set_role: set_role.to_string(),
        kind: CoordSetKind::Suit,
        policy,
    });
    item
}

pub fn catalog_owned(mut item: Item) -> Item {
    item.owner = Owner::Catalog;
    item
}

/// The S1 wardrobe: a strict warm-weather suit, a white shirt, black
/// oxfords.
pub fn office_suit_wardrobe() -> Vec<Item> {
    let bands = [TempBand::Warm, TempBand::Mild];
    vec![
        colored(
            grouped(
                item("g1-jacket", "jacket", Slot::Outer, 4, &bands),
                "g1",
                "suit_jacket",
                CohesionPolicy::Strict,
            ),
            25.0,
            2.0,
            250.0,
        ),
        colored(
            grouped(
                item("g1-trousers", "trousers", Slot::Bottom, 4, &bands),
                "g1",
                "suit_trousers",
                CohesionPolicy::Strict,
            ),
            25.0,
            2.0,
            250.0,
        ),
        colored(item("shirt-white", "shirt", Slot::Top, 4, &bands), 95.0, 2.0, 180.0),
        colored(item("oxfords-black", "shoes", Slot::Footwear, 5, &bands), 5.0, 1.0, 0.0),
    ]
}

// =============================================================================
// PROVIDERS
// =============================================================================

pub struct MemoryIndex {
    pub wardrobe: BTreeMap<String, Vec<Item>>,
    pub catalog: Vec<Item>,
}

impl MemoryIndex {
    pub fn new(user_id: &str, items: Vec<Item>) -> Self {
        let mut wardrobe = BTreeMap::new();
        wardrobe.insert(user_id.to_string(), items);
        Self {
            wardrobe,
            catalog: Vec::new(),
        }
    }

    pub fn with_catalog(mut self, items: Vec<Item>) -> Self {
        self.catalog = items;
        self
    }

    fn scope_items(&self, scope: &IndexScope) -> Vec<&Item> {
        match scope {
            IndexScope::Wardrobe { user_id } => self
                .wardrobe
                .get(user_id)
                .map(|items| items.iter().collect())
                .unwrap_or_default(),
            IndexScope::Catalog => self.catalog.iter().collect(),
        }
    }

    fn matches(item: &Item, filter: &IndexFilter) -> bool {
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
}

#[async_trait]
impl IndexQuery for MemoryIndex {
    async fn search(
        &self,
        scope: &IndexScope,
        filter: &IndexFilter,
        limit: usize,
        _cursor: Option<String>,
    ) -> Result<IndexPage> {
        let mut items: Vec<Item> = self
            .scope_items(scope)
            .into_iter()
            .filter(|i| Self::matches(i, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        items.truncate(limit);
        Ok(IndexPage {
            items,
            next_cursor: None,
        })
    }

    async fn get(&self, scope: &IndexScope, item_id: &str) -> Result<Option<Item>> {
        Ok(self
            .scope_items(scope)
            .into_iter()
            .find(|i| i.item_id == item_id)
            .cloned())
    }
}

pub struct FixedRuleSets(pub Arc<RuleSet>);

#[async_trait]
impl RuleSetProvider for FixedRuleSets {
    async fn current(&self) -> Result<Arc<RuleSet>> {
        Ok(self.0.clone())
    }
}

pub struct MemoryProfiles(pub BTreeMap<String, Profile>);

#[async_trait]
impl ProfileProvider for MemoryProfiles {
    async fn snapshot(&self, user_id: &str) -> Result<Profile> {
        Ok(self
            .0
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Profile::neutral(user_id)))
    }
}

pub struct MemoryHistory(pub Vec<String>);

#[async_trait]
impl WearHistoryProvider for MemoryHistory {
    async fn recent(&self, _user_id: &str, n: usize) -> Result<Vec<String>> {
        Ok(self.0.iter().take(n).cloned().collect())
    }
}

pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }
}

// =============================================================================
// ENGINE ASSEMBLY
// =============================================================================

pub fn engine_with(index: MemoryIndex) -> OutfitEngine {
    engine_with_profile(index, None)
}

pub fn engine_with_profile(index: MemoryIndex, profile: Option<Profile>) -> OutfitEngine {
    let mut profiles = BTreeMap::new();
    if let Some(p) = profile {
        profiles.insert(p.user_id.clone(), p);
    }
    OutfitEngine::new(
        Arc::new(index),
        Arc::new(FixedRuleSets(Arc::new(RuleSet::builtin()))),
        Arc::new(MemoryProfiles(profiles)),
        Arc::new(MemoryHistory(Vec::new())),
        Arc::new(FixedClock),
        EngineConfig::default(),
    )
}
