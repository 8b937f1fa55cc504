//! Provider traits the engine consumes.
//!
//! These define the seams to the host: the candidate index, rule-set and
//! profile snapshots, wear history, and the clock. Concrete
//! implementations live outside the engine (or in test fixtures), keeping
//! the engine free of I/O and fully testable in-process.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::items::{Item, Slot, TempBand};
use crate::profile::Profile;
use crate::ruleset::RuleSet;

/// Query scope: one user's wardrobe or the global catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexScope {
    Wardrobe { user_id: String },
    Catalog,
}

/// Facet filter for candidate-index queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFilter {
    pub slot: Option<Slot>,
    /// Only items whose seasonality includes this band.
    pub seasonality_includes: Option<TempBand>,
    pub formality_min: Option<u8>,
    pub formality_max: Option<u8>,
    /// Items carrying any of these tags are excluded.
    pub exclude_style_tags: BTreeSet<String>,
    /// Restrict to members of a co-ord group.
    pub group_id: Option<String>,
}

impl IndexFilter {
    pub fn for_slot(slot: Slot) -> Self {
        Self {
            slot: Some(slot),
            ..Self::default()
        }
    }

    pub fn for_group(group_id: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            ..Self::default()
        }
    }
}

/// One page of index results. Ordering is stable under equal keys.
#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    pub items: Vec<Item>,
    pub next_cursor: Option<String>,
}

/// Read-only candidate index over denormalized item documents.
#[async_trait]
pub trait IndexQuery: Send + Sync {
    /// Search a scope with facet filters. Implementations must return a
    /// stable order under equal sort keys.
    async fn search(
        &self,
        scope: &IndexScope,
        filter: &IndexFilter,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<IndexPage>;

    /// Look up a single item by id within a scope.
    async fn get(&self, scope: &IndexScope, item_id: &str) -> Result<Option<Item>>;
}

/// Source of the current rule set. Captured once per request.
#[async_trait]
pub trait RuleSetProvider: Send + Sync {
    async fn current(&self) -> Result<Arc<RuleSet>>;
}

/// Source of user profiles.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn snapshot(&self, user_id: &str) -> Result<Profile>;
}

/// Recently worn item ids, most recent first, for novelty scoring.
#[async_trait]
pub trait WearHistoryProvider: Send + Sync {
    async fn recent(&self, user_id: &str, n: usize) -> Result<Vec<String>>;
}

/// Clock seam for recency and determinism seeding.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builders() {
        let f = IndexFilter::for_slot(Slot::Footwear);
        assert_eq!(f.slot, Some(Slot::Footwear));
        assert!(f.group_id.is_none());

        let g = IndexFilter::for_group("g1");
        assert_eq!(g.group_id.as_deref(), Some("g1"));
        assert!(g.slot.is_none());
    }

    #[test]
    fn test_system_clock_monotone_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
