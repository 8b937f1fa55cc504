//! Candidate retrieval: per-slot filtered, ranked shortlists.
//!
//! Wardrobe and catalog are queried in parallel; the merged list is ranked
//! by a unary score and made deterministic with the composite key
//! `(-unary, owner_rank, item_id)`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use ensemble_core::defaults::UNARY_CONFIDENCE_WEIGHT;
use ensemble_core::error::Result;
use ensemble_core::items::{Item, Slot, TempBand};
use ensemble_core::profile::Profile;
use ensemble_core::ruleset::RuleSet;
use ensemble_core::traits::{IndexFilter, IndexQuery, IndexScope};

/// A shortlist entry: the item plus its unary retrieval score.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub item: Item,
    pub unary: f64,
}

/// Retrieval context for one request.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalCtx<'a> {
    pub ruleset: &'a RuleSet,
    pub profile: &'a Profile,
    pub target_dressiness: u8,
    pub band: TempBand,
    pub allow_catalog: bool,
}

/// Unary candidate score: formality closeness + temperature fit + style
/// tag match + a small confidence term.
pub fn unary_score(item: &Item, ctx: &RetrievalCtx<'_>) -> f64 {
    let formality = 1.0 - (item.formality as f64 - ctx.target_dressiness as f64).abs() / 4.0;
    let temperature = if item.seasonality.contains(&ctx.band) {
        1.0
    } else {
        0.0
    };
    let style = if ctx.profile.style_signature.is_empty() {
        0.5
    } else {
        let signature: BTreeSet<&str> = ctx
            .profile
            .style_signature
            .iter()
            .map(String::as_str)
            .collect();
        let tags: BTreeSet<&str> = item.style_tags.iter().map(String::as_str).collect();
        let union = tags.union(&signature).count();
        if union == 0 {
            0.0
        } else {
            tags.intersection(&signature).count() as f64 / union as f64
        }
    };
    let confidence = item
        .confidence
        .values()
        .copied()
        .fold(1.0, f64::min);

    formality + temperature + style + UNARY_CONFIDENCE_WEIGHT * confidence
}

/// Per-slot candidate retriever over the read-only index.
#[derive(Clone)]
pub struct CandidateRetriever {
    index: Arc<dyn IndexQuery>,
}

impl CandidateRetriever {
    pub fn new(index: Arc<dyn IndexQuery>) -> Self {
        Self { index }
    }

    fn slot_filter(slot: Slot, ctx: &RetrievalCtx<'_>) -> IndexFilter {
        let t = &ctx.ruleset.thresholds;
        IndexFilter {
            slot: Some(slot),
            seasonality_includes: Some(ctx.band),
            formality_min: Some(
                ctx.target_dressiness
                    .saturating_sub(t.formality_tol_lo)
                    .max(1),
            ),
            formality_max: Some((ctx.target_dressiness + t.formality_tol_hi).min(5)),
            exclude_style_tags: ctx.profile.forbidden_tags.clone(),
            group_id: None,
        }
    }

    /// Ranked shortlist of size `k` for a template slot.
    pub async fn shortlist(
        &self,
        user_id: &str,
        slot: Slot,
        k: usize,
        ctx: &RetrievalCtx<'_>,
    ) -> Result<Vec<RankedCandidate>> {
        let filter = Self::slot_filter(slot, ctx);
        let wardrobe_scope = IndexScope::Wardrobe {
            user_id: user_id.to_string(),
        };

        // Wardrobe and catalog legs run concurrently; the merge below is
        // deterministic regardless of completion order.
        let (wardrobe, catalog) = if ctx.allow_catalog {
            let (w, c) = tokio::join!(
                self.index.search(&wardrobe_scope, &filter, k, None),
                self.index.search(&IndexScope::Catalog, &filter, k, None),
            );
            (w?, c?)
        } else {
            (
                self.index.search(&wardrobe_scope, &filter, k, None).await?,
                Default::default(),
            )
        };

        let mut merged: Vec<RankedCandidate> = wardrobe
            .items
            .into_iter()
            .chain(catalog.items)
            .map(|item| {
                let unary = unary_score(&item, ctx);
                RankedCandidate { item, unary }
            })
            .collect();

        merged.sort_by(|a, b| {
            b.unary
                .total_cmp(&a.unary)
                .then_with(|| a.item.owner.rank().cmp(&b.item.owner.rank()))
                .then_with(|| a.item.item_id.cmp(&b.item.item_id))
        });
        merged.truncate(k);

        debug!(
            slot = %slot,
            candidate_count = merged.len(),
            "shortlist retrieved"
        );
        Ok(merged)
    }

    /// All members of a co-ord group, ordered by item id.
    pub async fn group_members(
        &self,
        user_id: &str,
        group_id: &str,
        allow_catalog: bool,
    ) -> Result<Vec<Item>> {
        let filter = IndexFilter::for_group(group_id);
        let wardrobe_scope = IndexScope::Wardrobe {
            user_id: user_id.to_string(),
        };
        let limit = 32;

        let (wardrobe, catalog) = if allow_catalog {
            let (w, c) = tokio::join!(
                self.index.search(&wardrobe_scope, &filter, limit, None),
                self.index.search(&IndexScope::Catalog, &filter, limit, None),
            );
            (w?, c?)
        } else {
            (
                self.index
                    .search(&wardrobe_scope, &filter, limit, None)
                    .await?,
                Default::default(),
            )
        };

        let mut members: Vec<Item> = wardrobe.items.into_iter().chain(catalog.items).collect();
        members.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(members)
    }

    /// Fetch a single item by id, searching wardrobe first, then catalog.
    pub async fn get_item(&self, user_id: &str, item_id: &str) -> Result<Option<Item>> {
        let scope = IndexScope::Wardrobe {
            user_id: user_id.to_string(),
        };
        if let Some(item) = self.index.get(&scope, item_id).await? {
            return Ok(Some(item));
        }
        self.index.get(&IndexScope::Catalog, item_id).await
    }
}
