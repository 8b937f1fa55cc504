//! The outfit engine facade: generate, replace, and explain.
//!
//! One request captures one rule-set and profile snapshot, fans slot
//! retrieval out in parallel, runs the beam search under the request
//! deadline, and reports a tagged result. An inflight gauge bounds
//! concurrent requests; excess returns the busy kind for the host to
//! surface as BUSY.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use ensemble_core::bundle::{
    Bundle, BundleExplanation, BundleResult, BundleSlot, SlotExplanation,
};
use ensemble_core::deadline::Deadline;
use ensemble_core::defaults;
use ensemble_core::error::{Error, Result};
use ensemble_core::events::{EngineEvent, EventBus};
use ensemble_core::items::{CohesionPolicy, Item, Slot};
use ensemble_core::profile::{Context, Occasion, Profile};
use ensemble_core::ruleset::{RuleSet, Template};
use ensemble_core::traits::{
    Clock, IndexQuery, ProfileProvider, RuleSetProvider, WearHistoryProvider,
};

use crate::beam::{assemble, AssemblerInputs};
use crate::cache::{context_hash, ShortlistCache, SlotShortlists};
use crate::replace::{ReplaceInputs, ReplacePlanner};
use crate::retrieval::{CandidateRetriever, RetrievalCtx};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Beam width W.
    pub beam_width: usize,
    /// Shortlist size for anchor-capable slots.
    pub anchor_shortlist: usize,
    /// Shortlist size for the remaining slots.
    pub other_shortlist: usize,
    /// Bound on concurrently served requests.
    pub max_inflight: usize,
    /// Shortlist cache capacity.
    pub cache_capacity: usize,
    /// Alternatives returned per replace request.
    pub max_alternatives: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            beam_width: defaults::BEAM_WIDTH,
            anchor_shortlist: defaults::SHORTLIST_ANCHOR,
            other_shortlist: defaults::SHORTLIST_OTHER,
            max_inflight: defaults::MAX_INFLIGHT,
            cache_capacity: defaults::SHORTLIST_CACHE_CAPACITY,
            max_alternatives: defaults::REPLACE_MAX_ALTERNATIVES,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ENSEMBLE_BEAM_WIDTH` | `8` | Beam width |
    /// | `ENSEMBLE_ANCHOR_SHORTLIST` | `40` | Anchor shortlist size |
    /// | `ENSEMBLE_OTHER_SHORTLIST` | `20` | Non-anchor shortlist size |
    /// | `ENSEMBLE_MAX_INFLIGHT` | `64` | Concurrent request bound |
    /// | `ENSEMBLE_CACHE_CAPACITY` | `512` | Shortlist cache entries |
    pub fn from_env() -> Self {
        fn read(var: &str, default: usize) -> usize {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(default)
                .max(1)
        }
        Self {
            beam_width: read("ENSEMBLE_BEAM_WIDTH", defaults::BEAM_WIDTH),
            anchor_shortlist: read("ENSEMBLE_ANCHOR_SHORTLIST", defaults::SHORTLIST_ANCHOR),
            other_shortlist: read("ENSEMBLE_OTHER_SHORTLIST", defaults::SHORTLIST_OTHER),
            max_inflight: read("ENSEMBLE_MAX_INFLIGHT", defaults::MAX_INFLIGHT),
            cache_capacity: read("ENSEMBLE_CACHE_CAPACITY", defaults::SHORTLIST_CACHE_CAPACITY),
            max_alternatives: defaults::REPLACE_MAX_ALTERNATIVES,
        }
    }

    pub fn with_beam_width(mut self, width: usize) -> Self {
        self.beam_width = width.max(1);
        self
    }

    pub fn with_max_inflight(mut self, max: usize) -> Self {
        self.max_inflight = max.max(1);
        self
    }
}

/// A generate request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub user_id: String,
    pub context: Context,
    pub allow_catalog: bool,
    pub deadline: Deadline,
    /// Seed hook for future stochastic extensions. The engine is
    /// deterministic and currently ignores it.
    pub seed: Option<String>,
}

/// A replace request. The bundle travels by value: the engine re-resolves
/// its items from the index at plan time.
#[derive(Debug, Clone)]
pub struct ReplaceRequest {
    pub user_id: String,
    pub bundle: Bundle,
    pub context: Context,
    pub slot: Slot,
    pub locks: BTreeSet<Slot>,
    pub allow_catalog: bool,
    pub deadline: Deadline,
}

struct InflightGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The assembly engine.
pub struct OutfitEngine {
    retriever: CandidateRetriever,
    rulesets: Arc<dyn RuleSetProvider>,
    profiles: Arc<dyn ProfileProvider>,
    history: Arc<dyn WearHistoryProvider>,
    clock: Arc<dyn Clock>,
    cache: ShortlistCache,
    events: EventBus,
    inflight: Arc<AtomicUsize>,
    config: EngineConfig,
}

impl OutfitEngine {
    /// Build an engine over the given providers.
    ///
    /// Must be called within a Tokio runtime: the shortlist cache's
    /// invalidation listener is spawned here.
    pub fn new(
        index: Arc<dyn IndexQuery>,
        rulesets: Arc<dyn RuleSetProvider>,
        profiles: Arc<dyn ProfileProvider>,
        history: Arc<dyn WearHistoryProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let cache = ShortlistCache::new(config.cache_capacity);
        let events = EventBus::default();
        // The cache stays consistent through the same bus hosts publish
        // item and rule-set changes on.
        cache.spawn_invalidation_listener(&events);
        Self {
            retriever: CandidateRetriever::new(index),
            rulesets,
            profiles,
            history,
            clock,
            cache,
            events,
            inflight: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// The engine's event bus. Hosts publish `ItemChanged` and
    /// `RuleSetPublished` here and may subscribe to bundle events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Currently served requests.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<InflightGuard> {
        let previous = self.inflight.fetch_add(1, Ordering::SeqCst);
        if previous >= self.config.max_inflight {
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Busy { inflight: previous });
        }
        Ok(InflightGuard {
            counter: self.inflight.clone(),
        })
    }

    /// Generate a bundle for a user and occasion context.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn generate(&self, request: GenerateRequest) -> Result<BundleResult> {
        let _guard = self.acquire()?;
        let started = Instant::now();

        request.context.validate()?;
        let ruleset = self.rulesets.current().await?;
        let profile = self.profiles.snapshot(&request.user_id).await?;
        profile.validate()?;

        let target = request.context.effective_dressiness(&profile);
        let template = select_template(&ruleset, request.context.occasion, target, &profile)?;
        debug!(
            template_id = %template.template_id,
            ruleset_version = %ruleset.version,
            "template selected"
        );

        // Empty or failed wear history degrades to zero novelty penalty.
        let recent = match self
            .history
            .recent(&request.user_id, ruleset.thresholds.novelty_window)
            .await
        {
            Ok(recent) => recent,
            Err(e) => {
                warn!(error = %e, "wear history unavailable; novelty neutral");
                Vec::new()
            }
        };

        let retrieval_ctx = RetrievalCtx {
            ruleset: &ruleset,
            profile: &profile,
            target_dressiness: target,
            band: request.context.temperature_band,
            allow_catalog: request.allow_catalog,
        };
        let shortlists = self
            .shortlists_for(&request, &ruleset, template, &retrieval_ctx)
            .await?;
        let rosters = self
            .rosters_for(&request.user_id, request.allow_catalog, &shortlists)
            .await?;

        let assembled = assemble(&AssemblerInputs {
            ruleset: &ruleset,
            template,
            profile: &profile,
            target_dressiness: target,
            band: request.context.temperature_band,
            allow_catalog: request.allow_catalog,
            recent: &recent,
            shortlists: &shortlists,
            rosters: &rosters,
            beam_width: self.config.beam_width,
            deadline: request.deadline,
        })?;

        let slots: Vec<BundleSlot> = assembled
            .filled
            .iter()
            .map(|(slot, item)| BundleSlot {
                slot: *slot,
                item_id: item.item_id.clone(),
                owner: item.owner,
            })
            .collect();
        let bundle = Bundle {
            bundle_id: Uuid::new_v4(),
            slots,
            score: assembled.breakdown.aggregate,
            components: assembled.breakdown.components,
            ruleset_version: ruleset.version.clone(),
            template_id: template.template_id.clone(),
            tie_break: assembled.tie_break,
        };

        self.events.emit(EngineEvent::BundleGenerated {
            user_id: request.user_id.clone(),
            bundle_id: bundle.bundle_id,
            template_id: bundle.template_id.clone(),
            ruleset_version: bundle.ruleset_version.clone(),
            score: bundle.score,
        });
        info!(
            duration_ms = started.elapsed().as_millis() as u64,
            score = bundle.score,
            partial = assembled.partial,
            "bundle generated"
        );

        Ok(BundleResult {
            bundle,
            partial: assembled.partial,
            generated_at: self.clock.now(),
        })
    }

    /// Rank replacement alternatives for one slot of an existing bundle.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, slot = %request.slot))]
    pub async fn replace(&self, request: ReplaceRequest) -> Result<ensemble_core::bundle::AlternativesResult> {
        let _guard = self.acquire()?;

        request.context.validate()?;
        let ruleset = self.rulesets.current().await?;
        let profile = self.profiles.snapshot(&request.user_id).await?;
        profile.validate()?;

        let target = request.context.effective_dressiness(&profile);
        let template = ruleset
            .templates
            .iter()
            .find(|t| t.template_id == request.bundle.template_id)
            .map(Ok)
            .unwrap_or_else(|| {
                select_template(&ruleset, request.context.occasion, target, &profile)
            })?;

        let recent = self
            .history
            .recent(&request.user_id, ruleset.thresholds.novelty_window)
            .await
            .unwrap_or_default();

        // Resolve the bundle back into items; a vanished item is an input
        // problem, not an engine bug.
        let mut bundle_items: BTreeMap<Slot, Item> = BTreeMap::new();
        for slot in &request.bundle.slots {
            let item = self
                .retriever
                .get_item(&request.user_id, &slot.item_id)
                .await?
                .ok_or_else(|| {
                    Error::InvalidInput(format!("bundle item {} no longer exists", slot.item_id))
                })?;
            bundle_items.insert(slot.slot, item);
        }

        let planner = ReplacePlanner::new(self.retriever.clone());
        let result = planner
            .plan(
                &request.user_id,
                &ReplaceInputs {
                    ruleset: &ruleset,
                    template,
                    profile: &profile,
                    target_dressiness: target,
                    band: request.context.temperature_band,
                    allow_catalog: request.allow_catalog,
                    recent: &recent,
                    bundle_items: &bundle_items,
                    target_slot: request.slot,
                    locks: &request.locks,
                    max_alternatives: self.config.max_alternatives,
                    deadline: request.deadline,
                },
            )
            .await?;

        self.events.emit(EngineEvent::SlotReplaced {
            user_id: request.user_id.clone(),
            slot: request.slot,
            alternative_count: result.alternatives.len(),
        });
        Ok(result)
    }

    /// Reconstruct the full explanation of a previously generated bundle
    /// from its stored breakdown.
    pub fn explain(&self, bundle: &Bundle) -> BundleExplanation {
        let slots = bundle
            .slots
            .iter()
            .map(|s| {
                let mut notes = vec![format!("fills the {} slot", s.slot)];
                if s.owner == ensemble_core::items::Owner::Catalog {
                    notes.push("suggested from the catalog".to_string());
                }
                if s.slot.is_near_face() {
                    notes.push("near-face; weighs into skin synergy".to_string());
                }
                SlotExplanation {
                    slot: s.slot,
                    item_id: s.item_id.clone(),
                    notes,
                }
            })
            .collect();

        BundleExplanation {
            bundle_id: bundle.bundle_id,
            template_id: bundle.template_id.clone(),
            ruleset_version: bundle.ruleset_version.clone(),
            aggregate: bundle.score,
            components: bundle.components.clone(),
            slots,
        }
    }

    /// Retrieve (or reuse) the per-slot shortlists for a request shape.
    async fn shortlists_for(
        &self,
        request: &GenerateRequest,
        ruleset: &RuleSet,
        template: &Template,
        retrieval_ctx: &RetrievalCtx<'_>,
    ) -> Result<Arc<SlotShortlists>> {
        let ctx_hash = context_hash(&request.context, request.allow_catalog);
        if let Some(cached) = self
            .cache
            .get(&request.user_id, &ruleset.version, &ctx_hash)
            .await
        {
            debug!(cache_hit = true, context_hash = %ctx_hash, "shortlists from cache");
            return Ok(cached);
        }

        // Anchor-capable slots (body layers and outer, where co-ord groups
        // live) get the deeper shortlist.
        let slots = template.slot_sequence();
        let fetches = slots.iter().map(|slot| {
            let k = match slot {
                Slot::Top | Slot::Bottom | Slot::OnePiece | Slot::Outer | Slot::Mid => {
                    self.config.anchor_shortlist
                }
                _ => self.config.other_shortlist,
            };
            async move {
                let shortlist = self
                    .retriever
                    .shortlist(&request.user_id, *slot, k, retrieval_ctx)
                    .await?;
                Ok::<_, Error>((*slot, shortlist))
            }
        });
        let fetched = try_join_all(fetches).await?;

        let shortlists: SlotShortlists = fetched
            .into_iter()
            .filter(|(_, list)| !list.is_empty())
            .collect();
        let shortlists = Arc::new(shortlists);
        self.cache
            .put(&request.user_id, &ruleset.version, &ctx_hash, shortlists.clone())
            .await;
        Ok(shortlists)
    }

    /// Fetch full rosters for every co-ord group surfacing in the
    /// shortlists with a cohesive policy.
    async fn rosters_for(
        &self,
        user_id: &str,
        allow_catalog: bool,
        shortlists: &SlotShortlists,
    ) -> Result<BTreeMap<String, Vec<Item>>> {
        let group_ids: BTreeSet<String> = shortlists
            .values()
            .flatten()
            .filter_map(|c| c.item.coord.as_ref())
            .filter(|coord| coord.policy != CohesionPolicy::Loose)
            .map(|coord| coord.group_id.clone())
            .collect();

        let fetches = group_ids.iter().map(|group_id| async move {
            let members = self
                .retriever
                .group_members(user_id, group_id, allow_catalog)
                .await?;
            Ok::<_, Error>((group_id.clone(), members))
        });
        Ok(try_join_all(fetches).await?.into_iter().collect())
    }
}

/// Pick the template whose dressiness range contains the target and whose
/// occasion matches; ties break by profile affinity then template id.
fn select_template<'a>(
    ruleset: &'a RuleSet,
    occasion: Occasion,
    target: u8,
    profile: &Profile,
) -> Result<&'a Template> {
    let mut matching = ruleset.templates_for(occasion, target);
    if matching.is_empty() {
        return Err(Error::NoTemplate {
            occasion: occasion.as_str().to_string(),
            dressiness: target,
        });
    }
    matching.sort_by(|a, b| {
        let affinity = |t: &Template| u8::from(t.occasion == profile.default_occasion);
        affinity(b)
            .cmp(&affinity(a))
            .then_with(|| a.template_id.cmp(&b.template_id))
    });
    Ok(matching[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_core::profile::Occasion;

    #[test]
    fn test_select_template_no_match() {
        let ruleset = RuleSet::builtin();
        let profile = Profile::neutral("u-1");
        let err = select_template(&ruleset, Occasion::WorkOffice, 1, &profile).unwrap_err();
        assert!(matches!(err, Error::NoTemplate { .. }));
    }

    #[test]
    fn test_select_template_by_id_order() {
        let ruleset = RuleSet::builtin();
        let profile = Profile::neutral("u-1");
        let t = select_template(&ruleset, Occasion::WorkOffice, 4, &profile).unwrap();
        assert_eq!(t.template_id, "business_separates");
    }

    #[test]
    fn test_config_from_env_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.beam_width, defaults::BEAM_WIDTH);
        assert_eq!(config.anchor_shortlist, defaults::SHORTLIST_ANCHOR);
    }
}
