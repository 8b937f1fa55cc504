//! Process-wide bounded LRU cache for per-user candidate shortlists.
//!
//! Keyed by `(user_id, ruleset_version, context_hash)`. Invalidation is
//! event-driven: an item change invalidates the user's entries, a rule-set
//! publication flushes everything.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use ensemble_core::defaults::SHORTLIST_CACHE_CAPACITY;
use ensemble_core::events::{EngineEvent, EventBus};
use ensemble_core::items::Slot;
use ensemble_core::profile::Context;

use crate::retrieval::RankedCandidate;

/// Shortlists per template slot, as cached for one request shape.
pub type SlotShortlists = BTreeMap<Slot, Vec<RankedCandidate>>;

/// Hash of the request context shape, used in cache keys.
pub fn context_hash(context: &Context, allow_catalog: bool) -> String {
    let mut hasher = Sha256::new();
    // Context is a small, deterministic-serde type; a stable hash of its
    // JSON form identifies the request shape.
    if let Ok(bytes) = serde_json::to_vec(context) {
        hasher.update(&bytes);
    }
    hasher.update([u8::from(allow_catalog)]);
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn cache_key(user_id: &str, ruleset_version: &str, ctx_hash: &str) -> String {
    format!("{user_id}\u{1}{ruleset_version}\u{1}{ctx_hash}")
}

/// Bounded LRU shortlist cache shared across requests.
#[derive(Clone)]
pub struct ShortlistCache {
    inner: Arc<Mutex<LruCache<String, Arc<SlotShortlists>>>>,
}

impl Default for ShortlistCache {
    fn default() -> Self {
        Self::new(SHORTLIST_CACHE_CAPACITY)
    }
}

impl ShortlistCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is non-zero");
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub async fn get(
        &self,
        user_id: &str,
        ruleset_version: &str,
        ctx_hash: &str,
    ) -> Option<Arc<SlotShortlists>> {
        let key = cache_key(user_id, ruleset_version, ctx_hash);
        let mut cache = self.inner.lock().await;
        cache.get(&key).cloned()
    }

    pub async fn put(
        &self,
        user_id: &str,
        ruleset_version: &str,
        ctx_hash: &str,
        shortlists: Arc<SlotShortlists>,
    ) {
        let key = cache_key(user_id, ruleset_version, ctx_hash);
        let mut cache = self.inner.lock().await;
        cache.put(key, shortlists);
    }

    /// Drop every entry belonging to a user.
    pub async fn invalidate_user(&self, user_id: &str) {
        let prefix = format!("{user_id}\u{1}");
        let mut cache = self.inner.lock().await;
        let stale: Vec<String> = cache
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            cache.pop(key);
        }
        debug!(user_id, evicted = stale.len(), "shortlist cache invalidated for user");
    }

    /// Drop everything (rule-set publication).
    pub async fn clear(&self) {
        let mut cache = self.inner.lock().await;
        cache.clear();
        debug!("shortlist cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subscribe this cache to engine events and apply invalidations until
    /// the bus closes.
    pub fn spawn_invalidation_listener(&self, bus: &EventBus) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(EngineEvent::ItemChanged { user_id, .. }) => match user_id {
                        Some(user) => cache.invalidate_user(&user).await,
                        // Catalog items feed every user's shortlists.
                        None => cache.clear().await,
                    },
                    Ok(EngineEvent::RuleSetPublished { .. }) => cache.clear().await,
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        // Missed invalidations cannot be replayed; flush.
                        warn!(skipped, "invalidation listener lagged; clearing cache");
                        cache.clear().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_core::items::TempBand;
    use ensemble_core::profile::Occasion;
    use std::collections::BTreeSet;

    fn context(band: TempBand) -> Context {
        Context {
            occasion: Occasion::CasualDay,
            target_dressiness: Some(3),
            temperature_band: band,
            event_tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_context_hash_distinguishes_shapes() {
        let warm = context_hash(&context(TempBand::Warm), false);
        let cold = context_hash(&context(TempBand::Cold), false);
        let warm_catalog = context_hash(&context(TempBand::Warm), true);
        assert_ne!(warm, cold);
        assert_ne!(warm, warm_catalog);
        assert_eq!(warm, context_hash(&context(TempBand::Warm), false));
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let cache = ShortlistCache::new(8);
        let lists = Arc::new(SlotShortlists::new());
        cache.put("u-1", "v1", "abcd", lists.clone()).await;

        assert!(cache.get("u-1", "v1", "abcd").await.is_some());
        assert!(cache.get("u-1", "v2", "abcd").await.is_none());
        assert!(cache.get("u-2", "v1", "abcd").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_user_scoped() {
        let cache = ShortlistCache::new(8);
        let lists = Arc::new(SlotShortlists::new());
        cache.put("u-1", "v1", "a", lists.clone()).await;
        cache.put("u-2", "v1", "a", lists.clone()).await;

        cache.invalidate_user("u-1").await;
        assert!(cache.get("u-1", "v1", "a").await.is_none());
        assert!(cache.get("u-2", "v1", "a").await.is_some());
    }

    #[tokio::test]
    async fn test_capacity_bounded() {
        let cache = ShortlistCache::new(2);
        let lists = Arc::new(SlotShortlists::new());
        cache.put("u-1", "v1", "a", lists.clone()).await;
        cache.put("u-2", "v1", "a", lists.clone()).await;
        cache.put("u-3", "v1", "a", lists.clone()).await;
        assert_eq!(cache.len().await, 2);
        // Oldest entry evicted.
        assert!(cache.get("u-1", "v1", "a").await.is_none());
    }

    #[tokio::test]
    async fn test_event_driven_invalidation() {
        let cache = ShortlistCache::new(8);
        let bus = EventBus::default();
        let handle = cache.spawn_invalidation_listener(&bus);

        let lists = Arc::new(SlotShortlists::new());
        cache.put("u-1", "v1", "a", lists.clone()).await;
        cache.put("u-2", "v1", "a", lists.clone()).await;

        bus.emit(EngineEvent::ItemChanged {
            user_id: Some("u-1".to_string()),
            item_id: "itm-1".to_string(),
        });
        // Let the listener drain the event.
        tokio::task::yield_now().await;
        for _ in 0..50 {
            if cache.get("u-1", "v1", "a").await.is_none() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert!(cache.get("u-1", "v1", "a").await.is_none());
        assert!(cache.get("u-2", "v1", "a").await.is_some());

        bus.emit(EngineEvent::RuleSetPublished {
            version: "v2".to_string(),
        });
        for _ in 0..50 {
            if cache.is_empty().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert!(cache.is_empty().await);

        handle.abort();
    }
}
