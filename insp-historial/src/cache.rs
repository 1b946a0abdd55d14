//! Session-scoped submission detail cache
//!
//! Owned by the caller (one per browsing session) and shared by cloning.
//! Entries are set once per submission id and never evicted; a later write
//! for an existing id is ignored. Concurrent writers for the same id are
//! benign because the first value simply stays.

use crate::types::SubmissionDetail;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Detail cache keyed by submission id
#[derive(Debug, Clone, Default)]
pub struct DetailCache {
    entries: Arc<RwLock<HashMap<String, Arc<SubmissionDetail>>>>,
}

impl DetailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<SubmissionDetail>> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Insert unless the id is already cached
    ///
    /// Returns `true` when the value was stored.
    pub async fn insert_if_absent(&self, id: String, detail: SubmissionDetail) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, Arc::new(detail));
        true
    }

    /// Snapshot of the requested ids that are cached
    pub async fn get_many<'a, I>(&self, ids: I) -> HashMap<String, Arc<SubmissionDetail>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = self.entries.read().await;
        ids.into_iter()
            .filter_map(|id| entries.get(id).map(|d| (id.to_string(), Arc::clone(d))))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubmissionLite;

    fn detail(id: &str, placa: &str) -> SubmissionDetail {
        SubmissionDetail {
            submission: SubmissionLite {
                id: id.to_string(),
                placa_vehiculo: Some(placa.to_string()),
                ..Default::default()
            },
            answers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_set_once() {
        let cache = DetailCache::new();
        assert!(cache.insert_if_absent("S1".into(), detail("S1", "first")).await);
        assert!(!cache.insert_if_absent("S1".into(), detail("S1", "second")).await);

        let cached = cache.get("S1").await.unwrap();
        assert_eq!(cached.submission.placa_vehiculo.as_deref(), Some("first"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = DetailCache::new();
        let other = cache.clone();
        other.insert_if_absent("S2".into(), detail("S2", "p")).await;

        assert!(cache.contains("S2").await);
        assert!(DetailCache::new().is_empty().await);
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let cache = DetailCache::new();
        cache.insert_if_absent("S1".into(), detail("S1", "a")).await;

        let found = cache.get_many(["S1", "S9"]).await;
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("S1"));
    }
}
