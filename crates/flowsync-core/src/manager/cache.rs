// ── Per-element manager cache ──
//
// Explicit replacement for a process-wide singleton: the caller owns the
// cache and (re)creates a manager per element with `reset`.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::FlowEngineeringManager;
use crate::config::ManagerOptions;
use crate::table::TableStore;

#[derive(Debug, Default)]
pub struct ManagerCache {
    managers: DashMap<String, FlowEngineeringManager>,
}

impl ManagerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any state held for `element_id` and install a fresh manager.
    pub fn reset(&self, element_id: &str, store: Arc<dyn TableStore>, options: ManagerOptions) {
        let previous = self
            .managers
            .insert(element_id.to_owned(), FlowEngineeringManager::new(element_id, store, options));
        info!(element = element_id, replaced = previous.is_some(), "manager reset");
    }

    /// Exclusive access to the element's manager; `None` if never reset.
    ///
    /// The entry stays locked for the duration of `f`; do not call back
    /// into the cache for the same element from inside it.
    pub fn with<R>(&self, element_id: &str, f: impl FnOnce(&mut FlowEngineeringManager) -> R) -> Option<R> {
        let mut entry = self.managers.get_mut(element_id)?;
        Some(f(entry.value_mut()))
    }

    pub fn remove(&self, element_id: &str) -> Option<FlowEngineeringManager> {
        self.managers.remove(element_id).map(|(_, manager)| manager)
    }

    pub fn contains(&self, element_id: &str) -> bool {
        self.managers.contains_key(element_id)
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Direction;
    use crate::table::MemoryTableStore;

    fn store() -> Arc<dyn TableStore> {
        Arc::new(MemoryTableStore::new())
    }

    #[test]
    fn with_requires_reset() {
        let cache = ManagerCache::new();
        assert!(cache.with("a", |m| m.element_id().to_owned()).is_none());

        cache.reset("a", store(), ManagerOptions::default());
        assert_eq!(cache.with("a", |m| m.element_id().to_owned()).unwrap(), "a");
        assert!(cache.contains("a"));
    }

    #[test]
    fn reset_discards_previous_state() {
        let cache = ManagerCache::new();
        let shared = store();
        cache.reset("a", Arc::clone(&shared), ManagerOptions::default());
        cache.with("a", |m| {
            m.refresh_statistics(&[crate::store::FlowSample::new("x", 1.0)], &[])
                .unwrap();
            assert!(m.incoming().contains("x"));
        });

        cache.reset("a", shared, ManagerOptions::default());
        let empty = cache.with("a", |m| m.incoming().is_empty()).unwrap();
        assert!(empty);
        assert!(!cache.with("a", |m| m.delete_flow(Direction::Rx, "x").unwrap()).unwrap());
    }

    #[test]
    fn remove_drops_element() {
        let cache = ManagerCache::new();
        cache.reset("a", store(), ManagerOptions::default());
        assert!(cache.remove("a").is_some());
        assert!(cache.is_empty());
    }
}
