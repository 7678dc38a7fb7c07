//! Local view of the remote session history
//!
//! The list is only changed after the service confirms an operation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::PersistenceError;
use crate::session::ports::HistoryService;

use super::model::{HistoryDraft, HistoryEntry};

/// Largest page the history service accepts
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Default)]
struct HistoryState {
    items: Vec<HistoryEntry>,
    loading: bool,
    expanded: Option<String>,
    visible: bool,
}

/// History list backed by a [`HistoryService`]
pub struct HistoryStore<H> {
    service: Arc<H>,
    limit: u32,
    state: Mutex<HistoryState>,
}

impl<H: HistoryService> HistoryStore<H> {
    pub fn new(service: Arc<H>, limit: u32) -> Self {
        Self { service, limit: limit.clamp(1, MAX_LIMIT), state: Mutex::default() }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entries as last loaded, most recent first
    pub fn items(&self) -> Vec<HistoryEntry> {
        self.lock().items.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// Entry whose details are expanded
    pub fn expanded(&self) -> Option<HistoryEntry> {
        let state = self.lock();
        let id = state.expanded.as_deref()?;
        state.items.iter().find(|e| e.id == id).cloned()
    }

    /// Reload the list from the service
    pub async fn refresh(&self) -> Result<(), PersistenceError> {
        self.lock().loading = true;
        let result = self.service.list(self.limit).await;

        let mut state = self.lock();
        state.loading = false;
        let items = result.inspect_err(|e| tracing::warn!("Failed to load history: {}", e))?;
        tracing::debug!(count = items.len(), "History loaded");
        state.items = items;
        Ok(())
    }

    /// Show or hide the panel; showing it reloads the list
    pub async fn set_visible(&self, visible: bool) -> Result<(), PersistenceError> {
        {
            let mut state = self.lock();
            state.visible = visible;
            state.expanded = None;
        }
        if visible { self.refresh().await } else { Ok(()) }
    }

    /// Expand an entry, or collapse it if it is already expanded
    pub fn toggle_details(&self, id: &str) {
        let mut state = self.lock();
        if state.expanded.as_deref() == Some(id) {
            state.expanded = None;
        } else {
            state.expanded = Some(id.to_string());
        }
    }

    /// Persist a finished session
    pub async fn create(&self, draft: &HistoryDraft) -> Result<(), PersistenceError> {
        self.service
            .create(draft)
            .await
            .inspect_err(|e| tracing::warn!("Failed to store session: {}", e))?;
        tracing::info!(
            correct = draft.mcq_correct,
            total = draft.mcq_total,
            "Session saved to history"
        );
        Ok(())
    }

    /// Delete one entry, removing it locally once the service confirms
    pub async fn delete_one(&self, id: &str) -> Result<(), PersistenceError> {
        self.service
            .delete_one(id)
            .await
            .inspect_err(|e| tracing::warn!("Failed to delete history item {}: {}", id, e))?;

        let mut state = self.lock();
        state.items.retain(|e| e.id != id);
        if state.expanded.as_deref() == Some(id) {
            state.expanded = None;
        }
        Ok(())
    }

    /// Delete every entry
    pub async fn clear_all(&self) -> Result<(), PersistenceError> {
        self.lock().loading = true;
        let result = self.service.clear_all().await;

        let mut state = self.lock();
        state.loading = false;
        result.inspect_err(|e| tracing::warn!("Failed to clear history: {}", e))?;
        state.items.clear();
        state.expanded = None;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    /// In-memory history service with scriptable outcomes
    #[derive(Debug, Default)]
    pub struct MemoryHistory {
        pub entries: Mutex<Vec<HistoryEntry>>,
        pub drafts: Mutex<Vec<HistoryDraft>>,
        pub refuse_store: Mutex<bool>,
        pub refuse_delete: Mutex<bool>,
        pub offline: Mutex<bool>,
    }

    impl MemoryHistory {
        pub fn with_entries(ids: &[&str]) -> Self {
            let entries = ids
                .iter()
                .map(|id| HistoryEntry { id: id.to_string(), ..Default::default() })
                .collect();
            Self { entries: Mutex::new(entries), ..Default::default() }
        }

        fn check_online(&self) -> Result<(), PersistenceError> {
            if *self.offline.lock().unwrap() { Err(PersistenceError::Transport) } else { Ok(()) }
        }
    }

    impl HistoryService for MemoryHistory {
        async fn list(&self, limit: u32) -> Result<Vec<HistoryEntry>, PersistenceError> {
            self.check_online()?;
            let entries = self.entries.lock().unwrap();
            Ok(entries.iter().take(limit as usize).cloned().collect())
        }

        async fn create(&self, draft: &HistoryDraft) -> Result<(), PersistenceError> {
            self.check_online()?;
            if *self.refuse_store.lock().unwrap() {
                return Err(PersistenceError::NotStored("History not stored".into()));
            }
            self.drafts.lock().unwrap().push(draft.clone());
            let mut entries = self.entries.lock().unwrap();
            let id = format!("h{}", entries.len() + 1);
            entries.insert(
                0,
                HistoryEntry {
                    id,
                    source_type: draft.source_type.clone(),
                    source_preview: draft.source_preview.clone(),
                    mcq_total: draft.mcq_total,
                    mcq_correct: draft.mcq_correct,
                    summary: draft.summary.clone(),
                    ..Default::default()
                },
            );
            Ok(())
        }

        async fn delete_one(&self, id: &str) -> Result<(), PersistenceError> {
            self.check_online()?;
            if *self.refuse_delete.lock().unwrap() {
                return Err(PersistenceError::NotStored("History item not deleted".into()));
            }
            self.entries.lock().unwrap().retain(|e| e.id != id);
            Ok(())
        }

        async fn clear_all(&self) -> Result<(), PersistenceError> {
            self.check_online()?;
            self.entries.lock().unwrap().clear();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::MemoryHistory;
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(store: &HistoryStore<MemoryHistory>) -> Vec<String> {
        store.items().into_iter().map(|e| e.id).collect()
    }

    #[tokio::test]
    async fn refresh_loads_entries() {
        let store = HistoryStore::new(Arc::new(MemoryHistory::with_entries(&["h2", "h1"])), 25);
        store.refresh().await.unwrap();
        assert_eq!(ids(&store), vec!["h2", "h1"]);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let store = HistoryStore::new(Arc::new(MemoryHistory::with_entries(&["a", "b"])), 0);
        store.refresh().await.unwrap();
        assert_eq!(ids(&store), vec!["a"]);
    }

    #[tokio::test]
    async fn refused_delete_keeps_local_list() {
        let service = Arc::new(MemoryHistory::with_entries(&["h1", "h2"]));
        let store = HistoryStore::new(service.clone(), 25);
        store.refresh().await.unwrap();
        *service.refuse_delete.lock().unwrap() = true;

        let err = store.delete_one("h1").await.unwrap_err();
        assert_eq!(err, PersistenceError::NotStored("History item not deleted".into()));
        assert_eq!(ids(&store), vec!["h1", "h2"]);
    }

    #[tokio::test]
    async fn confirmed_delete_collapses_expanded() {
        let store = HistoryStore::new(Arc::new(MemoryHistory::with_entries(&["h1", "h2"])), 25);
        store.refresh().await.unwrap();
        store.toggle_details("h1");
        assert_eq!(store.expanded().map(|e| e.id), Some("h1".to_string()));

        store.delete_one("h1").await.unwrap();
        assert_eq!(ids(&store), vec!["h2"]);
        assert!(store.expanded().is_none());
    }

    #[tokio::test]
    async fn toggle_details_expands_one_at_a_time() {
        let store = HistoryStore::new(Arc::new(MemoryHistory::with_entries(&["h1", "h2"])), 25);
        store.set_visible(true).await.unwrap();
        store.toggle_details("h1");
        store.toggle_details("h2");
        assert_eq!(store.expanded().map(|e| e.id), Some("h2".to_string()));
        store.toggle_details("h2");
        assert!(store.expanded().is_none());
    }

    #[tokio::test]
    async fn failed_clear_keeps_items() {
        let service = Arc::new(MemoryHistory::with_entries(&["h1"]));
        let store = HistoryStore::new(service.clone(), 25);
        store.refresh().await.unwrap();
        *service.offline.lock().unwrap() = true;

        assert_eq!(store.clear_all().await, Err(PersistenceError::Transport));
        assert_eq!(ids(&store), vec!["h1"]);
        assert!(!store.is_loading());

        *service.offline.lock().unwrap() = false;
        store.clear_all().await.unwrap();
        assert!(store.items().is_empty());
    }
}
