//! In-memory snapshot of managed groups.

use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use gatekeeper_store::GroupStore;
use gatekeeper_types::{ChatId, ManagedGroup, Timestamp};

use crate::error::GroupError;

#[derive(Clone, Default)]
struct Snapshot {
    groups: Arc<Vec<ManagedGroup>>,
    refreshed_at: Option<Timestamp>,
}

/// Read-only cache of the managed groups held by a [`GroupStore`].
///
/// The store stays the source of truth. `refresh` reads the complete group
/// list outside the lock and then replaces the cached `Arc` in one write, so a
/// reader holds either the previous list or the new one, never a mixture.
pub struct GroupRegistry {
    store: Arc<dyn GroupStore + Send + Sync>,
    current: RwLock<Snapshot>,
}

impl GroupRegistry {
    /// Create an empty registry. Call [`GroupRegistry::refresh`] to populate it.
    pub fn new(store: Arc<dyn GroupStore + Send + Sync>) -> Self {
        Self {
            store,
            current: RwLock::new(Snapshot::default()),
        }
    }

    /// Rebuild the snapshot from the store. Returns the number of groups loaded.
    ///
    /// On a store error the previous snapshot is kept.
    pub fn refresh(&self, now: Timestamp) -> Result<usize, GroupError> {
        let groups = Arc::new(self.store.list_groups()?);
        let count = groups.len();
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Snapshot {
            groups,
            refreshed_at: Some(now),
        };
        drop(current);
        tracing::info!(groups = count, "refreshed group registry");
        Ok(count)
    }

    /// The current snapshot, ordered by group id.
    pub fn snapshot(&self) -> Arc<Vec<ManagedGroup>> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&current.groups)
    }

    pub fn refreshed_at(&self) -> Option<Timestamp> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .refreshed_at
    }

    /// Whether the snapshot was never loaded or is older than `max_age_secs`.
    pub fn is_stale(&self, now: Timestamp, max_age_secs: u64) -> bool {
        match self.refreshed_at() {
            Some(at) => at.elapsed_since(now) >= max_age_secs,
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Live chat ids of every bound group in the snapshot.
    pub fn bound_chats(&self) -> Vec<(ManagedGroup, ChatId)> {
        self.snapshot()
            .iter()
            .filter_map(|g| g.chat_id.map(|chat| (g.clone(), chat)))
            .collect()
    }

    pub fn find_by_chat(&self, chat: ChatId) -> Option<ManagedGroup> {
        self.snapshot()
            .iter()
            .find(|g| g.chat_id == Some(chat))
            .cloned()
    }

    /// Plain-text listing of the snapshot for users.
    pub fn format_for_display(&self) -> String {
        let groups = self.snapshot();
        if groups.is_empty() {
            return "No groups available at the moment.".to_string();
        }
        let mut out = String::from("Available groups:\n");
        for group in groups.iter() {
            let _ = write!(out, "\n- {}\n", group.name);
            if !group.description.is_empty() {
                let _ = writeln!(out, "  {}", group.description);
            }
            let _ = writeln!(out, "  {}", group.link);
        }
        out.push_str("\nVerified users are approved automatically.");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_nullables::NullStore;
    use gatekeeper_types::NewGroup;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn new_group(name: &str, link: &str) -> NewGroup {
        NewGroup::new(name, "desc", link).unwrap()
    }

    #[test]
    fn starts_empty_and_stale() {
        let registry = GroupRegistry::new(Arc::new(NullStore::new()));
        assert!(registry.is_empty());
        assert!(registry.is_stale(Timestamp::new(0), 300));
        assert_eq!(registry.format_for_display(), "No groups available at the moment.");
    }

    #[test]
    fn refresh_replaces_snapshot() {
        let store = Arc::new(NullStore::new());
        let registry = GroupRegistry::new(store.clone());
        store.add_group(new_group("Alpha", "https://t.me/alpha")).unwrap();

        assert_eq!(registry.refresh(Timestamp::new(100)).unwrap(), 1);
        let before = registry.snapshot();

        store.add_group(new_group("Beta", "https://t.me/beta")).unwrap();
        assert_eq!(registry.len(), 1, "cache is not patched incrementally");

        registry.refresh(Timestamp::new(200)).unwrap();
        assert_eq!(before.len(), 1, "old snapshot is unaffected");
        let names: Vec<_> = registry.snapshot().iter().map(|g| g.name.clone()).collect();
        assert_eq!(names, ["Alpha", "Beta"]);
        assert_eq!(registry.refreshed_at(), Some(Timestamp::new(200)));
    }

    #[test]
    fn staleness_follows_max_age() {
        let registry = GroupRegistry::new(Arc::new(NullStore::new()));
        registry.refresh(Timestamp::new(1_000)).unwrap();
        assert!(!registry.is_stale(Timestamp::new(1_299), 300));
        assert!(registry.is_stale(Timestamp::new(1_300), 300));
    }

    #[test]
    fn display_lists_every_group() {
        let store = Arc::new(NullStore::new());
        store.add_group(new_group("Alpha", "https://t.me/alpha")).unwrap();
        store.add_group(new_group("Beta", "https://t.me/+tok")).unwrap();
        let registry = GroupRegistry::new(store);
        registry.refresh(Timestamp::new(1)).unwrap();

        let text = registry.format_for_display();
        assert!(text.contains("- Alpha"));
        assert!(text.contains("https://t.me/+tok"));
    }

    #[test]
    fn bound_chats_skip_unbound_groups() {
        let store = Arc::new(NullStore::new());
        let a = store.add_group(new_group("Alpha", "https://t.me/alpha")).unwrap();
        store.add_group(new_group("Beta", "https://t.me/beta")).unwrap();
        store.bind_chat_id(a.id, ChatId::new(-100)).unwrap();
        let registry = GroupRegistry::new(store);
        registry.refresh(Timestamp::new(1)).unwrap();

        let bound = registry.bound_chats();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].1, ChatId::new(-100));
        assert_eq!(registry.find_by_chat(ChatId::new(-100)).unwrap().name, "Alpha");
    }

    #[test]
    fn readers_never_observe_a_torn_snapshot() {
        let store = Arc::new(NullStore::new());
        for i in 0..8 {
            store
                .add_group(new_group(&format!("G{i}"), &format!("https://t.me/g{i}")))
                .unwrap();
        }
        let registry = Arc::new(GroupRegistry::new(store.clone()));
        registry.refresh(Timestamp::new(0)).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        let snap = registry.snapshot();
                        // Every snapshot is a prefix-complete list: ids 1..=n in order.
                        for (i, group) in snap.iter().enumerate() {
                            assert_eq!(group.id.get(), i as u64 + 1);
                        }
                        assert!(snap.len() >= 8);
                    }
                })
            })
            .collect();

        for i in 8..40 {
            store
                .add_group(new_group(&format!("G{i}"), &format!("https://t.me/g{i}")))
                .unwrap();
            registry.refresh(Timestamp::new(i)).unwrap();
        }
        done.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.len(), 40);
    }
}
