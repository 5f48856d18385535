// ── Per-kind object store ──
//
// Lock-free concurrent storage with O(1) lookups and push-based
// change notification via `watch` channels.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use fleet_api::RemoteObject;
use tokio::sync::watch;

pub(crate) type Snapshot = Arc<Vec<Arc<RemoteObject>>>;

/// Reactive storage for the objects of one watched kind.
///
/// Uses `DashMap` for O(1) concurrent lookups and a `watch` channel for
/// push-based change notification. Every mutation bumps a version counter
/// and rebuilds the snapshot that subscribers receive.
pub(crate) struct ObjectStore {
    /// `namespace/name` (or `name`) -> object.
    by_key: DashMap<String, Arc<RemoteObject>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Snapshot>,
}

impl ObjectStore {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or update an object. Returns `true` if the key was new.
    #[cfg(test)]
    pub(crate) fn upsert(&self, object: RemoteObject) -> bool {
        let is_new = self.by_key.insert(object.key(), Arc::new(object)).is_none();
        self.publish();
        is_new
    }

    /// Replace the whole contents with a fresh listing.
    ///
    /// Upserts every incoming object, then prunes keys that are no longer
    /// present. Readers never observe the brief empty state a
    /// clear-then-insert would cause. Publishes a single snapshot.
    pub(crate) fn replace_all(&self, items: Vec<RemoteObject>) {
        let incoming: HashSet<String> = items.iter().map(RemoteObject::key).collect();
        for object in items {
            self.by_key.insert(object.key(), Arc::new(object));
        }
        self.by_key.retain(|key, _| incoming.contains(key));
        self.publish();
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<RemoteObject>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild the snapshot, broadcast it, and bump the version.
    fn publish(&self) {
        let mut values: Vec<Arc<RemoteObject>> =
            self.by_key.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by_key(|o| o.key());
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}
