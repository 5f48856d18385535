// ── Cached readers ──
//
// Read-only view of one watched kind. Reads fail with `NotSynced` until
// the first full listing has landed, so callers never mistake an
// in-progress warm-up for an empty cluster.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_api::RemoteObject;
use tokio::sync::watch;

use super::store::ObjectStore;
use super::stream::ObjectStream;
use super::table::CacheKind;
use crate::error::CoreError;

/// Reader for one cached kind, paired with its synced predicate.
///
/// Cheap to clone; clones observe the same store.
#[derive(Clone)]
pub struct CacheReader {
    kind: CacheKind,
    store: Arc<ObjectStore>,
    synced: watch::Receiver<bool>,
    last_sync: watch::Receiver<Option<DateTime<Utc>>>,
}

impl CacheReader {
    pub(crate) fn new(
        kind: CacheKind,
        store: Arc<ObjectStore>,
        synced: watch::Receiver<bool>,
        last_sync: watch::Receiver<Option<DateTime<Utc>>>,
    ) -> Self {
        Self {
            kind,
            store,
            synced,
            last_sync,
        }
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    /// The synced predicate: `true` once the initial listing is stored.
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Time of the most recent successful listing.
    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.borrow()
    }

    /// All cached objects, sorted by key.
    pub fn list(&self) -> Result<Arc<Vec<Arc<RemoteObject>>>, CoreError> {
        self.ensure_synced()?;
        Ok(self.store.snapshot())
    }

    /// One object by `namespace/name` (or `name` when cluster-scoped).
    pub fn get(&self, key: &str) -> Result<Option<Arc<RemoteObject>>, CoreError> {
        self.ensure_synced()?;
        Ok(self.store.get(key))
    }

    /// Mutation counter of the underlying store; bumps on every listing.
    pub fn generation(&self) -> u64 {
        self.store.version()
    }

    pub fn len(&self) -> Result<usize, CoreError> {
        self.ensure_synced()?;
        Ok(self.store.len())
    }

    pub fn is_empty(&self) -> Result<bool, CoreError> {
        self.len().map(|n| n == 0)
    }

    /// Subscribe to changes. The stream is not gated on sync: its first
    /// snapshot may predate the initial listing.
    pub fn subscribe(&self) -> ObjectStream {
        ObjectStream::new(self.store.subscribe())
    }

    /// Block until the synced predicate holds. Fails if the source stopped
    /// before syncing.
    pub(crate) async fn wait_synced(&self) -> Result<(), CacheKind> {
        let mut rx = self.synced.clone();
        rx.wait_for(|synced| *synced)
            .await
            .map(|_| ())
            .map_err(|_| self.kind)
    }

    fn ensure_synced(&self) -> Result<(), CoreError> {
        if self.has_synced() {
            Ok(())
        } else {
            Err(CoreError::NotSynced {
                kind: self.kind.to_string(),
            })
        }
    }
}

impl std::fmt::Debug for CacheReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheReader")
            .field("kind", &self.kind)
            .field("synced", &self.has_synced())
            .field("len", &self.store.len())
            .finish()
    }
}
