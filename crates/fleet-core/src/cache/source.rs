// ── Shared synchronization source ──
//
// One background task per typed client. Each tick lists every kind the
// client serves and replaces the matching store wholesale.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleet_api::{ApiGroup, ResourceApi};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::reader::CacheReader;
use super::store::ObjectStore;
use super::table::CacheKind;

/// Retry period while a kind has not completed its first listing.
const WARMUP_RETRY: Duration = Duration::from_secs(1);

struct SourceWatch {
    kind: CacheKind,
    api: ResourceApi,
    store: Arc<ObjectStore>,
    synced: watch::Sender<bool>,
    last_sync: watch::Sender<Option<DateTime<Utc>>>,
}

/// Interval-driven source shared by every kind of one API group.
pub(crate) struct SharedSource {
    site: String,
    group: ApiGroup,
    resync: Duration,
    watches: Vec<SourceWatch>,
}

impl SharedSource {
    pub(crate) fn new(site: impl Into<String>, group: ApiGroup, resync: Duration) -> Self {
        Self {
            site: site.into(),
            group,
            resync,
            watches: Vec::new(),
        }
    }

    /// Register one kind on this source and return its reader.
    pub(crate) fn register(&mut self, kind: CacheKind, api: ResourceApi) -> CacheReader {
        let store = Arc::new(ObjectStore::new());
        let (synced, synced_rx) = watch::channel(false);
        let (last_sync, last_sync_rx) = watch::channel(None);

        self.watches.push(SourceWatch {
            kind,
            api,
            store: Arc::clone(&store),
            synced,
            last_sync,
        });

        CacheReader::new(kind, store, synced_rx, last_sync_rx)
    }

    pub(crate) fn group(&self) -> ApiGroup {
        self.group
    }

    /// Run until `cancel` fires. An in-flight listing is abandoned on cancel.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        debug!(site = %self.site, group = %self.group, kinds = self.watches.len(), "sync source started");

        loop {
            let all_synced = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                synced = self.resync_all() => synced,
            };

            let delay = if all_synced {
                self.resync
            } else {
                self.resync.min(WARMUP_RETRY)
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        debug!(site = %self.site, group = %self.group, "sync source stopped");
    }

    /// List every registered kind once. Returns `true` if all kinds have
    /// completed at least one listing.
    async fn resync_all(&self) -> bool {
        for entry in &self.watches {
            match entry.api.list().await {
                Ok(list) => {
                    let count = list.items.len();
                    entry.store.replace_all(list.items);
                    entry.last_sync.send_replace(Some(Utc::now()));
                    let first = entry.synced.send_if_modified(|synced| {
                        let was = *synced;
                        *synced = true;
                        !was
                    });
                    if first {
                        debug!(site = %self.site, kind = %entry.kind, count, "initial sync complete");
                    }
                }
                Err(e) => {
                    warn!(site = %self.site, kind = %entry.kind, error = %e, "resync failed");
                }
            }
        }

        self.watches.iter().all(|w| *w.synced.borrow())
    }
}
