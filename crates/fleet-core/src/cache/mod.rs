// ── Site cache layer ──
//
// Watch-based readers for the resource kinds of one site, fed by one
// shared synchronization source per typed client.

mod reader;
mod source;
mod store;
mod stream;
mod table;

use std::time::Duration;

use fleet_api::ClusterClient;
use indexmap::IndexMap;

pub use reader::CacheReader;
pub(crate) use source::SharedSource;
pub use stream::{ObjectStream, ObjectWatchStream};
pub use table::{CacheKind, WatchSpec, WatchTable};

use crate::error::CoreError;

/// The (reader, synced-predicate) pairs of one site, keyed by kind.
///
/// Built once per successful site initialization and never rebuilt.
#[derive(Debug)]
pub struct CacheLayer {
    readers: IndexMap<CacheKind, CacheReader>,
}

impl CacheLayer {
    /// Create one shared source per API group in `table` and register a
    /// reader for every kind. The returned sources are not yet running.
    pub(crate) fn build(
        site: &str,
        client: &ClusterClient,
        table: &WatchTable,
        resync: Duration,
    ) -> (Self, Vec<SharedSource>) {
        let mut sources: Vec<SharedSource> = table
            .groups()
            .into_iter()
            .map(|group| SharedSource::new(site, group, resync))
            .collect();

        let mut readers = IndexMap::with_capacity(table.specs().len());
        for spec in table.specs() {
            let mut api = client.resource(spec.group, spec.plural.clone());
            if let Some(ns) = &spec.namespace {
                api = api.namespaced(ns.clone());
            }
            // `groups()` yields every group used by the table, so a match exists.
            if let Some(source) = sources.iter_mut().find(|s| s.group() == spec.group) {
                readers.insert(spec.kind, source.register(spec.kind, api));
            }
        }

        (Self { readers }, sources)
    }

    /// Reader for `kind`.
    pub fn reader(&self, kind: CacheKind) -> Result<&CacheReader, CoreError> {
        self.readers.get(&kind).ok_or_else(|| CoreError::UnknownKind {
            kind: kind.to_string(),
        })
    }

    pub fn units(&self) -> Result<&CacheReader, CoreError> {
        self.reader(CacheKind::UNIT)
    }

    pub fn pods(&self) -> Result<&CacheReader, CoreError> {
        self.reader(CacheKind::POD)
    }

    pub fn network_claims(&self) -> Result<&CacheReader, CoreError> {
        self.reader(CacheKind::NETWORK_CLAIM)
    }

    pub fn nodes(&self) -> Result<&CacheReader, CoreError> {
        self.reader(CacheKind::NODE)
    }

    pub fn volume_paths(&self) -> Result<&CacheReader, CoreError> {
        self.reader(CacheKind::VOLUME_PATH)
    }

    pub fn readers(&self) -> impl Iterator<Item = &CacheReader> {
        self.readers.values()
    }

    pub fn kinds(&self) -> impl Iterator<Item = CacheKind> + '_ {
        self.readers.keys().copied()
    }

    /// `true` once every reader's synced predicate holds.
    pub fn is_synced(&self) -> bool {
        self.readers.values().all(CacheReader::has_synced)
    }

    /// The sync barrier: resolves once every reader has synced.
    ///
    /// Not cancel-aware by itself; callers race it against their own
    /// cancellation and deadline. Fails with the kind whose source stopped
    /// before syncing.
    pub(crate) async fn wait_for_sync(&self) -> Result<(), CacheKind> {
        futures_util::future::try_join_all(self.readers.values().map(CacheReader::wait_synced))
            .await
            .map(|_| ())
    }
}
