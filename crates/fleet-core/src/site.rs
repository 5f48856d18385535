// ── Site abstraction ──
//
// Lifecycle management for one remote cluster connection: connection
// descriptor, typed clients, identity probe, cache bootstrap and the
// sync barrier, plus idempotent shutdown.

use std::sync::Arc;
use std::time::Duration;

use fleet_api::{ClusterClient, ServerVersion, TlsMode, TransportConfig};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheLayer, WatchTable};
use crate::cancel::{SiteCancel, TaskGauge};
use crate::clients::SiteClients;
use crate::config::{SiteConfig, TlsVerification};
use crate::error::CoreError;

// ── SiteState ────────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SiteState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

// ── Connection ───────────────────────────────────────────────────

/// Everything a successful initialization produces. Written once, then
/// read without locking.
#[derive(Debug)]
pub struct Connection {
    clients: SiteClients,
    cache: Arc<CacheLayer>,
    version: ServerVersion,
}

impl Connection {
    pub fn clients(&self) -> &SiteClients {
        &self.clients
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    /// Identity reported by the cluster during initialization.
    pub fn version(&self) -> &ServerVersion {
        &self.version
    }
}

// ── Site ─────────────────────────────────────────────────────────

/// Handle to one remote cluster.
///
/// Cheaply cloneable via `Arc<SiteInner>`; clones are the same instance.
/// Created uninitialized: call [`init()`](Self::init) or
/// [`ensure_ready()`](Self::ensure_ready) to connect and warm the caches.
#[derive(Clone)]
pub struct Site {
    inner: Arc<SiteInner>,
}

struct SiteInner {
    config: SiteConfig,
    id: Uuid,
    watch_table: WatchTable,
    cancel: SiteCancel,
    state: watch::Sender<SiteState>,
    connection: OnceCell<Arc<Connection>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    gauge: TaskGauge,
}

impl Drop for SiteInner {
    fn drop(&mut self) {
        // Sources hold no reference back to the site; stop them with it.
        self.cancel.cancel();
    }
}

impl Site {
    /// Create a site watching the default resource kinds. Does NOT connect.
    pub fn new(config: SiteConfig) -> Self {
        Self::with_watch_table(config, WatchTable::default())
    }

    /// Create a site watching the kinds listed in `watch_table`.
    pub fn with_watch_table(config: SiteConfig, watch_table: WatchTable) -> Self {
        let (state, _) = watch::channel(SiteState::Uninitialized);

        Self {
            inner: Arc::new(SiteInner {
                config,
                id: Uuid::new_v4(),
                watch_table,
                cancel: SiteCancel::new(),
                state,
                connection: OnceCell::new(),
                task_handles: Mutex::new(Vec::new()),
                gauge: TaskGauge::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Random per-instance id; differs between two sites with one name.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    pub fn exec_addr(&self) -> &str {
        &self.inner.config.exec_addr
    }

    pub fn state(&self) -> SiteState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SiteState> {
        self.inner.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// `true` if both handles refer to the same instance.
    pub fn same_instance(&self, other: &Site) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of synchronization tasks currently alive for this site.
    pub fn active_sources(&self) -> usize {
        self.inner.gauge.live()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Check the descriptor without touching the network.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.inner.config.master_url.trim().is_empty() {
            return Err(CoreError::Config {
                message: format!("site {}: master URL is empty", self.name()),
            });
        }
        Ok(())
    }

    /// Connect, probe, build the cache layer and wait for the sync barrier.
    ///
    /// Concurrent callers share one bootstrap. Once it has succeeded,
    /// further calls return immediately. A failed attempt stops every
    /// source it started before returning and leaves the site
    /// uninitialized, so a later call may retry.
    pub async fn init(&self) -> Result<(), CoreError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        self.validate()?;
        self.inner
            .connection
            .get_or_try_init(|| self.bootstrap())
            .await?;
        Ok(())
    }

    /// [`init()`](Self::init) bounded by `deadline`.
    ///
    /// On expiry the in-flight attempt is abandoned and its sources are
    /// cancelled.
    pub async fn ensure_ready(&self, deadline: Duration) -> Result<(), CoreError> {
        match tokio::time::timeout(deadline, self.init()).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Sync {
                site: self.name().to_owned(),
                reason: format!("not ready within {deadline:?}"),
            }),
        }
    }

    /// Probe the remote endpoint. Never cached: every call issues a request.
    pub async fn is_healthy(&self) -> bool {
        let Some(connection) = self.inner.connection.get() else {
            return false;
        };
        match connection.clients.cluster().server_version().await {
            Ok(_) => true,
            Err(e) => {
                warn!(site = %self.name(), error = %e, "health probe failed");
                false
            }
        }
    }

    /// Release the site's cancellation token.
    ///
    /// Idempotent and non-blocking. Returns `true` only for the call that
    /// performed the release. Background sources stop on their own; use
    /// [`shutdown()`](Self::shutdown) to also wait for them.
    pub fn close(&self) -> bool {
        let released = self.inner.cancel.cancel();
        if released {
            self.inner.state.send_replace(SiteState::Closed);
            info!(site = %self.name(), "site closed");
        }
        released
    }

    /// Close, then wait for every background source to exit.
    pub async fn shutdown(&self) {
        self.close();
        self.join_sources().await;
    }

    pub(crate) async fn join_sources(&self) {
        let handles = std::mem::take(&mut *self.inner.task_handles.lock().await);
        join_all(handles).await;
    }

    // ── Accessors (non-blocking) ─────────────────────────────────

    /// The post-init connection state; fails fast if not initialized.
    pub fn connection(&self) -> Result<&Arc<Connection>, CoreError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        self.inner
            .connection
            .get()
            .ok_or_else(|| CoreError::NotReady {
                name: self.name().to_owned(),
            })
    }

    pub fn clients(&self) -> Result<&SiteClients, CoreError> {
        self.connection().map(|c| &c.clients)
    }

    pub fn cache(&self) -> Result<Arc<CacheLayer>, CoreError> {
        self.connection().map(|c| Arc::clone(&c.cache))
    }

    // ── Bootstrap ────────────────────────────────────────────────

    async fn bootstrap(&self) -> Result<Arc<Connection>, CoreError> {
        let inner = &*self.inner;
        let config = &inner.config;

        // A close that lands between the caller's check and the cell claim.
        if self.is_closed() {
            return Err(self.closed_error());
        }

        inner.state.send_if_modified(|state| {
            let from_idle = *state == SiteState::Uninitialized;
            if from_idle {
                *state = SiteState::Initializing;
            }
            from_idle
        });
        let attempt = Attempt::new(inner);
        info!(site = %config.name, master = %config.master_url, "initializing site");

        let cluster = ClusterClient::new(
            &config.master_url,
            &config.credential,
            &build_transport(config),
        )
        .map_err(|e| self.connection_error(&e))?;

        let version = cluster
            .server_version()
            .await
            .map_err(|e| self.connection_error(&e))?;
        debug!(site = %config.name, version = %version.git_version, "identity probe succeeded");

        let (cache, sources) = CacheLayer::build(
            &config.name,
            &cluster,
            &inner.watch_table,
            config.cache.resync_interval,
        );

        let mut handles = Vec::with_capacity(sources.len());
        for source in sources {
            let guard = inner.gauge.enter();
            let cancel = attempt.token.clone();
            handles.push(tokio::spawn(async move {
                let _guard = guard;
                source.run(cancel).await;
            }));
        }

        let barrier = self.await_barrier(&cache, &attempt.token).await;
        let outcome = match barrier {
            Ok(()) if self.is_closed() => Err(self.closed_error()),
            other => other,
        };
        if let Err(err) = outcome {
            attempt.token.cancel();
            join_all(handles).await;
            warn!(site = %config.name, error = %err, "site initialization failed");
            return Err(err);
        }

        inner.task_handles.lock().await.extend(handles);
        attempt.complete();
        inner.state.send_if_modified(|state| {
            let from_init = *state == SiteState::Initializing;
            if from_init {
                *state = SiteState::Ready;
            }
            from_init
        });
        info!(
            site = %config.name,
            kinds = inner.watch_table.specs().len(),
            "site ready"
        );

        Ok(Arc::new(Connection {
            clients: SiteClients::new(cluster),
            cache: Arc::new(cache),
            version,
        }))
    }

    /// Wait for every reader to sync, the attempt token, or the sync timeout.
    async fn await_barrier(
        &self,
        cache: &CacheLayer,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        let timeout = self.inner.config.cache.sync_timeout;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(self.sync_error("cancelled while waiting for cache sync".into())),
            result = tokio::time::timeout(timeout, cache.wait_for_sync()) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(kind)) => Err(self.sync_error(format!("source for {kind} stopped before syncing"))),
                Err(_) => Err(self.sync_error(format!("caches not synced within {timeout:?}"))),
            },
        }
    }

    fn connection_error(&self, err: &fleet_api::Error) -> CoreError {
        CoreError::Connection {
            site: self.name().to_owned(),
            reason: err.to_string(),
        }
    }

    fn sync_error(&self, reason: String) -> CoreError {
        CoreError::Sync {
            site: self.name().to_owned(),
            reason,
        }
    }

    fn closed_error(&self) -> CoreError {
        CoreError::SiteClosed {
            name: self.name().to_owned(),
        }
    }
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site")
            .field("name", &self.name())
            .field("id", &self.inner.id)
            .field("master_url", &self.inner.config.master_url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Attempt guard ────────────────────────────────────────────────

/// One initialization attempt. Unless completed, dropping it cancels the
/// attempt's sources and returns the site to `Uninitialized`; this also
/// covers an attempt abandoned by a caller deadline.
struct Attempt<'a> {
    inner: &'a SiteInner,
    token: CancellationToken,
    completed: bool,
}

impl<'a> Attempt<'a> {
    fn new(inner: &'a SiteInner) -> Self {
        Self {
            inner,
            token: inner.cancel.child_token(),
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        self.token.cancel();
        self.inner.state.send_if_modified(|state| {
            let rollback = *state == SiteState::Initializing;
            if rollback {
                *state = SiteState::Uninitialized;
            }
            rollback
        });
    }
}

// ── Helpers ──────────────────────────────────────────────────────

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "sync source task ended abnormally");
        }
    }
}

fn build_transport(config: &SiteConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
