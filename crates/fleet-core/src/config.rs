// ── Runtime site configuration ──
//
// These types describe *how* to connect to one remote cluster.
// They carry a credential reference and tuning knobs, but never touch disk.
// The surrounding application (or `fleet-config`) builds a `SiteConfig`
// and hands it in.

use std::path::PathBuf;
use std::time::Duration;

pub use fleet_api::Credential;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed lab clusters).
    DangerAcceptInvalid,
}

/// Cache warm-up and resync tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Period between full resyncs of every watched kind.
    pub resync_interval: Duration,
    /// Upper bound on the initial sync barrier.
    pub sync_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(30),
            sync_timeout: Duration::from_secs(60),
        }
    }
}

/// Identity and connection settings for one site.
///
/// Immutable once handed to a [`Site`](crate::Site).
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Unique registry key.
    pub name: String,
    /// Address used by provisioning workflows to execute on the site.
    pub exec_addr: String,
    /// Master endpoint of the remote cluster API. Must not be empty.
    pub master_url: String,
    /// How to authenticate against the master endpoint.
    pub credential: Credential,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    pub cache: CacheConfig,
}

impl SiteConfig {
    pub fn new(
        name: impl Into<String>,
        exec_addr: impl Into<String>,
        master_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            exec_addr: exec_addr.into(),
            master_url: master_url.into(),
            credential: Credential::None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            cache: CacheConfig::default(),
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_tls(mut self, tls: TlsVerification) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
