//! Site registry and per-site lifecycle for multi-cluster management.
//!
//! This crate sits between `fleet-api` and its consumers (the `fleet` CLI,
//! long-running services):
//!
//! - **[`Registry`]**: Concurrency-safe name → [`Site`] map. A site becomes
//!   visible only after it initialized and passed a health probe; removal
//!   closes it and joins its background sources.
//!
//! - **[`Site`]**: One remote cluster. [`init()`](Site::init) builds the
//!   connection descriptor and typed clients, probes the cluster identity,
//!   starts one shared synchronization source per API group and waits for
//!   every cache to sync. Accessors fail fast until then.
//!
//! - **[`CacheLayer`]**: Watch-backed readers per resource kind, driven by a
//!   [`WatchTable`]. Readers refuse to answer before their first listing.
//!
//! - **[`SiteCancel`]**: Per-site cancellation token with an idempotent
//!   release that reports which caller performed it.

pub mod cache;
pub mod cancel;
pub mod clients;
pub mod config;
pub mod error;
pub mod registry;
pub mod site;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{
    CacheKind, CacheLayer, CacheReader, ObjectStream, ObjectWatchStream, WatchSpec, WatchTable,
};
pub use cancel::SiteCancel;
pub use clients::SiteClients;
pub use config::{CacheConfig, Credential, SiteConfig, TlsVerification};
pub use error::CoreError;
pub use registry::Registry;
pub use site::{Connection, Site, SiteState};

pub use fleet_api::{ApiGroup, ObjectMeta, RemoteObject, ResourceApi, ServerVersion};
