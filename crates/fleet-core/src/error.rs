// ── Core error types ──
//
// Lifecycle-level errors from fleet-core. Callers see which phase of a
// site's bootstrap failed, not raw HTTP status codes. The
// `From<fleet_api::Error>` impl covers requests made through typed clients
// after a site is ready.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Bootstrap errors ─────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Cannot connect to site {site}: {reason}")]
    Connection { site: String, reason: String },

    #[error("Cache sync failed for site {site}: {reason}")]
    Sync { site: String, reason: String },

    #[error("Site {name} failed its health check")]
    Unhealthy { name: String },

    // ── Registry errors ──────────────────────────────────────────────
    #[error("Site not found: {name}")]
    NotFound { name: String },

    #[error("Site already registered: {name}")]
    SiteExists { name: String },

    // ── Site state errors ────────────────────────────────────────────
    #[error("Site {name} is closed")]
    SiteClosed { name: String },

    #[error("Site {name} is not initialized")]
    NotReady { name: String },

    #[error("Cache for {kind} has not finished its initial sync")]
    NotSynced { kind: String },

    #[error("No cache registered for resource kind {kind}")]
    UnknownKind { kind: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },
}

impl CoreError {
    /// `true` for an unknown site name: an expected, non-fatal outcome
    /// distinct from transport failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `true` for the errors a caller may resolve by retrying later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Sync { .. } | Self::Unhealthy { .. } | Self::NotSynced { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fleet_api::Error> for CoreError {
    fn from(err: fleet_api::Error) -> Self {
        let status = err.status();
        CoreError::Api {
            message: err.to_string(),
            status,
        }
    }
}
