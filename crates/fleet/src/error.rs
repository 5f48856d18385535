//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use fleet_config::ConfigError;
use fleet_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const SYNC: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to site {site}")]
    #[diagnostic(
        code(fleet::connection_failed),
        help(
            "Check that the master endpoint is reachable and the token is valid.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { site: String, reason: String },

    #[error("Caches of site {site} did not sync")]
    #[diagnostic(
        code(fleet::sync_failed),
        help(
            "The cluster answered but listing its resources failed or was too slow.\n\
             Reason: {reason}\n\
             Raise defaults.sync_timeout in the configuration if the cluster is large."
        )
    )]
    SyncFailed { site: String, reason: String },

    #[error("Site {name} failed its health check")]
    #[diagnostic(code(fleet::unhealthy))]
    Unhealthy { name: String },

    #[error("{failed} of {total} sites failed their check")]
    #[diagnostic(
        code(fleet::check_failed),
        help("Re-run with -v for per-site connection details.")
    )]
    CheckFailed { failed: usize, total: usize },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No credentials found for site '{site}'")]
    #[diagnostic(
        code(fleet::no_credentials),
        help(
            "Checked: {checked}\n\
             Set the variable, add token_file, or store a token in the keyring\n\
             under service 'fleet', user '{site}'."
        )
    )]
    NoCredentials { site: String, checked: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(fleet::not_found),
        help("Run: fleet {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Site '{name}' is already registered")]
    #[diagnostic(code(fleet::conflict))]
    Conflict { name: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(fleet::api_error))]
    ApiError { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleet::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(fleet::config),
        help("Expected at: {path}")
    )]
    Config { message: String, path: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Unhealthy { .. } => exit_code::CONNECTION,
            Self::SyncFailed { .. } => exit_code::SYNC,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::Config { .. } => exit_code::CONFIG,
            Self::CheckFailed { .. } | Self::ApiError { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Connection { site, reason } => CliError::ConnectionFailed { site, reason },

            CoreError::Sync { site, reason } => CliError::SyncFailed { site, reason },

            CoreError::Unhealthy { name } => CliError::Unhealthy { name },

            CoreError::NotFound { name } => CliError::NotFound {
                resource_type: "site".into(),
                identifier: name,
                list_command: "sites list".into(),
            },

            CoreError::SiteExists { name } => CliError::Conflict { name },

            CoreError::Config { message } => CliError::Validation {
                field: "site".into(),
                reason: message,
            },

            other @ (CoreError::SiteClosed { .. }
            | CoreError::NotReady { .. }
            | CoreError::NotSynced { .. }
            | CoreError::UnknownKind { .. }
            | CoreError::Api { .. }) => CliError::ApiError {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },

            ConfigError::UnknownSite { site } => CliError::NotFound {
                resource_type: "site".into(),
                identifier: site,
                list_command: "sites list".into(),
            },

            ConfigError::NoCredentials { site, checked } => {
                CliError::NoCredentials { site, checked }
            }

            ConfigError::Figment(e) => CliError::Config {
                message: e.to_string(),
                path: fleet_config::config_path().display().to_string(),
            },
        }
    }
}
