//! Configuration for the fleet tools.
//!
//! TOML site definitions merged with `FLEET_` environment overrides,
//! credential resolution (env + token file + keyring + plaintext), and
//! translation to `fleet_core::SiteConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleet_core::{CacheConfig, Credential, SiteConfig, TlsVerification};

/// Keyring service under which site tokens are stored.
pub const KEYRING_SERVICE: &str = "fleet";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("site '{site}' is not defined in the configuration")]
    UnknownSite { site: String },

    #[error("no credentials found for site '{site}' (checked {checked})")]
    NoCredentials { site: String, checked: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Site definitions keyed by site name.
    #[serde(default)]
    pub sites: BTreeMap<String, SiteEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between cache resyncs.
    #[serde(default = "default_resync_interval")]
    pub resync_interval: u64,

    /// Upper bound in seconds on the initial cache sync.
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout: u64,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            resync_interval: default_resync_interval(),
            sync_timeout: default_sync_timeout(),
            insecure: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_resync_interval() -> u64 {
    30
}
fn default_sync_timeout() -> u64 {
    60
}

/// One `[sites.NAME]` table.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SiteEntry {
    /// Master endpoint of the cluster API (e.g., "https://10.0.0.1:6443").
    pub master_url: String,

    /// Execution address; defaults to the master URL's host.
    pub exec_addr: Option<String>,

    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,

    /// File holding the bearer token.
    pub token_file: Option<PathBuf>,

    /// Look the token up in the OS keyring.
    #[serde(default)]
    pub keyring: bool,

    /// Plaintext bearer token (prefer any of the above).
    pub token: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override the default insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override the default timeout.
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "fleet", "fleet").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("fleet");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the configuration from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the configuration from `path` + environment. A missing file yields
/// the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FLEET_").split("__"));

    Ok(figment.extract()?)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the credential chain of one site entry.
///
/// Precedence: `token_env` (if the variable is set), `token_file`, the OS
/// keyring (if enabled), plaintext `token`. An entry with no credential
/// source configured yields [`Credential::None`].
pub fn resolve_credential(entry: &SiteEntry, site: &str) -> Result<Credential, ConfigError> {
    let mut checked = Vec::new();

    if let Some(ref var) = entry.token_env {
        if std::env::var_os(var).is_some() {
            return Ok(Credential::Env(var.clone()));
        }
        checked.push(format!("${var}"));
    }

    if let Some(ref path) = entry.token_file {
        return Ok(Credential::TokenFile(path.clone()));
    }

    if entry.keyring {
        if let Some(secret) = keyring_token(site) {
            return Ok(Credential::Token(secret));
        }
        checked.push("keyring".into());
    }

    if let Some(ref token) = entry.token {
        return Ok(Credential::Token(SecretString::from(token.clone())));
    }

    if checked.is_empty() {
        Ok(Credential::None)
    } else {
        Err(ConfigError::NoCredentials {
            site: site.into(),
            checked: checked.join(", "),
        })
    }
}

fn keyring_token(site: &str) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, site).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `SiteConfig` for `name` from its entry and the global defaults.
pub fn site_config(
    name: &str,
    entry: &SiteEntry,
    defaults: &Defaults,
) -> Result<SiteConfig, ConfigError> {
    let field = |f: &str| format!("sites.{name}.{f}");

    let master = entry.master_url.trim();
    if master.is_empty() {
        return Err(ConfigError::Validation {
            field: field("master_url"),
            reason: "must not be empty".into(),
        });
    }
    let url: url::Url = master.parse().map_err(|_| ConfigError::Validation {
        field: field("master_url"),
        reason: format!("invalid URL: {master}"),
    })?;

    let exec_addr = match (&entry.exec_addr, url.host_str()) {
        (Some(addr), _) => addr.clone(),
        (None, Some(host)) => host.to_owned(),
        (None, None) => {
            return Err(ConfigError::Validation {
                field: field("exec_addr"),
                reason: "required when master_url has no host".into(),
            });
        }
    };

    let credential = resolve_credential(entry, name)?;

    let tls = if entry.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = entry.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let cache = CacheConfig {
        resync_interval: Duration::from_secs(defaults.resync_interval.max(1)),
        sync_timeout: Duration::from_secs(defaults.sync_timeout),
    };

    Ok(SiteConfig::new(name, exec_addr, master)
        .with_credential(credential)
        .with_tls(tls)
        .with_timeout(Duration::from_secs(entry.timeout.unwrap_or(defaults.timeout)))
        .with_cache(cache))
}

impl Config {
    /// `SiteConfig` for one named site.
    pub fn site(&self, name: &str) -> Result<SiteConfig, ConfigError> {
        let entry = self.sites.get(name).ok_or_else(|| ConfigError::UnknownSite {
            site: name.into(),
        })?;
        site_config(name, entry, &self.defaults)
    }

    /// `SiteConfig`s for every defined site, in name order.
    pub fn site_configs(&self) -> Result<Vec<SiteConfig>, ConfigError> {
        self.sites
            .iter()
            .map(|(name, entry)| site_config(name, entry, &self.defaults))
            .collect()
    }

    pub fn site_names(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }
}
