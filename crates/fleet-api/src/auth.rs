use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Reference to the credential used to authenticate against a cluster.
///
/// Only the reference is stored in site configuration; the secret itself is
/// read when the connection is built, so rotated tokens are picked up on the
/// next initialization.
#[derive(Debug, Clone, Default)]
pub enum Credential {
    /// Anonymous access (test clusters, local proxies).
    #[default]
    None,
    /// Bearer token held in memory.
    Token(SecretString),
    /// Bearer token read from a file (service-account token mounts).
    TokenFile(PathBuf),
    /// Bearer token read from an environment variable.
    Env(String),
}

impl Credential {
    /// Resolve the reference into a bearer token.
    ///
    /// `Ok(None)` means anonymous access. A reference that points at
    /// nothing (missing file, unset variable, empty value) is an error
    /// rather than a silent downgrade to anonymous.
    pub fn resolve(&self) -> Result<Option<SecretString>, Error> {
        let raw = match self {
            Self::None => return Ok(None),
            Self::Token(token) => token.expose_secret().to_owned(),
            Self::TokenFile(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::Credential {
                    message: format!("failed to read token file {}: {e}", path.display()),
                }
            })?,
            Self::Env(var) => std::env::var(var).map_err(|_| Error::Credential {
                message: format!("environment variable {var} is not set"),
            })?,
        };

        let token = raw.trim();
        if token.is_empty() {
            return Err(Error::Credential {
                message: "credential resolved to an empty token".into(),
            });
        }
        Ok(Some(SecretString::from(token.to_owned())))
    }
}

/// API group serving one resource domain of a remote cluster.
///
/// Determines the URL prefix that the domain's typed client is rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiGroup {
    /// Core compute API: pods and nodes.
    Compute,
    /// Database workload units.
    WorkloadUnit,
    /// Networks and network claims.
    Network,
    /// Storage systems (SAN / local pools).
    Storage,
    /// Host inventory.
    HostInventory,
    /// Host volume paths.
    VolumePath,
    /// Monitoring targets.
    Monitoring,
}

impl ApiGroup {
    pub const ALL: [Self; 7] = [
        Self::Compute,
        Self::WorkloadUnit,
        Self::Network,
        Self::Storage,
        Self::HostInventory,
        Self::VolumePath,
        Self::Monitoring,
    ];

    /// Path prefix of this group, relative to the master URL.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Compute => "/api/v1",
            Self::WorkloadUnit => "/apis/units.fleet.io/v1",
            Self::Network => "/apis/networking.fleet.io/v1",
            Self::Storage => "/apis/storage.fleet.io/v1",
            Self::HostInventory => "/apis/hosts.fleet.io/v1",
            Self::VolumePath => "/apis/volumepath.fleet.io/v1",
            Self::Monitoring => "/apis/monitoring.fleet.io/v1",
        }
    }

    /// Short human-readable name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::WorkloadUnit => "workload-unit",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::HostInventory => "host",
            Self::VolumePath => "volume-path",
            Self::Monitoring => "monitoring",
        }
    }
}

impl std::fmt::Display for ApiGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
