// ── Watched resource kinds ──
//
// The bootstrap sequence is driven by a table of (kind -> source) entries,
// so a new kind is one more table row rather than a change to `Site`.

use std::fmt;

use fleet_api::ApiGroup;

/// Name of a cached resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKind(&'static str);

impl CacheKind {
    pub const UNIT: Self = Self("unit");
    pub const POD: Self = Self("pod");
    pub const NETWORK_CLAIM: Self = Self("network-claim");
    pub const NODE: Self = Self("node");
    pub const VOLUME_PATH: Self = Self("volume-path");

    /// Kind outside the built-in set.
    pub const fn custom(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Where one kind is listed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub kind: CacheKind,
    /// Typed client (API group) whose shared source serves this kind.
    pub group: ApiGroup,
    pub plural: String,
    /// Restrict the watch to one namespace; `None` watches all namespaces.
    pub namespace: Option<String>,
}

impl WatchSpec {
    pub fn new(kind: CacheKind, group: ApiGroup, plural: impl Into<String>) -> Self {
        Self {
            kind,
            group,
            plural: plural.into(),
            namespace: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Ordered set of watched kinds, one entry per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTable {
    specs: Vec<WatchSpec>,
}

impl Default for WatchTable {
    /// Workload units, pods, network claims, nodes and volume paths.
    fn default() -> Self {
        Self::empty()
            .with(WatchSpec::new(CacheKind::UNIT, ApiGroup::WorkloadUnit, "units"))
            .with(WatchSpec::new(CacheKind::POD, ApiGroup::Compute, "pods"))
            .with(WatchSpec::new(
                CacheKind::NETWORK_CLAIM,
                ApiGroup::Network,
                "networkclaims",
            ))
            .with(WatchSpec::new(CacheKind::NODE, ApiGroup::Compute, "nodes"))
            .with(WatchSpec::new(
                CacheKind::VOLUME_PATH,
                ApiGroup::VolumePath,
                "volumepaths",
            ))
    }
}

impl WatchTable {
    pub fn empty() -> Self {
        Self { specs: Vec::new() }
    }

    /// Add `spec`, replacing an existing entry for the same kind.
    pub fn with(mut self, spec: WatchSpec) -> Self {
        match self.specs.iter_mut().find(|s| s.kind == spec.kind) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
        self
    }

    pub fn specs(&self) -> &[WatchSpec] {
        &self.specs
    }

    pub fn kinds(&self) -> impl Iterator<Item = CacheKind> + '_ {
        self.specs.iter().map(|s| s.kind)
    }

    /// Distinct API groups in first-use order; one shared source each.
    pub(crate) fn groups(&self) -> Vec<ApiGroup> {
        let mut groups = Vec::new();
        for spec in &self.specs {
            if !groups.contains(&spec.group) {
                groups.push(spec.group);
            }
        }
        groups
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
