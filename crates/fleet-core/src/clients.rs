// ── Typed clients of one site ──

use fleet_api::{ApiGroup, ClusterClient, GroupClient, ResourceApi};

/// One typed client per resource domain, all sharing the site's
/// connection descriptor.
#[derive(Debug, Clone)]
pub struct SiteClients {
    cluster: ClusterClient,
    compute: GroupClient,
    units: GroupClient,
    network: GroupClient,
    storage: GroupClient,
    hosts: GroupClient,
    volume_paths: GroupClient,
    monitoring: GroupClient,
}

impl SiteClients {
    pub(crate) fn new(cluster: ClusterClient) -> Self {
        Self {
            compute: cluster.group(ApiGroup::Compute),
            units: cluster.group(ApiGroup::WorkloadUnit),
            network: cluster.group(ApiGroup::Network),
            storage: cluster.group(ApiGroup::Storage),
            hosts: cluster.group(ApiGroup::HostInventory),
            volume_paths: cluster.group(ApiGroup::VolumePath),
            monitoring: cluster.group(ApiGroup::Monitoring),
            cluster,
        }
    }

    /// The connection descriptor itself.
    pub fn cluster(&self) -> &ClusterClient {
        &self.cluster
    }

    pub fn compute(&self) -> &GroupClient {
        &self.compute
    }

    pub fn units(&self) -> &GroupClient {
        &self.units
    }

    pub fn network(&self) -> &GroupClient {
        &self.network
    }

    pub fn storage(&self) -> &GroupClient {
        &self.storage
    }

    pub fn hosts(&self) -> &GroupClient {
        &self.hosts
    }

    pub fn volume_paths(&self) -> &GroupClient {
        &self.volume_paths
    }

    pub fn monitoring(&self) -> &GroupClient {
        &self.monitoring
    }

    // ── Resource shortcuts used by the registry passthroughs ────────

    pub fn host_api(&self) -> ResourceApi {
        self.hosts.resource("hosts")
    }

    pub fn storage_system_api(&self) -> ResourceApi {
        self.storage.resource("storagesystems")
    }

    pub fn network_api(&self) -> ResourceApi {
        self.network.resource("networks")
    }

    pub fn network_claim_api(&self) -> ResourceApi {
        self.network.resource("networkclaims")
    }

    pub fn unit_api(&self) -> ResourceApi {
        self.units.resource("units")
    }
}
