// ── Site registry ──
//
// Thread-safe name → Site map. Adding a site initializes and health-checks
// it before it becomes visible; removal closes it.

use std::sync::Arc;

use fleet_api::ResourceApi;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::CacheLayer;
use crate::error::CoreError;
use crate::site::Site;

/// Registry of initialized sites, keyed by name.
///
/// Every method is safe to call from concurrent tasks. Insertion order is
/// preserved for [`list_sites()`](Self::list_sites).
#[derive(Debug, Default)]
pub struct Registry {
    sites: RwLock<IndexMap<String, Site>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize `site`, verify it is healthy, then register it.
    ///
    /// A name that is already registered is rejected with
    /// [`CoreError::SiteExists`]; the registered instance is never replaced.
    /// On any failure nothing is inserted and the candidate has no running
    /// sources.
    pub async fn add_site(&self, site: Site) -> Result<Site, CoreError> {
        site.validate()?;

        let name = site.name().to_owned();
        if self.sites.read().await.contains_key(&name) {
            return Err(CoreError::SiteExists { name });
        }

        site.init().await?;

        if !site.is_healthy().await {
            site.shutdown().await;
            return Err(CoreError::Unhealthy { name });
        }

        {
            let mut sites = self.sites.write().await;
            match sites.get(&name) {
                None => {
                    sites.insert(name.clone(), site.clone());
                    info!(site = %name, id = %site.id(), "site registered");
                    return Ok(site);
                }
                // The registered entry shares this site's state; leave it running.
                Some(registered) if registered.same_instance(&site) => {
                    return Err(CoreError::SiteExists { name });
                }
                Some(_) => {}
            }
        }

        debug!(site = %name, "lost registration race, discarding candidate");
        site.shutdown().await;
        Err(CoreError::SiteExists { name })
    }

    /// Close and unregister `name`, then wait for its sources to stop.
    pub async fn remove_site(&self, name: &str) -> Result<(), CoreError> {
        let site = {
            let mut sites = self.sites.write().await;
            let Some(site) = sites.shift_remove(name) else {
                return Err(not_found(name));
            };
            site.close();
            site
        };

        site.join_sources().await;
        info!(site = %name, "site removed");
        Ok(())
    }

    pub async fn get_site(&self, name: &str) -> Result<Site, CoreError> {
        self.sites
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    /// Point-in-time snapshot of every registered site.
    pub async fn list_sites(&self) -> Vec<Site> {
        self.sites.read().await.values().cloned().collect()
    }

    pub async fn site_names(&self) -> Vec<String> {
        self.sites.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sites.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sites.read().await.is_empty()
    }

    // ── Resource passthroughs ────────────────────────────────────

    pub async fn hosts(&self, site: &str) -> Result<ResourceApi, CoreError> {
        let site = self.get_site(site).await?;
        Ok(site.clients()?.host_api())
    }

    pub async fn storage_systems(&self, site: &str) -> Result<ResourceApi, CoreError> {
        let site = self.get_site(site).await?;
        Ok(site.clients()?.storage_system_api())
    }

    pub async fn networks(&self, site: &str) -> Result<ResourceApi, CoreError> {
        let site = self.get_site(site).await?;
        Ok(site.clients()?.network_api())
    }

    pub async fn network_claims(&self, site: &str) -> Result<ResourceApi, CoreError> {
        let site = self.get_site(site).await?;
        Ok(site.clients()?.network_claim_api())
    }

    pub async fn units(&self, site: &str) -> Result<ResourceApi, CoreError> {
        let site = self.get_site(site).await?;
        Ok(site.clients()?.unit_api())
    }

    /// The cache layer of `site`.
    pub async fn cache(&self, site: &str) -> Result<Arc<CacheLayer>, CoreError> {
        self.get_site(site).await?.cache()
    }

    /// Drain the registry, closing every site and waiting for its sources.
    pub async fn shutdown(&self) {
        let drained: Vec<Site> = {
            let mut sites = self.sites.write().await;
            sites.drain(..).map(|(_, site)| site).collect()
        };

        for site in &drained {
            site.close();
        }
        for site in &drained {
            site.join_sources().await;
        }

        debug!(count = drained.len(), "registry shut down");
    }
}

fn not_found(name: &str) -> CoreError {
    CoreError::NotFound {
        name: name.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let registry = Registry::new();
        let err = registry.get_site("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Site not found: nope");
        assert!(registry.list_sites().await.is_empty());
    }

    #[tokio::test]
    async fn remove_unknown_is_not_found() {
        let registry = Registry::new();
        assert!(registry.remove_site("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn empty_master_url_leaves_registry_unchanged() {
        let registry = Registry::new();
        let site = Site::new(SiteConfig::new("s1", "10.0.0.1", ""));
        let err = registry.add_site(site).await.unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }), "got: {err:?}");
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn passthroughs_name_the_missing_site() {
        let registry = Registry::new();
        let err = registry.hosts("ghost").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { ref name } if name == "ghost"));
        assert!(registry.cache("ghost").await.unwrap_err().is_not_found());
    }
}
