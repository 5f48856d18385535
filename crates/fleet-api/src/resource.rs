// Typed resource clients
//
// The cluster core treats resource schemas as opaque: an object is its
// metadata (name, namespace, resource version) plus an untyped body.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::ApiGroup;
use crate::client::ClusterClient;
use crate::error::Error;

/// Identifying metadata shared by every remote object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// A single remote resource with an opaque body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub metadata: ObjectMeta,
    /// Everything except `metadata` (`spec`, `status`, `kind`, ...).
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl RemoteObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                ..ObjectMeta::default()
            },
            body: Map::new(),
        }
    }

    /// Cache key: `namespace/name`, or just `name` for cluster-scoped objects.
    pub fn key(&self) -> String {
        match &self.metadata.namespace {
            Some(ns) => format!("{ns}/{}", self.metadata.name),
            None => self.metadata.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// Response of a collection `GET`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<RemoteObject>,
}

/// Typed client for one API group (one resource domain).
///
/// Obtained from [`ClusterClient::group`]; hands out [`ResourceApi`]
/// collection clients that share the group's connection.
#[derive(Debug, Clone)]
pub struct GroupClient {
    client: ClusterClient,
    group: ApiGroup,
}

impl GroupClient {
    pub(crate) fn new(client: ClusterClient, group: ApiGroup) -> Self {
        Self { client, group }
    }

    pub fn group(&self) -> ApiGroup {
        self.group
    }

    /// Collection client for `plural` within this group.
    pub fn resource(&self, plural: impl Into<String>) -> ResourceApi {
        ResourceApi::new(self.client.clone(), self.group, plural.into())
    }
}

/// Client for one resource collection (`{group prefix}/{plural}`).
///
/// Obtained from [`ClusterClient::resource`]. Optionally scoped to a
/// namespace via [`namespaced()`](Self::namespaced).
#[derive(Debug, Clone)]
pub struct ResourceApi {
    client: ClusterClient,
    group: ApiGroup,
    plural: String,
    namespace: Option<String>,
}

impl ResourceApi {
    pub(crate) fn new(client: ClusterClient, group: ApiGroup, plural: String) -> Self {
        Self {
            client,
            group,
            plural,
            namespace: None,
        }
    }

    /// Scope subsequent calls to `namespace`.
    pub fn namespaced(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn group(&self) -> ApiGroup {
        self.group
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// `{prefix}[/namespaces/{ns}]/{plural}`
    fn collection_path(&self) -> String {
        let prefix = self.group.prefix();
        match &self.namespace {
            Some(ns) => format!("{prefix}/namespaces/{ns}/{}", self.plural),
            None => format!("{prefix}/{}", self.plural),
        }
    }

    /// List every object in the collection.
    pub async fn list(&self) -> Result<ObjectList, Error> {
        let url = self.client.url(&self.collection_path())?;
        debug!(group = %self.group, plural = %self.plural, "listing resources");
        self.client.get(url).await
    }

    /// Fetch one object by name.
    pub async fn get(&self, name: &str) -> Result<RemoteObject, Error> {
        let url = self
            .client
            .url(&format!("{}/{name}", self.collection_path()))?;
        self.client.get(url).await
    }

    /// Create an object, returning the server's view of it.
    pub async fn create(&self, object: &RemoteObject) -> Result<RemoteObject, Error> {
        let url = self.client.url(&self.collection_path())?;
        debug!(group = %self.group, plural = %self.plural, name = %object.metadata.name, "creating resource");
        self.client.post(url, object).await
    }

    /// Delete an object by name.
    pub async fn delete(&self, name: &str) -> Result<(), Error> {
        let url = self
            .client
            .url(&format!("{}/{name}", self.collection_path()))?;
        debug!(group = %self.group, plural = %self.plural, name, "deleting resource");
        self.client.delete(url).await
    }
}
