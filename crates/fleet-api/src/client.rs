// Cluster API HTTP client
//
// Wraps `reqwest::Client` with master-URL construction, bearer auth and
// response decoding. Resource-level operations live in `resource.rs` and
// reach back into the request helpers defined here.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::auth::{ApiGroup, Credential};
use crate::error::Error;
use crate::resource::{GroupClient, ResourceApi};
use crate::transport::TransportConfig;

/// Identity payload returned by `GET /version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerVersion {
    #[serde(default)]
    pub git_version: String,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Error body shape returned by the cluster API on failures.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Connection descriptor for one remote cluster.
///
/// Cheap to clone: the underlying `reqwest::Client` is reference counted,
/// so every typed client handed out by [`resource()`](Self::resource)
/// shares one connection pool and one set of default headers.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    http: reqwest::Client,
    master: Url,
}

impl ClusterClient {
    /// Build a client for `master_url`, resolving `credential` into an
    /// `Authorization: Bearer` default header.
    pub fn new(
        master_url: &str,
        credential: &Credential,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let master = Self::normalize_master_url(master_url)?;

        let mut headers = HeaderMap::new();
        if let Some(token) = credential.resolve()? {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| Error::Credential {
                    message: format!("invalid bearer token header value: {e}"),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self { http, master })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(master_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let master = Self::normalize_master_url(master_url)?;
        Ok(Self { http, master })
    }

    fn normalize_master_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&path);
        Ok(url)
    }

    /// The master endpoint this client talks to.
    pub fn master_url(&self) -> &Url {
        &self.master
    }

    /// Typed client for one API group.
    pub fn group(&self, group: ApiGroup) -> GroupClient {
        GroupClient::new(self.clone(), group)
    }

    /// Typed client for one resource collection of an API group.
    pub fn resource(&self, group: ApiGroup, plural: impl Into<String>) -> ResourceApi {
        ResourceApi::new(self.clone(), group, plural.into())
    }

    /// Cheap identity probe: `GET /version`.
    pub async fn server_version(&self) -> Result<ServerVersion, Error> {
        let url = self.url("/version")?;
        self.get(url).await
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Append an absolute API path (e.g. `"/api/v1/pods"`) to the master URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.master.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {url}");
        let resp = self.http.post(url).json(body).send().await?;
        Self::handle_response(resp).await
    }

    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {url}");
        let resp = self.http.delete(url).send().await?;
        Self::check_status(resp).await.map(|_| ())
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp)
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}
