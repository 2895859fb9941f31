//! CMON RPC v2 client
//!
//! Every call is a `POST {endpoint}/v2/{module}` with a JSON body naming the
//! operation. Replies carry a `request_status` that must be `Ok`. The
//! session cookie set by `authenticateWithPassword` lives in a cookie store
//! owned by the session, so nothing survives past the cycle that created it.

use super::{async_trait, ControllerGateway, ControllerSession};
use crate::error::{AuthError, FetchError};
use crate::models::{Alarm, ClusterInfo, ControllerIdentity};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const MODULE_AUTH: &str = "auth";
const MODULE_CLUSTERS: &str = "clusters";
const MODULE_ALARM: &str = "alarm";

const STATUS_OK: &str = "Ok";

/// Connection settings for a CMON controller
#[derive(Clone)]
pub struct CmonClientConfig {
    /// Controller RPC endpoint (e.g. "https://127.0.0.1:9501")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Timeout applied to each individual request
    pub request_timeout: Duration,
    /// Verify the controller's TLS certificate
    pub tls_verify: bool,
}

impl Default for CmonClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://127.0.0.1:9501".to_string(),
            username: String::new(),
            password: String::new(),
            request_timeout: Duration::from_secs(30),
            tls_verify: false,
        }
    }
}

impl fmt::Debug for CmonClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmonClientConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("tls_verify", &self.tls_verify)
            .finish()
    }
}

/// Gateway to a CMON controller over its RPC v2 API
pub struct CmonClient {
    config: CmonClientConfig,
    base_url: Url,
}

impl CmonClient {
    /// Create a client; fails only when the endpoint is not a valid URL
    pub fn new(config: CmonClientConfig) -> Result<Self, AuthError> {
        let mut base_url = Url::parse(&config.endpoint)
            .map_err(|e| AuthError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(AuthError::InvalidEndpoint(config.endpoint.clone()));
        }

        // Url::join replaces the last path segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { config, base_url })
    }

    /// Configured endpoint
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn module_url(&self, module: &str) -> Result<Url, AuthError> {
        module_url(&self.base_url, module).map_err(|e| AuthError::InvalidEndpoint(e.to_string()))
    }

    fn http_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(self.config.request_timeout)
            .danger_accept_invalid_certs(!self.config.tls_verify)
            .cookie_store(true)
            .build()
    }
}

#[async_trait]
impl ControllerGateway for CmonClient {
    async fn authenticate(&self) -> Result<Arc<dyn ControllerSession>, AuthError> {
        let client = self
            .http_client()
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        let url = self.module_url(MODULE_AUTH)?;

        let response = client
            .post(url)
            .json(&json!({
                "operation": "authenticateWithPassword",
                "user_name": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(format!("HTTP {}", response.status())));
        }

        let server_version = server_version(&response);
        let reply: Value = response
            .json()
            .await
            .map_err(|e| AuthError::Rejected(format!("undecodable reply: {}", e)))?;

        if let Some((status, message)) = failed_status(&reply) {
            return Err(AuthError::Rejected(format!("{}: {}", status, message)));
        }

        let auth: AuthReply = serde_json::from_value(reply)
            .map_err(|e| AuthError::Rejected(format!("undecodable reply: {}", e)))?;

        debug!(
            controller_id = %auth.controller_id,
            server_version = %server_version,
            "Authenticated against controller"
        );

        Ok(Arc::new(CmonSession {
            client,
            base_url: self.base_url.clone(),
            identity: ControllerIdentity::new(auth.controller_id, server_version),
        }))
    }

    async fn ping(&self) -> Result<String, AuthError> {
        let client = self
            .http_client()
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        let url = self.module_url(MODULE_CLUSTERS)?;

        let response = client
            .post(url)
            .json(&json!({ "operation": "ping" }))
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(format!("HTTP {}: {}", status, body.trim()))
    }
}

/// Authenticated CMON session, one per collection cycle
struct CmonSession {
    client: Client,
    base_url: Url,
    identity: ControllerIdentity,
}

impl CmonSession {
    async fn call<T: DeserializeOwned>(
        &self,
        module: &str,
        operation: &'static str,
        body: Value,
    ) -> Result<T, FetchError> {
        let url = module_url(&self.base_url, module).map_err(|e| FetchError::Transport {
            operation,
            message: e.to_string(),
        })?;

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                operation,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                operation,
                status: response.status().as_u16(),
            });
        }

        let reply: Value = response.json().await.map_err(|e| FetchError::Decode {
            operation,
            message: e.to_string(),
        })?;

        if let Some((status, message)) = failed_status(&reply) {
            return Err(FetchError::Rejected {
                operation,
                status,
                message,
            });
        }

        serde_json::from_value(reply).map_err(|e| FetchError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ControllerSession for CmonSession {
    fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, FetchError> {
        let reply: ClustersReply = self
            .call(
                MODULE_CLUSTERS,
                "getAllClusterInfo",
                json!({ "operation": "getAllClusterInfo", "with_hosts": false }),
            )
            .await?;

        Ok(reply
            .clusters
            .into_iter()
            .map(|c| ClusterInfo {
                cluster_id: c.cluster_id,
                cluster_name: c.cluster_name,
                state: c.state,
            })
            .collect())
    }

    async fn list_alarms(&self, cluster_id: u64) -> Result<Vec<Alarm>, FetchError> {
        let reply: AlarmsReply = self
            .call(
                MODULE_ALARM,
                "getAlarms",
                json!({ "operation": "getAlarms", "cluster_id": cluster_id }),
            )
            .await?;

        Ok(reply
            .alarms
            .into_iter()
            .map(|a| Alarm {
                cluster_id: a.cluster_id.unwrap_or(cluster_id),
                severity: a.severity_name,
                type_name: a.type_name,
                title: a.title,
            })
            .collect())
    }
}

fn module_url(base_url: &Url, module: &str) -> Result<Url, url::ParseError> {
    base_url.join(&format!("v2/{}", module))
}

/// Returns (status, error_string) when the reply is not `Ok`
fn failed_status(reply: &Value) -> Option<(String, String)> {
    let status = reply
        .get("request_status")
        .and_then(Value::as_str)
        .unwrap_or("");

    if status == STATUS_OK {
        return None;
    }

    let message = reply
        .get("error_string")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let status = if status.is_empty() {
        "missing request_status".to_string()
    } else {
        status.to_string()
    };

    Some((status, message))
}

/// Version from the `Server: cmon/<version>` header
fn server_version(response: &Response) -> String {
    response
        .headers()
        .get(header::SERVER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("cmon/").unwrap_or(v).trim().to_string())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct AuthReply {
    #[serde(default)]
    controller_id: String,
}

#[derive(Debug, Deserialize)]
struct ClustersReply {
    #[serde(default)]
    clusters: Vec<WireCluster>,
}

#[derive(Debug, Deserialize)]
struct WireCluster {
    cluster_id: u64,
    #[serde(default)]
    cluster_name: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct AlarmsReply {
    #[serde(default)]
    alarms: Vec<WireAlarm>,
}

#[derive(Debug, Deserialize)]
struct WireAlarm {
    #[serde(default)]
    cluster_id: Option<u64>,
    #[serde(default)]
    severity_name: String,
    #[serde(default)]
    type_name: String,
    #[serde(default)]
    title: Option<String>,
}
