//! Upstream controller access
//!
//! The collection engine only talks to the controller through these two
//! traits. [`CmonClient`] implements them over the CMON RPC v2 HTTP API;
//! tests substitute in-memory fakes.

mod cmon;

pub use cmon::{CmonClient, CmonClientConfig};

use crate::error::{AuthError, FetchError};
use crate::models::{Alarm, ClusterInfo, ControllerIdentity};
use std::sync::Arc;

pub use async_trait::async_trait;

/// Entry point to a controller: produces one authenticated session per cycle
#[async_trait]
pub trait ControllerGateway: Send + Sync {
    /// Authenticate and open a fresh session. Called exactly once per cycle.
    async fn authenticate(&self) -> Result<Arc<dyn ControllerSession>, AuthError>;

    /// Unauthenticated reachability check, used for diagnostics only
    async fn ping(&self) -> Result<String, AuthError>;
}

/// Authenticated view of the controller, dropped at the end of the cycle
#[async_trait]
pub trait ControllerSession: Send + Sync {
    /// Identity reported while authenticating
    fn identity(&self) -> &ControllerIdentity;

    /// Fetch the cluster inventory
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, FetchError>;

    /// Fetch the alarm list of a single cluster
    async fn list_alarms(&self, cluster_id: u64) -> Result<Vec<Alarm>, FetchError>;
}
