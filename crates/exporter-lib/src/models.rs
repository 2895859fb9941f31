//! Core data models for the exporter

use serde::{Deserialize, Serialize};

/// Cluster entry from the controller inventory, state still unclassified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster_id: u64,
    pub cluster_name: String,
    pub state: String,
}

/// Alarm raised by the controller for one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub cluster_id: u64,
    pub severity: String,
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Who answered the cycle: stable controller id and reported version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerIdentity {
    pub controller_id: String,
    pub server_version: String,
}

impl ControllerIdentity {
    pub fn new(controller_id: impl Into<String>, server_version: impl Into<String>) -> Self {
        Self {
            controller_id: controller_id.into(),
            server_version: server_version.into(),
        }
    }
}
