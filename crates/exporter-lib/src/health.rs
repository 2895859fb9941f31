//! Health tracking for the exporter
//!
//! The last collection cycle decides the reported health: the controller
//! component follows the cycle outcome, the probe component follows the
//! coredump scan. Readiness flips once the first cycle has finished.

use crate::snapshot::{CycleOutcome, CycleSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Partially working, scrapes still produce data
    Degraded,
    Unhealthy,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const CONTROLLER: &str = "controller";
    pub const COREDUMP_PROBE: &str = "coredump_probe";
}

/// Health registry updated after every cycle
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    cycles_completed: Arc<RwLock<u64>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    /// Fold a finished cycle into component health
    pub async fn record_cycle(&self, snapshot: &CycleSnapshot, probe_error: Option<&str>) {
        let controller = match snapshot.outcome {
            CycleOutcome::Complete => {
                let missing = snapshot.clusters.iter().filter(|c| !c.alarms_fetched).count();
                if missing == 0 {
                    ComponentHealth::healthy()
                } else {
                    ComponentHealth::degraded(format!(
                        "alarms unavailable for {} cluster(s)",
                        missing
                    ))
                }
            }
            CycleOutcome::AuthFailed => ComponentHealth::unhealthy("authentication failed"),
            CycleOutcome::InventoryFailed => {
                ComponentHealth::unhealthy("cluster inventory unavailable")
            }
            CycleOutcome::TimedOut => ComponentHealth::unhealthy("collection cycle timed out"),
        };
        self.update(components::CONTROLLER, controller).await;

        let probe = match probe_error {
            None => ComponentHealth::healthy(),
            Some(error) => ComponentHealth::degraded(error),
        };
        self.update(components::COREDUMP_PROBE, probe).await;

        *self.cycles_completed.write().await += 1;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once at least one cycle has finished
    pub async fn readiness(&self) -> ReadinessResponse {
        if *self.cycles_completed.read().await == 0 {
            ReadinessResponse {
                ready: false,
                reason: Some("No collection cycle completed yet".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}
