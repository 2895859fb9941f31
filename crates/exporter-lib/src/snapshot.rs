//! Cycle snapshots and their conversion to samples

use crate::classifier::ClusterState;
use crate::collector::{Aggregate, ClusterReport, Totals};
use crate::models::ControllerIdentity;
use crate::registry::{labels, names};
use serde::Serialize;

/// How a collection cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Authenticated and fetched the inventory
    Complete,
    AuthFailed,
    InventoryFailed,
    /// The per-cycle budget ran out before the controller phase finished
    TimedOut,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Complete => "complete",
            CycleOutcome::AuthFailed => "auth_failed",
            CycleOutcome::InventoryFailed => "inventory_failed",
            CycleOutcome::TimedOut => "timed_out",
        }
    }
}

/// Everything one cycle observed. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSnapshot {
    pub outcome: CycleOutcome,
    /// Present once authentication succeeded
    pub identity: Option<ControllerIdentity>,
    pub clusters: Vec<ClusterReport>,
    /// Present only on complete cycles
    pub totals: Option<Totals>,
    pub coredumps: u64,
}

impl CycleSnapshot {
    pub fn complete(identity: ControllerIdentity, aggregate: Aggregate, coredumps: u64) -> Self {
        Self {
            outcome: CycleOutcome::Complete,
            identity: Some(identity),
            clusters: aggregate.clusters,
            totals: Some(aggregate.totals),
            coredumps,
        }
    }

    pub fn auth_failed(coredumps: u64) -> Self {
        Self::minimal(CycleOutcome::AuthFailed, None, coredumps)
    }

    pub fn inventory_failed(identity: ControllerIdentity, coredumps: u64) -> Self {
        Self::minimal(CycleOutcome::InventoryFailed, Some(identity), coredumps)
    }

    pub fn timed_out(coredumps: u64) -> Self {
        Self::minimal(CycleOutcome::TimedOut, None, coredumps)
    }

    fn minimal(
        outcome: CycleOutcome,
        identity: Option<ControllerIdentity>,
        coredumps: u64,
    ) -> Self {
        Self {
            outcome,
            identity,
            clusters: Vec::new(),
            totals: None,
            coredumps,
        }
    }

    /// Liveness flag exported as `cmon_up`
    pub fn up(&self) -> bool {
        self.outcome == CycleOutcome::Complete
    }
}

/// A single exported value
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Metric name without namespace
    pub name: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl Sample {
    pub fn new(name: &'static str, labels: Vec<(&'static str, String)>, value: f64) -> Self {
        Self {
            name,
            labels,
            value,
        }
    }

    /// Value of a label, if set
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(label, _)| *label == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Convert a snapshot into samples
///
/// Never fails; a failed cycle yields just `up` and the coredump gauge.
pub fn emit(snapshot: &CycleSnapshot) -> Vec<Sample> {
    let (controller_id, version) = match &snapshot.identity {
        Some(identity) => (
            identity.controller_id.clone(),
            identity.server_version.clone(),
        ),
        None => (String::new(), String::new()),
    };

    let mut samples = vec![Sample::new(
        names::UP,
        vec![
            (labels::CMON_VERSION, version),
            (labels::CONTROLLER_ID, controller_id.clone()),
        ],
        bool_value(snapshot.up()),
    )];

    if snapshot.up() {
        for cluster in &snapshot.clusters {
            emit_cluster(&mut samples, cluster, &controller_id);
        }

        if let Some(totals) = &snapshot.totals {
            emit_totals(&mut samples, totals, &controller_id);
        }
    }

    samples.push(Sample::new(
        names::COREDUMP_DETECTED_TOTAL,
        vec![],
        snapshot.coredumps as f64,
    ));

    samples
}

fn emit_cluster(samples: &mut Vec<Sample>, cluster: &ClusterReport, controller_id: &str) {
    let cluster_labels = || {
        vec![
            (labels::CLUSTER_NAME, cluster.cluster_name.clone()),
            (labels::CLUSTER_ID, cluster.cluster_id.to_string()),
            (labels::CONTROLLER_ID, controller_id.to_string()),
        ]
    };

    samples.push(Sample::new(
        names::CLUSTER_UP,
        cluster_labels(),
        bool_value(cluster.state == ClusterState::Started),
    ));

    // A started cluster reports explicit zeros; other states only report
    // the indicator that is actually true.
    let (failure, degraded) = match cluster.state {
        ClusterState::Started => (Some(0.0), Some(0.0)),
        ClusterState::Failed => (Some(1.0), None),
        ClusterState::Degraded => (None, Some(1.0)),
        _ => (None, None),
    };
    if let Some(value) = failure {
        samples.push(Sample::new(names::CLUSTER_FAILURE, cluster_labels(), value));
    }
    if let Some(value) = degraded {
        samples.push(Sample::new(names::CLUSTER_DEGRADED, cluster_labels(), value));
    }

    let alarms = &cluster.alarms;
    samples.push(Sample::new(
        names::CLUSTER_BACKUP_FAILED,
        cluster_labels(),
        alarms.backup_failed as f64,
    ));
    samples.push(Sample::new(
        names::CLUSTER_BACKUP_UPLOAD_FAILED,
        cluster_labels(),
        alarms.backup_upload_failed as f64,
    ));
    samples.push(Sample::new(
        names::CLUSTER_FAILED_INIT,
        cluster_labels(),
        alarms.failed_init as f64,
    ));
}

fn emit_totals(samples: &mut Vec<Sample>, totals: &Totals, controller_id: &str) {
    let buckets = [
        (names::CLUSTER_TOTAL, totals.clusters),
        (names::CLUSTER_STARTED_TOTAL, totals.started),
        (names::CLUSTER_FAILED_TOTAL, totals.failed),
        (names::CLUSTER_DEGRADED_TOTAL, totals.degraded),
        (names::CLUSTER_STOPPED_TOTAL, totals.stopped),
        (names::CLUSTER_UNKNOWN_TOTAL, totals.unknown),
        (names::ALARMS_CRITICAL_TOTAL, totals.alarms.critical),
        (names::ALARMS_BACKUP_FAILED_TOTAL, totals.alarms.backup_failed),
        (
            names::ALARMS_BACKUP_UPLOAD_FAILED_TOTAL,
            totals.alarms.backup_upload_failed,
        ),
        (names::CLUSTER_FAILED_INIT_TOTAL, totals.alarms.failed_init),
    ];

    for (name, value) in buckets {
        samples.push(Sample::new(
            name,
            vec![(labels::CONTROLLER_ID, controller_id.to_string())],
            value as f64,
        ));
    }
}

fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}
