//! Folding per-cluster outcomes into cycle totals
//!
//! Pure and order independent: the same multiset of outcomes always
//! produces the same aggregate.

use crate::classifier::{
    classify_alarm, classify_cluster_state, AlarmKind, AlarmSeverity, ClusterState,
};
use crate::error::FetchError;
use crate::models::{Alarm, ClusterInfo};
use serde::Serialize;

/// Alarm buckets of a single cluster or of the whole cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlarmCounts {
    pub critical: u64,
    pub backup_failed: u64,
    pub backup_upload_failed: u64,
    pub failed_init: u64,
}

impl AlarmCounts {
    /// Classify and count a cluster's alarm list
    pub fn from_alarms(alarms: &[Alarm]) -> Self {
        let mut counts = Self::default();
        for alarm in alarms {
            counts.record(alarm);
        }
        counts
    }

    fn record(&mut self, alarm: &Alarm) {
        let class = classify_alarm(&alarm.severity, &alarm.type_name);

        if class.severity == AlarmSeverity::Critical {
            self.critical += 1;
        }

        // Type buckets count regardless of severity
        match class.kind {
            AlarmKind::BackupFailed => self.backup_failed += 1,
            AlarmKind::BackupUploadToCloudFailed => self.backup_upload_failed += 1,
            AlarmKind::ClusterFailedInit => self.failed_init += 1,
            AlarmKind::Untracked => {}
        }
    }

    fn add(&mut self, other: &AlarmCounts) {
        self.critical += other.critical;
        self.backup_failed += other.backup_failed;
        self.backup_upload_failed += other.backup_upload_failed;
        self.failed_init += other.failed_init;
    }
}

/// What one cluster contributed to a cycle, before folding
#[derive(Debug)]
pub struct ClusterOutcome {
    pub cluster_id: u64,
    pub cluster_name: String,
    pub state: ClusterState,
    pub alarms: Result<AlarmCounts, FetchError>,
}

impl ClusterOutcome {
    /// Classify an inventory entry together with its alarm fetch result
    pub fn new(info: &ClusterInfo, alarms: Result<Vec<Alarm>, FetchError>) -> Self {
        Self {
            cluster_id: info.cluster_id,
            cluster_name: info.cluster_name.clone(),
            state: classify_cluster_state(&info.state),
            alarms: alarms.map(|alarms| AlarmCounts::from_alarms(&alarms)),
        }
    }
}

/// Per-cluster record carried in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterReport {
    pub cluster_id: u64,
    pub cluster_name: String,
    pub state: ClusterState,
    /// Zero when the alarm fetch failed
    pub alarms: AlarmCounts,
    pub alarms_fetched: bool,
}

/// Cycle-wide buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub clusters: u64,
    pub started: u64,
    pub failed: u64,
    pub degraded: u64,
    pub stopped: u64,
    pub unknown: u64,
    pub alarms: AlarmCounts,
}

impl Totals {
    fn record_state(&mut self, state: ClusterState) {
        self.clusters += 1;
        match state {
            ClusterState::Started => self.started += 1,
            ClusterState::Failed => self.failed += 1,
            ClusterState::Degraded => self.degraded += 1,
            ClusterState::Stopped => self.stopped += 1,
            ClusterState::Unknown => self.unknown += 1,
            // Counted in the overall total only
            ClusterState::Other => {}
        }
    }
}

/// Result of folding one cycle's outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Ordered by cluster id
    pub clusters: Vec<ClusterReport>,
    pub totals: Totals,
    pub alarm_fetch_failures: usize,
}

/// Fold cluster outcomes into per-cluster reports and totals
pub fn fold(mut outcomes: Vec<ClusterOutcome>) -> Aggregate {
    outcomes.sort_by_key(|o| o.cluster_id);

    let mut totals = Totals::default();
    let mut alarm_fetch_failures = 0;
    let mut clusters = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        totals.record_state(outcome.state);

        let (alarms, alarms_fetched) = match outcome.alarms {
            Ok(counts) => (counts, true),
            Err(_) => {
                alarm_fetch_failures += 1;
                (AlarmCounts::default(), false)
            }
        };
        totals.alarms.add(&alarms);

        clusters.push(ClusterReport {
            cluster_id: outcome.cluster_id,
            cluster_name: outcome.cluster_name,
            state: outcome.state,
            alarms,
            alarms_fetched,
        });
    }

    Aggregate {
        clusters,
        totals,
        alarm_fetch_failures,
    }
}
