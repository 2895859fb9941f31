//! Classification of raw controller vocabulary
//!
//! Maps the controller's cluster state strings and alarm severity/type
//! strings onto closed enumerations. Every input maps to some variant, so
//! a new upstream value degrades to "unclassified" instead of failing a
//! cycle.

use serde::Serialize;

/// Lifecycle state of a managed cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    Started,
    Failed,
    Degraded,
    Stopped,
    Unknown,
    /// Anything the controller reports that is not listed above
    Other,
}

/// Alarm severity as far as the exporter cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmSeverity {
    Critical,
    Warning,
    Other,
}

/// Alarm types that get their own bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AlarmKind {
    BackupFailed,
    BackupUploadToCloudFailed,
    ClusterFailedInit,
    Untracked,
}

/// Result of classifying a single alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmClass {
    pub severity: AlarmSeverity,
    pub kind: AlarmKind,
}

/// Classify a raw cluster state string
pub fn classify_cluster_state(raw: &str) -> ClusterState {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("STARTED") {
        ClusterState::Started
    } else if raw.eq_ignore_ascii_case("FAILURE") || raw.eq_ignore_ascii_case("FAILED") {
        ClusterState::Failed
    } else if raw.eq_ignore_ascii_case("DEGRADED") {
        ClusterState::Degraded
    } else if raw.eq_ignore_ascii_case("STOPPED") {
        ClusterState::Stopped
    } else if raw.eq_ignore_ascii_case("UNKNOWN") {
        ClusterState::Unknown
    } else {
        ClusterState::Other
    }
}

/// Classify a raw alarm severity and type tag
pub fn classify_alarm(severity: &str, type_tag: &str) -> AlarmClass {
    AlarmClass {
        severity: classify_severity(severity),
        kind: classify_kind(type_tag),
    }
}

fn classify_severity(raw: &str) -> AlarmSeverity {
    let raw = raw.trim();
    // Controller spells these ALARM_CRITICAL / ALARM_WARNING
    let bare = match raw.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("ALARM_") => &raw[6..],
        _ => raw,
    };

    if bare.eq_ignore_ascii_case("CRITICAL") {
        AlarmSeverity::Critical
    } else if bare.eq_ignore_ascii_case("WARNING") {
        AlarmSeverity::Warning
    } else {
        AlarmSeverity::Other
    }
}

fn classify_kind(raw: &str) -> AlarmKind {
    match raw.trim() {
        "BackupFailed" => AlarmKind::BackupFailed,
        "BackupUploadToCloudFailed" => AlarmKind::BackupUploadToCloudFailed,
        "ClusterFailedInit" => AlarmKind::ClusterFailedInit,
        _ => AlarmKind::Untracked,
    }
}
