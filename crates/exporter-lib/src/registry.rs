//! Metric descriptors and text rendering
//!
//! [`MetricDescriptors`] is built once at startup and shared read-only.
//! Each scrape renders its samples into a throwaway Prometheus registry so
//! nothing from one cycle can leak into the next.

use crate::snapshot::Sample;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use tracing::debug;

/// Namespace prefix for all controller metrics
pub const NAMESPACE: &str = "cmon";

/// Metric names, without namespace
pub mod names {
    pub const UP: &str = "up";
    pub const CLUSTER_UP: &str = "cluster_up";
    pub const CLUSTER_FAILURE: &str = "cluster_failure";
    pub const CLUSTER_DEGRADED: &str = "cluster_degraded";
    pub const CLUSTER_BACKUP_FAILED: &str = "cluster_backup_failed";
    pub const CLUSTER_BACKUP_UPLOAD_FAILED: &str = "cluster_backup_upload_failed";
    pub const CLUSTER_FAILED_INIT: &str = "cluster_failed_init";
    pub const CLUSTER_TOTAL: &str = "cluster_total";
    pub const CLUSTER_STARTED_TOTAL: &str = "cluster_started_total";
    pub const CLUSTER_FAILED_TOTAL: &str = "cluster_failed_total";
    pub const CLUSTER_DEGRADED_TOTAL: &str = "cluster_degraded_total";
    pub const CLUSTER_STOPPED_TOTAL: &str = "cluster_stopped_total";
    pub const CLUSTER_UNKNOWN_TOTAL: &str = "cluster_unknown_total";
    pub const ALARMS_CRITICAL_TOTAL: &str = "alarms_critical_total";
    pub const ALARMS_BACKUP_FAILED_TOTAL: &str = "alarms_backup_failed_total";
    pub const ALARMS_BACKUP_UPLOAD_FAILED_TOTAL: &str = "alarms_backup_upload_failed_total";
    pub const CLUSTER_FAILED_INIT_TOTAL: &str = "cluster_failed_init_total";
    pub const COREDUMP_DETECTED_TOTAL: &str = "coredump_detected_total";
}

/// Label names
pub mod labels {
    pub const CMON_VERSION: &str = "CmonVersion";
    pub const CONTROLLER_ID: &str = "ControllerId";
    pub const CLUSTER_NAME: &str = "ClusterName";
    pub const CLUSTER_ID: &str = "ClusterID";
}

const IDENTITY_LABELS: &[&str] = &[labels::CMON_VERSION, labels::CONTROLLER_ID];
const CLUSTER_LABELS: &[&str] = &[labels::CLUSTER_NAME, labels::CLUSTER_ID, labels::CONTROLLER_ID];
const TOTAL_LABELS: &[&str] = &[labels::CONTROLLER_ID];

/// Name, help text and label names of one metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub label_names: &'static [&'static str],
}

impl Descriptor {
    const fn new(
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            label_names,
        }
    }

    /// Fully qualified name, e.g. `cmon_up`
    pub fn fq_name(&self) -> String {
        format!("{}_{}", NAMESPACE, self.name)
    }
}

/// Immutable set of descriptors for the controller metrics
#[derive(Debug, Clone)]
pub struct MetricDescriptors {
    descriptors: Vec<Descriptor>,
    index: HashMap<&'static str, usize>,
}

impl Default for MetricDescriptors {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricDescriptors {
    /// Build the full controller metric vocabulary
    pub fn new() -> Self {
        use names::*;

        let descriptors = vec![
            Descriptor::new(UP, "Was the last CMON query successful.", IDENTITY_LABELS),
            Descriptor::new(
                CLUSTER_UP,
                "Is the cluster up (STARTED) or not.",
                CLUSTER_LABELS,
            ),
            Descriptor::new(
                CLUSTER_FAILURE,
                "Is the cluster in FAILURE state.",
                CLUSTER_LABELS,
            ),
            Descriptor::new(
                CLUSTER_DEGRADED,
                "Is the cluster in DEGRADED state.",
                CLUSTER_LABELS,
            ),
            Descriptor::new(
                CLUSTER_BACKUP_FAILED,
                "Number of BackupFailed alarms for the cluster.",
                CLUSTER_LABELS,
            ),
            Descriptor::new(
                CLUSTER_BACKUP_UPLOAD_FAILED,
                "Number of BackupUploadToCloudFailed alarms for the cluster.",
                CLUSTER_LABELS,
            ),
            Descriptor::new(
                CLUSTER_FAILED_INIT,
                "Number of ClusterFailedInit alarms for the cluster.",
                CLUSTER_LABELS,
            ),
            Descriptor::new(CLUSTER_TOTAL, "Total number of clusters.", TOTAL_LABELS),
            Descriptor::new(
                CLUSTER_STARTED_TOTAL,
                "Total number of clusters in started state.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                CLUSTER_FAILED_TOTAL,
                "Total number of clusters in failed state.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                CLUSTER_DEGRADED_TOTAL,
                "Total number of clusters in degraded state.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                CLUSTER_STOPPED_TOTAL,
                "Total number of clusters in stopped state.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                CLUSTER_UNKNOWN_TOTAL,
                "Total number of clusters in unknown state.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                ALARMS_CRITICAL_TOTAL,
                "Total number of critical alarms.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                ALARMS_BACKUP_FAILED_TOTAL,
                "Total number of BackupFailed alarms.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                ALARMS_BACKUP_UPLOAD_FAILED_TOTAL,
                "Total number of BackupUploadToCloudFailed alarms.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                CLUSTER_FAILED_INIT_TOTAL,
                "Total number of ClusterFailedInit alarms.",
                TOTAL_LABELS,
            ),
            Descriptor::new(
                COREDUMP_DETECTED_TOTAL,
                "Number of coredumps found on the controller host.",
                &[],
            ),
        ];

        let index = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name, i))
            .collect();

        Self { descriptors, index }
    }

    /// Look up a descriptor by short name
    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.index.get(name).map(|&i| &self.descriptors[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    /// Render samples into metric families
    pub fn render(&self, samples: &[Sample]) -> prometheus::Result<Vec<MetricFamily>> {
        let registry = Registry::new();
        let mut vecs: HashMap<&'static str, GaugeVec> = HashMap::new();

        for sample in samples {
            let Some(descriptor) = self.get(sample.name) else {
                debug!(metric = sample.name, "Dropping sample without descriptor");
                continue;
            };

            let gauge = match vecs.get(descriptor.name) {
                Some(gauge) => gauge.clone(),
                None => {
                    let opts = Opts::new(descriptor.name, descriptor.help).namespace(NAMESPACE);
                    let gauge = GaugeVec::new(opts, descriptor.label_names)?;
                    registry.register(Box::new(gauge.clone()))?;
                    vecs.insert(descriptor.name, gauge.clone());
                    gauge
                }
            };

            let values: Vec<&str> = descriptor
                .label_names
                .iter()
                .map(|label| sample.label(label).unwrap_or(""))
                .collect();
            gauge.get_metric_with_label_values(&values)?.set(sample.value);
        }

        Ok(registry.gather())
    }
}

/// Encode metric families in the Prometheus text format
pub fn encode_text(families: &[MetricFamily]) -> prometheus::Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    Ok(buffer)
}

/// Content type of [`encode_text`] output
pub fn text_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_has_a_descriptor() {
        let descriptors = MetricDescriptors::new();
        for name in [
            names::UP,
            names::CLUSTER_UP,
            names::CLUSTER_FAILURE,
            names::CLUSTER_DEGRADED,
            names::CLUSTER_BACKUP_FAILED,
            names::CLUSTER_BACKUP_UPLOAD_FAILED,
            names::CLUSTER_FAILED_INIT,
            names::CLUSTER_TOTAL,
            names::CLUSTER_STARTED_TOTAL,
            names::CLUSTER_FAILED_TOTAL,
            names::CLUSTER_DEGRADED_TOTAL,
            names::CLUSTER_STOPPED_TOTAL,
            names::CLUSTER_UNKNOWN_TOTAL,
            names::ALARMS_CRITICAL_TOTAL,
            names::ALARMS_BACKUP_FAILED_TOTAL,
            names::ALARMS_BACKUP_UPLOAD_FAILED_TOTAL,
            names::CLUSTER_FAILED_INIT_TOTAL,
            names::COREDUMP_DETECTED_TOTAL,
        ] {
            assert!(descriptors.get(name).is_some(), "missing {name}");
        }
        assert_eq!(descriptors.iter().count(), 18);
    }

    #[test]
    fn test_fq_name() {
        let descriptors = MetricDescriptors::new();
        assert_eq!(descriptors.get(names::UP).unwrap().fq_name(), "cmon_up");
    }

    #[test]
    fn test_render_and_encode() {
        let descriptors = MetricDescriptors::new();
        let samples = vec![
            Sample::new(
                names::UP,
                vec![
                    (labels::CMON_VERSION, "1.9.8".to_string()),
                    (labels::CONTROLLER_ID, "ctrl-42".to_string()),
                ],
                1.0,
            ),
            Sample::new(names::COREDUMP_DETECTED_TOTAL, vec![], 3.0),
        ];

        let families = descriptors.render(&samples).unwrap();
        assert_eq!(families.len(), 2);

        let text = String::from_utf8(encode_text(&families).unwrap()).unwrap();
        assert!(text.contains("# TYPE cmon_up gauge"));
        assert!(text.contains(r#"cmon_up{CmonVersion="1.9.8",ControllerId="ctrl-42"} 1"#));
        assert!(text.contains("cmon_coredump_detected_total 3"));
    }

    #[test]
    fn test_render_fills_missing_labels_with_empty_values() {
        let descriptors = MetricDescriptors::new();
        let samples = vec![Sample::new(names::UP, vec![], 0.0)];

        let families = descriptors.render(&samples).unwrap();
        let text = String::from_utf8(encode_text(&families).unwrap()).unwrap();
        assert!(text.contains(r#"cmon_up{CmonVersion="",ControllerId=""} 0"#));
    }

    #[test]
    fn test_render_skips_unknown_names() {
        let descriptors = MetricDescriptors::new();
        let samples = vec![Sample::new("no_such_metric", vec![], 1.0)];

        let families = descriptors.render(&samples).unwrap();
        assert!(families.is_empty());
    }
}
