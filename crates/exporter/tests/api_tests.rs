//! Integration tests for the exporter HTTP endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use exporter_lib::{
    api::{create_router, AppState},
    health::components,
    Alarm, AuthError, ClusterInfo, CollectionEngineBuilder, ControllerGateway,
    ControllerIdentity, ControllerSession, FetchError, MetricDescriptors, StructuredLogger,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Controller with two clusters; cluster 2 has a critical backup alarm
struct StaticController {
    reject_auth: bool,
}

struct StaticSession {
    identity: ControllerIdentity,
}

#[async_trait]
impl ControllerGateway for StaticController {
    async fn authenticate(&self) -> Result<Arc<dyn ControllerSession>, AuthError> {
        if self.reject_auth {
            return Err(AuthError::Rejected("Wrong username or password.".to_string()));
        }
        Ok(Arc::new(StaticSession {
            identity: ControllerIdentity::new("ctrl-1", "1.9.8"),
        }))
    }

    async fn ping(&self) -> Result<String, AuthError> {
        Ok("HTTP 200 OK".to_string())
    }
}

#[async_trait]
impl ControllerSession for StaticSession {
    fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, FetchError> {
        Ok(vec![
            ClusterInfo {
                cluster_id: 1,
                cluster_name: "a".to_string(),
                state: "STARTED".to_string(),
            },
            ClusterInfo {
                cluster_id: 2,
                cluster_name: "b".to_string(),
                state: "FAILURE".to_string(),
            },
        ])
    }

    async fn list_alarms(&self, cluster_id: u64) -> Result<Vec<Alarm>, FetchError> {
        if cluster_id != 2 {
            return Ok(vec![]);
        }
        Ok(vec![Alarm {
            cluster_id,
            severity: "ALARM_CRITICAL".to_string(),
            type_name: "BackupFailed".to_string(),
            title: None,
        }])
    }
}

async fn setup_test_app(reject_auth: bool, metrics_path: &str) -> Router {
    let engine = CollectionEngineBuilder::new()
        .gateway(Arc::new(StaticController { reject_auth }))
        .logger(StructuredLogger::new("https://cmon.test:9501"))
        .coredump_dir("/nonexistent/cmon-exporter-test")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    engine.health().register(components::CONTROLLER).await;
    engine.health().register(components::COREDUMP_PROBE).await;

    let state = Arc::new(AppState::new(
        Arc::new(engine),
        Arc::new(MetricDescriptors::new()),
        metrics_path,
    ));
    create_router(state)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_landing_page_links_metrics_path() {
    let app = setup_test_app(false, "/metrics").await;

    let (status, content_type, body) = get(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.contains("text/html"));
    assert!(body.contains("<a href='/metrics'>Metrics</a>"));
}

#[tokio::test]
async fn test_metrics_endpoint_renders_cycle() {
    let app = setup_test_app(false, "/metrics").await;

    let (status, content_type, text) = get(&app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.contains("text/plain"));

    assert!(text.contains(r#"cmon_up{CmonVersion="1.9.8",ControllerId="ctrl-1"} 1"#));
    assert!(text.contains(r#"cmon_cluster_up{ClusterID="1",ClusterName="a",ControllerId="ctrl-1"} 1"#)
        || text.contains(r#"cmon_cluster_up{ClusterName="a",ClusterID="1",ControllerId="ctrl-1"} 1"#));
    assert!(text.contains(r#"cmon_cluster_started_total{ControllerId="ctrl-1"} 1"#));
    assert!(text.contains(r#"cmon_cluster_failed_total{ControllerId="ctrl-1"} 1"#));
    assert!(text.contains(r#"cmon_alarms_critical_total{ControllerId="ctrl-1"} 1"#));
    assert!(text.contains(r#"cmon_alarms_backup_failed_total{ControllerId="ctrl-1"} 1"#));
    assert!(text.contains("cmon_coredump_detected_total 0"));

    // Exporter self-metrics are appended
    assert!(text.contains("cmon_exporter_scrapes_total"));
    assert!(text.contains("cmon_exporter_scrape_duration_seconds_bucket"));
}

#[tokio::test]
async fn test_metrics_after_auth_failure() {
    let app = setup_test_app(true, "/metrics").await;

    let (status, _, text) = get(&app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains(r#"cmon_up{CmonVersion="",ControllerId=""} 0"#));
    assert!(!text.contains("cmon_cluster_up"));
    assert!(!text.contains("cmon_cluster_total"));
    assert!(text.contains("cmon_coredump_detected_total 0"));
}

#[tokio::test]
async fn test_custom_metrics_path() {
    let app = setup_test_app(false, "/cmon").await;

    let (status, _, text) = get(&app, "/cmon").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("cmon_up"));

    let (status, _, _) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readyz_flips_after_first_scrape() {
    let app = setup_test_app(false, "/metrics").await;

    let (status, _, body) = get(&app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    get(&app, "/metrics").await;

    let (status, _, body) = get(&app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_healthz_reflects_last_cycle() {
    let app = setup_test_app(true, "/metrics").await;

    let (status, _, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(health["components"]["controller"].is_object());
    assert!(health["components"]["coredump_probe"].is_object());

    get(&app, "/metrics").await;

    let (status, _, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(
        health["components"]["controller"]["message"],
        "authentication failed"
    );
}
