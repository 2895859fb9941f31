//! Library for the CMON Prometheus exporter
//!
//! This crate provides the core functionality for:
//! - Talking to a ClusterControl controller over its RPC v2 API
//! - Classifying cluster states and alarms
//! - Running collection cycles with partial-failure handling
//! - Rendering cycle snapshots as Prometheus metrics
//! - Health checks and observability

pub mod api;
pub mod classifier;
pub mod collector;
pub mod coredump;
pub mod error;
pub mod gateway;
pub mod health;
pub mod models;
pub mod observability;
pub mod registry;
pub mod snapshot;

pub use collector::{CollectionEngine, CollectionEngineBuilder, CycleConfig};
pub use error::{AuthError, FetchError, ProbeError};
pub use gateway::{CmonClient, CmonClientConfig, ControllerGateway, ControllerSession};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
pub use registry::MetricDescriptors;
pub use snapshot::{emit, CycleOutcome, CycleSnapshot, Sample};
