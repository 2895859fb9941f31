//! Collection cycle driver
//!
//! Runs `Idle -> Authenticating -> FetchingInventory -> FetchingAlarms ->
//! Aggregating -> Done`. Authentication and inventory failures end the
//! cycle early with `up=0`; alarm failures only zero the affected cluster.
//! The controller phase and the coredump probe share one time budget.

use super::fold::{fold, Aggregate, ClusterOutcome};
use crate::coredump::{self, DEFAULT_COREDUMP_DIR};
use crate::error::FetchError;
use crate::gateway::{ControllerGateway, ControllerSession};
use crate::health::HealthRegistry;
use crate::models::{Alarm, ClusterInfo, ControllerIdentity};
use crate::observability::{ExporterMetrics, StructuredLogger};
use crate::snapshot::CycleSnapshot;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// Configuration for a collection cycle
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Budget for the whole cycle (default: 30 seconds)
    pub timeout: Duration,
    /// Maximum number of alarm queries in flight (default: 4)
    pub max_concurrency: usize,
    /// Directory scanned for coredumps
    pub coredump_dir: PathBuf,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrency: 4,
            coredump_dir: PathBuf::from(DEFAULT_COREDUMP_DIR),
        }
    }
}

/// Where a cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CyclePhase {
    Idle = 0,
    Authenticating = 1,
    FetchingInventory = 2,
    FetchingAlarms = 3,
    Aggregating = 4,
    Done = 5,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Authenticating => "authenticating",
            CyclePhase::FetchingInventory => "fetching_inventory",
            CyclePhase::FetchingAlarms => "fetching_alarms",
            CyclePhase::Aggregating => "aggregating",
            CyclePhase::Done => "done",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CyclePhase::Authenticating,
            2 => CyclePhase::FetchingInventory,
            3 => CyclePhase::FetchingAlarms,
            4 => CyclePhase::Aggregating,
            5 => CyclePhase::Done,
            _ => CyclePhase::Idle,
        }
    }
}

/// Phase of the in-flight cycle, readable after a timeout dropped it
struct PhaseTracker(AtomicU8);

impl PhaseTracker {
    fn new() -> Self {
        Self(AtomicU8::new(CyclePhase::Idle as u8))
    }

    fn enter(&self, phase: CyclePhase) {
        debug!(phase = phase.as_str(), "Cycle phase transition");
        self.0.store(phase as u8, Ordering::SeqCst);
    }

    fn current(&self) -> CyclePhase {
        CyclePhase::from_u8(self.0.load(Ordering::SeqCst))
    }
}

/// How the controller half of a cycle ended
enum ControllerResult {
    Complete {
        identity: ControllerIdentity,
        aggregate: Aggregate,
    },
    AuthFailed,
    InventoryFailed(ControllerIdentity),
}

/// Drives collection cycles against one controller
pub struct CollectionEngine {
    gateway: Arc<dyn ControllerGateway>,
    config: CycleConfig,
    logger: StructuredLogger,
    metrics: ExporterMetrics,
    health: HealthRegistry,
    /// Serialises cycles: a concurrent scrape waits for the running one
    cycle_lock: Mutex<()>,
}

impl CollectionEngine {
    pub fn new(
        gateway: Arc<dyn ControllerGateway>,
        config: CycleConfig,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            gateway,
            config,
            logger,
            metrics: ExporterMetrics::new(),
            health: HealthRegistry::new(),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Health derived from the most recent cycle
    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Run one full collection cycle
    pub async fn run_cycle(&self) -> CycleSnapshot {
        let _guard = self.cycle_lock.lock().await;
        let start = Instant::now();
        let phase = PhaseTracker::new();

        let controller = timeout(self.config.timeout, self.collect_controller(&phase));
        let probe = timeout(
            self.config.timeout,
            coredump::scan(self.config.coredump_dir.clone()),
        );
        let (controller, probe) = tokio::join!(controller, probe);

        let (coredumps, probe_error) = match probe {
            Ok(Ok(count)) => (count, None),
            Ok(Err(e)) => (0, Some(e.to_string())),
            Err(_) => (0, Some("coredump scan timed out".to_string())),
        };
        if let Some(error) = &probe_error {
            self.metrics.inc_probe_errors();
            self.logger
                .log_probe_failure(&self.config.coredump_dir.display().to_string(), error);
        }

        let snapshot = match controller {
            Ok(ControllerResult::Complete {
                identity,
                aggregate,
            }) => {
                if aggregate.alarm_fetch_failures > 0 {
                    self.metrics
                        .inc_alarm_fetch_errors(aggregate.alarm_fetch_failures as u64);
                }
                CycleSnapshot::complete(identity, aggregate, coredumps)
            }
            Ok(ControllerResult::AuthFailed) => CycleSnapshot::auth_failed(coredumps),
            Ok(ControllerResult::InventoryFailed(identity)) => {
                CycleSnapshot::inventory_failed(identity, coredumps)
            }
            Err(_) => {
                self.logger.log_timeout(
                    self.config.timeout.as_secs_f64(),
                    phase.current().as_str(),
                );
                CycleSnapshot::timed_out(coredumps)
            }
        };

        if !snapshot.up() {
            self.metrics.inc_cycle_failure(snapshot.outcome.as_str());
        }

        let elapsed = start.elapsed();
        self.metrics.observe_scrape(elapsed.as_secs_f64());
        self.health
            .record_cycle(&snapshot, probe_error.as_deref())
            .await;
        self.logger.log_cycle(
            snapshot.outcome.as_str(),
            snapshot.clusters.len(),
            snapshot.clusters.iter().filter(|c| !c.alarms_fetched).count(),
            snapshot.coredumps,
            elapsed.as_millis(),
        );

        snapshot
    }

    async fn collect_controller(&self, phase: &PhaseTracker) -> ControllerResult {
        phase.enter(CyclePhase::Authenticating);
        let session = match self.gateway.authenticate().await {
            Ok(session) => session,
            Err(e) => {
                let ping = match self.gateway.ping().await {
                    Ok(reply) => reply,
                    Err(ping_err) => ping_err.to_string(),
                };
                self.logger.log_auth_failure(&e.to_string(), &ping);
                return ControllerResult::AuthFailed;
            }
        };
        let identity = session.identity().clone();

        phase.enter(CyclePhase::FetchingInventory);
        let inventory = match session.list_clusters().await {
            Ok(inventory) => inventory,
            Err(e) => {
                self.logger
                    .log_inventory_failure(&identity.controller_id, &e.to_string());
                return ControllerResult::InventoryFailed(identity);
            }
        };

        phase.enter(CyclePhase::FetchingAlarms);
        let outcomes = self.fetch_alarms(session, inventory).await;

        phase.enter(CyclePhase::Aggregating);
        let aggregate = fold(outcomes);

        phase.enter(CyclePhase::Done);
        ControllerResult::Complete {
            identity,
            aggregate,
        }
    }

    /// Query alarms for every cluster with bounded parallelism
    ///
    /// Returns one outcome per inventory entry, even if a query task dies.
    async fn fetch_alarms(
        &self,
        session: Arc<dyn ControllerSession>,
        inventory: Vec<ClusterInfo>,
    ) -> Vec<ClusterOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks: JoinSet<(usize, Result<Vec<Alarm>, FetchError>)> = JoinSet::new();

        for (index, info) in inventory.iter().enumerate() {
            let session = Arc::clone(&session);
            let semaphore = Arc::clone(&semaphore);
            let cluster_id = info.cluster_id;

            tasks.spawn(async move {
                let alarms = match semaphore.acquire_owned().await {
                    Ok(_permit) => session.list_alarms(cluster_id).await,
                    Err(e) => Err(FetchError::Transport {
                        operation: "getAlarms",
                        message: e.to_string(),
                    }),
                };
                (index, alarms)
            });
        }

        let mut results: Vec<Option<Result<Vec<Alarm>, FetchError>>> =
            inventory.iter().map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, alarms)) => results[index] = Some(alarms),
                Err(e) => debug!(error = %e, "Alarm query task did not complete"),
            }
        }

        inventory
            .iter()
            .zip(results)
            .map(|(info, alarms)| {
                let alarms = alarms.unwrap_or_else(|| {
                    Err(FetchError::Transport {
                        operation: "getAlarms",
                        message: "alarm query task aborted".to_string(),
                    })
                });
                if let Err(e) = &alarms {
                    self.logger
                        .log_alarm_failure(info.cluster_id, &info.cluster_name, &e.to_string());
                }
                ClusterOutcome::new(info, alarms)
            })
            .collect()
    }
}

/// Builder for a [`CollectionEngine`]
pub struct CollectionEngineBuilder {
    gateway: Option<Arc<dyn ControllerGateway>>,
    logger: Option<StructuredLogger>,
    config: CycleConfig,
}

impl CollectionEngineBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            gateway: None,
            logger: None,
            config: CycleConfig::default(),
        }
    }

    /// Set the controller gateway
    pub fn gateway(mut self, gateway: Arc<dyn ControllerGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the per-cycle time budget
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of concurrent alarm queries
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    /// Set the coredump directory
    pub fn coredump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.coredump_dir = dir.into();
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<CollectionEngine> {
        let gateway = self
            .gateway
            .ok_or_else(|| anyhow::anyhow!("Gateway is required"))?;
        if self.config.timeout.is_zero() {
            anyhow::bail!("Cycle timeout must be greater than zero");
        }
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("unknown"));

        Ok(CollectionEngine::new(gateway, self.config, logger))
    }
}

impl Default for CollectionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
