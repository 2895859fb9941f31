//! Exporter configuration
//!
//! Listener and collection settings come from command-line flags, the
//! controller connection from `CMON_*` environment variables.

use anyhow::Result;
use clap::Parser;
use exporter_lib::api::{DEFAULT_LISTEN_ADDRESS, DEFAULT_METRICS_PATH};
use exporter_lib::coredump::DEFAULT_COREDUMP_DIR;
use exporter_lib::{CmonClientConfig, CycleConfig};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Prometheus exporter for ClusterControl (CMON) controllers
#[derive(Debug, Clone, Parser)]
#[command(name = "cmon_exporter", version, about, long_about = None)]
pub struct Args {
    /// Address to listen on for telemetry
    #[arg(long = "web.listen-address", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: String,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", default_value = DEFAULT_METRICS_PATH)]
    pub metrics_path: String,

    /// Directory scanned for coredumps
    #[arg(long = "coredump.directory", default_value = DEFAULT_COREDUMP_DIR)]
    pub coredump_dir: PathBuf,

    /// Time budget for one collection cycle, in seconds
    #[arg(long = "cmon.timeout", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Maximum number of concurrent alarm queries
    #[arg(long = "cmon.max-concurrency", default_value_t = 4)]
    pub max_concurrency: usize,

    /// Verify the controller's TLS certificate
    #[arg(long = "cmon.tls-verify")]
    pub tls_verify: bool,
}

impl Args {
    /// Reject flag combinations the HTTP server cannot serve
    pub fn validate(&self) -> Result<()> {
        if !self.metrics_path.starts_with('/') {
            anyhow::bail!("--web.telemetry-path must start with '/'");
        }
        if matches!(self.metrics_path.as_str(), "/" | "/healthz" | "/readyz") {
            anyhow::bail!(
                "--web.telemetry-path {} collides with a built-in route",
                self.metrics_path
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("--cmon.timeout must be greater than zero");
        }
        Ok(())
    }

    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_concurrency: self.max_concurrency.max(1),
            coredump_dir: self.coredump_dir.clone(),
        }
    }
}

/// Controller connection settings from the environment
#[derive(Clone, Deserialize)]
pub struct ControllerConfig {
    /// RPC endpoint (CMON_ENDPOINT)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// CMON_USERNAME
    #[serde(default)]
    pub username: Option<String>,

    /// CMON_PASSWORD
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn default_endpoint() -> String {
    "https://127.0.0.1:9501".to_string()
}

impl ControllerConfig {
    /// Load configuration from `CMON_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("CMON"))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment)
            .build()?;

        let mut loaded: ControllerConfig = config.try_deserialize()?;
        if loaded.endpoint.trim().is_empty() {
            loaded.endpoint = default_endpoint();
        }
        Ok(loaded)
    }

    /// Build the client configuration; fails when credentials are missing
    pub fn client_config(&self, args: &Args) -> Result<CmonClientConfig> {
        let username = required(&self.username, "CMON_USERNAME")?;
        let password = required(&self.password, "CMON_PASSWORD")?;

        Ok(CmonClientConfig {
            endpoint: self.endpoint.clone(),
            username,
            password,
            request_timeout: Duration::from_secs(args.timeout_secs),
            tls_verify: args.tls_verify,
        })
    }
}

fn required(value: &Option<String>, variable: &str) -> Result<String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => anyhow::bail!("Env variable {} is not set.", variable),
    }
}
