//! Backend connection smoke tests.
//!
//! Each check opens a connection, closes it, and reports the outcome. Checks
//! never return errors; failures are captured in [`CheckResult::detail`].
//!
//! | Backend | Healthy When |
//! |---------|-------------|
//! | `warehouse` | Postgres accepts the configured credentials |
//! | `operational` | The SSH tunnel (if configured) comes up and MySQL accepts the credentials |

use serde::Serialize;
use sqlx::Connection;
use tracing::{info, warn};

use engagement_fusion_core::Backend;

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub backend: Backend,
    pub ok: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(backend: Backend, detail: String) -> Self {
        info!(backend = %backend, "connection successful");
        Self {
            backend,
            ok: true,
            detail,
        }
    }

    fn fail(backend: Backend, detail: String) -> Self {
        warn!(backend = %backend, error = %detail, "connection failed");
        Self {
            backend,
            ok: false,
            detail,
        }
    }
}

pub async fn check_warehouse(config: &Config) -> CheckResult {
    match db::connect_warehouse(&config.warehouse).await {
        Ok(conn) => {
            let _ = conn.close().await;
            CheckResult::pass(
                Backend::Warehouse,
                format!("{}:{}", config.warehouse.host, config.warehouse.port),
            )
        }
        Err(e) => CheckResult::fail(Backend::Warehouse, e.to_string()),
    }
}

pub async fn check_operational(config: &Config) -> CheckResult {
    match db::connect_operational(&config.operational).await {
        Ok(conn) => {
            conn.close().await;
            let via = match &config.operational.ssh {
                Some(ssh) => format!(" via {}", ssh.host),
                None => String::new(),
            };
            CheckResult::pass(
                Backend::Operational,
                format!(
                    "{}:{}{}",
                    config.operational.host, config.operational.port, via
                ),
            )
        }
        Err(e) => CheckResult::fail(Backend::Operational, e.to_string()),
    }
}

/// Run the checks for `backends` in order.
pub async fn run_checks(config: &Config, backends: &[Backend]) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(backends.len());
    for backend in backends {
        let result = match backend {
            Backend::Warehouse => check_warehouse(config).await,
            Backend::Operational => check_operational(config).await,
        };
        results.push(result);
    }
    results
}
