//! TOML configuration parsing and validation.
//!
//! ```toml
//! [warehouse]
//! host = "pg_host"
//! port = 5432
//! database = "pg_db"
//! user = "pg_username"
//! password = "pg_password"
//!
//! [operational]
//! host = "mysql_host"
//! port = 3306
//! database = "mysql_db"
//! user = "mysql_user"
//! password = "mysql_password"
//!
//! [operational.ssh]
//! host = "ssh_host"
//! user = "ssh_user"
//! key_path = "/path/to/key.pem"
//!
//! [engine]
//! adapter_timeout_secs = 120
//! ```
//!
//! Passwords can be supplied through `EFX_WAREHOUSE_PASSWORD` and
//! `EFX_OPERATIONAL_PASSWORD` instead of the file; the environment wins.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const WAREHOUSE_PASSWORD_ENV: &str = "EFX_WAREHOUSE_PASSWORD";
pub const OPERATIONAL_PASSWORD_ENV: &str = "EFX_OPERATIONAL_PASSWORD";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub operational: OperationalConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Postgres analytical warehouse holding the dbt engagement models.
#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_pg_port() -> u16 {
    5432
}

/// MySQL operational store, optionally reached through an SSH tunnel.
#[derive(Debug, Deserialize, Clone)]
pub struct OperationalConfig {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    #[serde(default)]
    pub database: Option<String>,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ssh: Option<SshConfig>,
}

fn default_mysql_port() -> u16 {
    3306
}

#[derive(Debug, Deserialize, Clone)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    pub key_path: PathBuf,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}
fn default_local_port() -> u16 {
    13306
}
fn default_ready_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_secs: default_adapter_timeout_secs(),
        }
    }
}

fn default_adapter_timeout_secs() -> u64 {
    120
}

impl EngineConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse and validate configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.warehouse.host.trim().is_empty() {
        anyhow::bail!("warehouse.host must not be empty");
    }
    if config.warehouse.user.trim().is_empty() {
        anyhow::bail!("warehouse.user must not be empty");
    }
    if config.warehouse.port == 0 {
        anyhow::bail!("warehouse.port must be > 0");
    }

    if config.operational.host.trim().is_empty() {
        anyhow::bail!("operational.host must not be empty");
    }
    if config.operational.user.trim().is_empty() {
        anyhow::bail!("operational.user must not be empty");
    }
    if config.operational.port == 0 {
        anyhow::bail!("operational.port must be > 0");
    }

    if let Some(ssh) = &config.operational.ssh {
        if ssh.host.trim().is_empty() || ssh.user.trim().is_empty() {
            anyhow::bail!("operational.ssh.host and operational.ssh.user must not be empty");
        }
        if ssh.local_port == 0 {
            anyhow::bail!("operational.ssh.local_port must be > 0");
        }
    }

    if config.engine.adapter_timeout_secs == 0 {
        anyhow::bail!("engine.adapter_timeout_secs must be > 0");
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(password) = std::env::var(WAREHOUSE_PASSWORD_ENV) {
        config.warehouse.password = password;
    }
    if let Ok(password) = std::env::var(OPERATIONAL_PASSWORD_ENV) {
        config.operational.password = password;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[warehouse]
host = "pg_host"
database = "pg_db"
user = "pg_username"
password = "pg_password"

[operational]
host = "mysql_host"
user = "mysql_user"
"#;

    #[test]
    fn test_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.warehouse.port, 5432);
        assert_eq!(config.operational.port, 3306);
        assert!(config.operational.ssh.is_none());
        assert_eq!(config.engine.adapter_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_ssh_section() {
        let text = format!(
            "{}\n[operational.ssh]\nhost = \"bastion\"\nuser = \"ec2-user\"\nkey_path = \"/keys/id.pem\"\n",
            MINIMAL
        );
        let config = parse_config(&text).unwrap();
        let ssh = config.operational.ssh.unwrap();
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.local_port, 13306);
        assert_eq!(ssh.key_path, PathBuf::from("/keys/id.pem"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let text = format!("{}\n[engine]\nadapter_timeout_secs = 0\n", MINIMAL);
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("adapter_timeout_secs"));
    }

    #[test]
    fn test_missing_section_rejected() {
        assert!(parse_config("[warehouse]\nhost = \"h\"\ndatabase = \"d\"\nuser = \"u\"\n").is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        let text = MINIMAL.replace("\"pg_host\"", "\"  \"");
        assert!(parse_config(&text).is_err());
    }
}
