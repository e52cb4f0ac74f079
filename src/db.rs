//! Backend connections.
//!
//! Every fetch opens its own connection and closes it when done; nothing is
//! pooled or shared between adapters.

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::debug;

use crate::config::{OperationalConfig, WarehouseConfig};
use crate::error::SourceError;
use crate::tunnel::SshTunnel;

pub async fn connect_warehouse(config: &WarehouseConfig) -> Result<PgConnection, SourceError> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password);

    debug!(host = %config.host, database = %config.database, "connecting to warehouse");
    PgConnection::connect_with(&options)
        .await
        .map_err(SourceError::Connect)
}

/// A MySQL connection plus the tunnel it runs through, if any.
pub struct OperationalConnection {
    pub conn: MySqlConnection,
    tunnel: Option<SshTunnel>,
}

impl OperationalConnection {
    /// Close the connection, then the tunnel.
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            debug!(error = %e, "operational connection close failed");
        }
        if let Some(tunnel) = self.tunnel {
            tunnel.close().await;
        }
    }
}

pub async fn connect_operational(
    config: &OperationalConfig,
) -> Result<OperationalConnection, SourceError> {
    let tunnel = match &config.ssh {
        Some(ssh) => Some(SshTunnel::open(ssh, &config.host, config.port).await?),
        None => None,
    };

    let (host, port) = match &tunnel {
        Some(t) => ("127.0.0.1", t.local_port()),
        None => (config.host.as_str(), config.port),
    };

    let mut options = MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(&config.user)
        .password(&config.password);
    if let Some(database) = &config.database {
        options = options.database(database);
    }

    debug!(host, port, tunneled = tunnel.is_some(), "connecting to operational store");
    match MySqlConnection::connect_with(&options).await {
        Ok(conn) => Ok(OperationalConnection { conn, tunnel }),
        Err(e) => {
            if let Some(t) = tunnel {
                t.close().await;
            }
            Err(SourceError::Connect(e))
        }
    }
}
