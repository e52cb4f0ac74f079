//! Source adapter errors.

use thiserror::Error;

/// Why a backend fetch produced no data.
///
/// Adapters return these internally; the engine collapses them into an
/// empty batch and records the message in the aggregation report.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("ssh tunnel failed: {0}")]
    Tunnel(String),

    #[error("unexpected row shape: {0}")]
    Decode(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}
