//! Validation errors raised before any backend work starts.

use thiserror::Error;

/// Caller-contract violations detected by the engine.
///
/// Both variants are raised before any source adapter runs, so a failed
/// validation never leaves partial work behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The program identifier collection was empty.
    #[error("at least one program identifier is required")]
    NoProgramIds,

    /// The campaign mode was not one of the supported values.
    #[error("invalid campaign mode '{0}': expected 'custom' or 'turnkey'")]
    InvalidMode(String),
}
