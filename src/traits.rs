//! Backend query contract.
//!
//! The engine talks to its data sources only through these traits, so
//! backends can be swapped for in-memory fakes in tests.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               AdapterRegistry                │
//! │  ┌──────────────────────┐ ┌───────────────┐  │
//! │  │ Warehouse (Postgres) │ │ Operational   │  │
//! │  │ email/asset/survey/  │ │ (MySQL + SSH) │  │
//! │  │ AdButler             │ │ Choozle       │  │
//! │  └──────────────────────┘ └───────────────┘  │
//! └──────────────┬───────────────────────────────┘
//!                ▼
//!        Engine::aggregate() → fusion pipeline
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use engagement_fusion_core::{Backend, CampaignMode, EngagementRecord, SourceKind};

use crate::config::Config;
use crate::error::SourceError;

/// A source of engagement rows for a set of programs.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use engagement_fusion::error::SourceError;
/// use engagement_fusion::traits::SourceAdapter;
/// use engagement_fusion_core::{EngagementRecord, SourceDetail, SourceKind};
///
/// struct FixedAssetViews;
///
/// #[async_trait]
/// impl SourceAdapter for FixedAssetViews {
///     fn kind(&self) -> SourceKind { SourceKind::AssetView }
///
///     async fn fetch(&self, program_ids: &[i64]) -> Result<Vec<EngagementRecord>, SourceError> {
///         Ok(program_ids
///             .iter()
///             .map(|id| EngagementRecord::new(*id, SourceDetail::AssetView))
///             .collect())
///     }
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter serves.
    fn kind(&self) -> SourceKind;

    /// Human label used in logs and reports.
    fn name(&self) -> &str {
        self.kind().label()
    }

    fn backend(&self) -> Backend {
        self.kind().backend()
    }

    /// Fetch rows for `program_ids` (never empty).
    ///
    /// Every returned record must belong to one of `program_ids` and carry a
    /// source allowed for [`kind`](SourceAdapter::kind).
    async fn fetch(&self, program_ids: &[i64]) -> Result<Vec<EngagementRecord>, SourceError>;
}

/// Provider taxonomy lookup keyed by NPI.
#[async_trait]
pub trait SpecialtyLookup: Send + Sync {
    /// Map each known NPI to its specialty. An empty input returns an empty
    /// map without touching the backend.
    async fn lookup(&self, npis: &[String]) -> Result<HashMap<String, String>, SourceError>;
}

/// Registered source adapters.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Registry with the warehouse and operational-store adapters.
    pub fn from_config(config: &Config) -> Self {
        use crate::adapter_choozle::ChoozleAdapter;
        use crate::adapter_warehouse::WarehouseAdapter;

        let mut registry = Self::new();
        for kind in [
            SourceKind::Email,
            SourceKind::AssetView,
            SourceKind::SurveyResponse,
            SourceKind::AdButler,
        ] {
            registry.register(Box::new(WarehouseAdapter::new(
                kind,
                config.warehouse.clone(),
            )));
        }
        registry.register(Box::new(ChoozleAdapter::new(config.operational.clone())));
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    /// Adapters participating in `mode`, in the mode's invocation order.
    pub fn for_mode(&self, mode: CampaignMode) -> Vec<&dyn SourceAdapter> {
        mode.source_kinds()
            .iter()
            .flat_map(|kind| {
                self.adapters
                    .iter()
                    .filter(move |a| a.kind() == *kind)
                    .map(|a| a.as_ref())
            })
            .collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
