//! Aggregation orchestration.
//!
//! Coordinates one aggregation call: validate input → fan out to the
//! adapters selected by the campaign mode → union → decode activation
//! ranges → propagate program metadata → enrich specialties → project.
//!
//! Adapters run concurrently, each under its own timeout. A failed or
//! timed-out adapter contributes an empty batch; the reason is logged and
//! kept in the [`AggregationReport`] so "no rows" and "source down" stay
//! distinguishable. Validation errors are raised before any adapter runs.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use engagement_fusion_core::enrich::{attach_specialties, distinct_npis};
use engagement_fusion_core::project::{project, REPORT_COLUMNS};
use engagement_fusion_core::propagate::{propagate_program_metadata, MetadataConflict};
use engagement_fusion_core::range::apply_activation_ranges;
use engagement_fusion_core::union::union_batches;
use engagement_fusion_core::{Backend, CampaignMode, EngineError, SourceBatch, SourceKind, Table};

use crate::config::Config;
use crate::specialty::WarehouseSpecialtyLookup;
use crate::traits::{AdapterRegistry, SourceAdapter, SpecialtyLookup};

/// How one adapter invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Fetched { rows: usize },
    Failed { error: String },
    TimedOut { after_secs: u64 },
}

impl SourceOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, SourceOutcome::Fetched { .. })
    }
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOutcome::Fetched { rows } => write!(f, "{} rows", rows),
            SourceOutcome::Failed { error } => write!(f, "FAILED ({})", error),
            SourceOutcome::TimedOut { after_secs } => {
                write!(f, "TIMED OUT after {}s", after_secs)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub adapter: String,
    pub kind: SourceKind,
    pub backend: Backend,
    pub outcome: SourceOutcome,
}

/// Result of one aggregation call.
#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub mode: CampaignMode,
    pub program_ids: Vec<i64>,
    pub table: Table,
    pub sources: Vec<SourceReport>,
    pub conflicts: Vec<MetadataConflict>,
}

impl AggregationReport {
    /// One-line row/column count summary.
    pub fn summary(&self) -> String {
        format!(
            "Combined {} engagement dataset contains {} rows and {} columns.",
            self.mode,
            self.table.row_count(),
            self.table.column_count()
        )
    }

    pub fn degraded_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.outcome.is_degraded())
    }
}

/// The fusion engine: adapters plus specialty lookup.
pub struct Engine {
    registry: AdapterRegistry,
    specialties: Box<dyn SpecialtyLookup>,
    adapter_timeout: Duration,
}

impl Engine {
    pub fn new(registry: AdapterRegistry, specialties: Box<dyn SpecialtyLookup>) -> Self {
        Self {
            registry,
            specialties,
            adapter_timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AdapterRegistry::from_config(config),
            Box::new(WarehouseSpecialtyLookup::new(config.warehouse.clone())),
        )
        .with_adapter_timeout(config.engine.adapter_timeout())
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Aggregate with a textual campaign mode (`"custom"` or `"turnkey"`).
    pub async fn aggregate(
        &self,
        program_ids: &[i64],
        mode: &str,
    ) -> Result<AggregationReport, EngineError> {
        let mode: CampaignMode = mode.parse()?;
        self.aggregate_mode(program_ids, mode).await
    }

    pub async fn aggregate_mode(
        &self,
        program_ids: &[i64],
        mode: CampaignMode,
    ) -> Result<AggregationReport, EngineError> {
        let mut ids = program_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(EngineError::NoProgramIds);
        }

        let adapters = self.registry.for_mode(mode);
        let results = join_all(
            adapters
                .iter()
                .map(|adapter| run_adapter(*adapter, &ids, self.adapter_timeout)),
        )
        .await;
        let (batches, sources): (Vec<SourceBatch>, Vec<SourceReport>) =
            results.into_iter().unzip();

        let mut table = union_batches(batches);
        apply_activation_ranges(&mut table);
        let conflicts = propagate_program_metadata(&mut table.records);

        let npis = distinct_npis(&table);
        let specialties = self.lookup_specialties(&npis).await;
        attach_specialties(&mut table, &specialties);

        let report = AggregationReport {
            mode,
            program_ids: ids,
            table: project(&table, &REPORT_COLUMNS),
            sources,
            conflicts,
        };
        info!("{}", report.summary());
        Ok(report)
    }

    async fn lookup_specialties(&self, npis: &[String]) -> HashMap<String, String> {
        if npis.is_empty() {
            return HashMap::new();
        }
        match tokio::time::timeout(self.adapter_timeout, self.specialties.lookup(npis)).await {
            Ok(Ok(map)) => map,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to load provider specialties");
                HashMap::new()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.adapter_timeout.as_secs(),
                    "provider specialty lookup timed out"
                );
                HashMap::new()
            }
        }
    }
}

/// Run one adapter under `timeout`, collapsing failure to an empty batch.
///
/// Records outside the requested programs or carrying a source the adapter
/// does not own are dropped with a warning.
async fn run_adapter(
    adapter: &dyn SourceAdapter,
    program_ids: &[i64],
    timeout: Duration,
) -> (SourceBatch, SourceReport) {
    let kind = adapter.kind();
    let (records, outcome) = match tokio::time::timeout(timeout, adapter.fetch(program_ids)).await
    {
        Ok(Ok(mut records)) => {
            let before = records.len();
            records.retain(|r| {
                program_ids.binary_search(&r.program_identifier).is_ok()
                    && kind.sources().contains(&r.source())
            });
            if records.len() < before {
                warn!(
                    adapter = adapter.name(),
                    dropped = before - records.len(),
                    "dropped rows outside the requested programs or sources"
                );
            }
            let rows = records.len();
            (records, SourceOutcome::Fetched { rows })
        }
        Ok(Err(e)) => {
            warn!(adapter = adapter.name(), error = %e, "source query failed");
            (
                Vec::new(),
                SourceOutcome::Failed {
                    error: e.to_string(),
                },
            )
        }
        Err(_) => {
            warn!(
                adapter = adapter.name(),
                timeout_secs = timeout.as_secs(),
                "source query timed out"
            );
            (
                Vec::new(),
                SourceOutcome::TimedOut {
                    after_secs: timeout.as_secs(),
                },
            )
        }
    };

    let report = SourceReport {
        adapter: adapter.name().to_string(),
        kind,
        backend: adapter.backend(),
        outcome,
    };
    (SourceBatch::new(kind, records), report)
}

/// Parse free-form program id text (`"9365, 9364 9086"`).
///
/// Splits on commas and whitespace; tokens that are not integers are
/// skipped. Duplicates are kept in input order.
pub fn parse_program_ids(text: &str) -> Vec<i64> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<i64>().ok())
        .collect()
}
