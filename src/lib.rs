//! # Engagement Fusion
//!
//! Builds one analysis-ready engagement table for a set of marketing
//! programs by querying several independent sources, aligning their rows,
//! and enriching them with program metadata and provider specialty.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │ Warehouse (Postgres) │   │ Operational (MySQL)  │
//! │ email / asset view / │   │ Choozle banners,     │
//! │ survey / AdButler    │   │ time-spent sessions  │
//! └──────────┬───────────┘   └──────────┬───────────┘
//!            │   SourceAdapter (async)   │ via SSH tunnel
//!            └─────────────┬─────────────┘
//!                          ▼
//!              ┌───────────────────────┐
//!              │ Engine::aggregate()   │
//!              │ union → ranges →      │
//!              │ propagate → enrich →  │
//!              │ project               │
//!              └───────────┬───────────┘
//!                          ▼
//!                 Table ─▶ CSV / JSON
//! ```
//!
//! The pure pipeline stages live in [`engagement_fusion_core`]; this crate
//! owns configuration, backend connections, adapters, and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! efx check all
//! efx aggregate "9365, 9364" --mode custom --output out/engagements.csv
//! efx time-spent 9365 --format json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Per-fetch Postgres and MySQL connections |
//! | [`tunnel`] | SSH port forward to the operational store |
//! | [`traits`] | `SourceAdapter` / `SpecialtyLookup` contracts and registry |
//! | [`adapter_warehouse`] | Email, asset view, survey, AdButler adapters |
//! | [`adapter_choozle`] | Choozle banner impressions and clicks |
//! | [`specialty`] | Provider specialty lookup |
//! | [`aggregate`] | The fusion engine |
//! | [`time_spent`] | App time-spent summary report |
//! | [`checks`] | Connection smoke tests |
//! | [`export`] | CSV and JSON output |

pub mod adapter_choozle;
pub mod adapter_warehouse;
pub mod aggregate;
pub mod checks;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod specialty;
pub mod time_spent;
pub mod traits;
pub mod tunnel;

pub use aggregate::{AggregationReport, Engine, SourceOutcome, SourceReport};
pub use engagement_fusion_core::{CampaignMode, EngineError, Table, Value};
