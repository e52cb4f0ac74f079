//! # Engagement Fusion Core
//!
//! Pure, I/O-free stages of the engagement fusion pipeline: the typed
//! record model, activation-range decoding, union of heterogeneous source
//! batches, program metadata propagation, specialty enrichment, and
//! projection onto the reporting schema.
//!
//! This crate contains no tokio, sqlx, or network dependencies. Backend
//! adapters and orchestration live in the `engagement-fusion` crate.
//!
//! ## Stage order
//!
//! ```text
//! batches ─▶ union ─▶ decode ranges ─▶ propagate ─▶ enrich ─▶ project ─▶ Table
//! ```

pub mod enrich;
pub mod error;
pub mod models;
pub mod project;
pub mod propagate;
pub mod range;
pub mod table;
pub mod union;

pub use error::EngineError;
pub use models::{
    Backend, BannerInteraction, CampaignMode, EngagementRecord, ProgramMetadata, ProgramStatus,
    Source, SourceDetail, SourceKind,
};
pub use table::{Table, Value};
pub use union::{EngagementTable, SourceBatch};
