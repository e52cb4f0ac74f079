//! Program metadata propagation.
//!
//! Program-level attributes are sparse: a source query may carry the program
//! name on some rows and not others. Within each `program_identifier` group
//! this stage resolves every attribute to the first non-null value in row
//! order and writes it onto every row of the group.
//!
//! The result matches a forward-fill followed by a backward-fill when the
//! non-null values of a group agree. When they disagree, the first value
//! wins and a [`MetadataConflict`] is reported instead of being silently
//! absorbed. Running the stage twice yields the same records.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::models::columns::{
    PROGRAM_DRUG_BRAND_NAME, PROGRAM_END_DATE, PROGRAM_NAME, PROGRAM_START_DATE, PROGRAM_STATUS,
};
use crate::models::{EngagementRecord, ProgramMetadata};

/// The five propagated program-level attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramAttribute {
    Name,
    DrugBrandName,
    StartDate,
    EndDate,
    Status,
}

impl ProgramAttribute {
    pub fn column(&self) -> &'static str {
        match self {
            ProgramAttribute::Name => PROGRAM_NAME,
            ProgramAttribute::DrugBrandName => PROGRAM_DRUG_BRAND_NAME,
            ProgramAttribute::StartDate => PROGRAM_START_DATE,
            ProgramAttribute::EndDate => PROGRAM_END_DATE,
            ProgramAttribute::Status => PROGRAM_STATUS,
        }
    }
}

/// Two distinct non-null values seen for one attribute of one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataConflict {
    pub program_identifier: i64,
    pub attribute: ProgramAttribute,
    pub kept: String,
    pub discarded: String,
}

impl fmt::Display for MetadataConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "program {} has conflicting {} values: kept '{}', discarded '{}'",
            self.program_identifier,
            self.attribute.column(),
            self.kept,
            self.discarded
        )
    }
}

fn reduce<T: Clone + PartialEq + fmt::Display>(
    resolved: &mut Option<T>,
    candidate: &Option<T>,
    program_identifier: i64,
    attribute: ProgramAttribute,
    conflicts: &mut Vec<MetadataConflict>,
) {
    let Some(value) = candidate else {
        return;
    };
    match resolved {
        None => *resolved = Some(value.clone()),
        Some(existing) if existing != value => {
            let conflict = MetadataConflict {
                program_identifier,
                attribute,
                kept: existing.to_string(),
                discarded: value.to_string(),
            };
            if !conflicts.contains(&conflict) {
                conflicts.push(conflict);
            }
        }
        Some(_) => {}
    }
}

/// Resolve and propagate program metadata in place.
///
/// Returns every conflict found, ordered by program identifier. Each conflict
/// is also logged at `warn` level.
pub fn propagate_program_metadata(records: &mut [EngagementRecord]) -> Vec<MetadataConflict> {
    let mut resolved: BTreeMap<i64, ProgramMetadata> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for record in records.iter() {
        let id = record.program_identifier;
        let slot = resolved.entry(id).or_default();
        let meta = &record.program;
        reduce(&mut slot.name, &meta.name, id, ProgramAttribute::Name, &mut conflicts);
        reduce(
            &mut slot.drug_brand_name,
            &meta.drug_brand_name,
            id,
            ProgramAttribute::DrugBrandName,
            &mut conflicts,
        );
        reduce(
            &mut slot.start_date,
            &meta.start_date,
            id,
            ProgramAttribute::StartDate,
            &mut conflicts,
        );
        reduce(
            &mut slot.end_date,
            &meta.end_date,
            id,
            ProgramAttribute::EndDate,
            &mut conflicts,
        );
        reduce(
            &mut slot.status,
            &meta.status,
            id,
            ProgramAttribute::Status,
            &mut conflicts,
        );
    }

    for record in records.iter_mut() {
        if let Some(meta) = resolved.get(&record.program_identifier) {
            record.program = meta.clone();
        }
    }

    conflicts.sort_by_key(|c| c.program_identifier);
    for conflict in &conflicts {
        warn!(
            program_identifier = conflict.program_identifier,
            attribute = conflict.attribute.column(),
            kept = %conflict.kept,
            discarded = %conflict.discarded,
            "conflicting program metadata"
        );
    }

    conflicts
}
