//! Union of heterogeneous source batches.
//!
//! Each adapter returns a [`SourceBatch`]: its records plus the columns its
//! query populates. [`union_batches`] concatenates them into one
//! [`EngagementTable`] whose column set is the ordered union of the columns
//! of every non-empty batch. Columns a record's source does not populate read
//! as null through [`EngagementRecord::cell`].

use tracing::debug;

use crate::models::{EngagementRecord, SourceKind};

/// Records returned by one adapter invocation.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub kind: SourceKind,
    pub columns: Vec<&'static str>,
    pub records: Vec<EngagementRecord>,
}

impl SourceBatch {
    /// Batch with the columns declared by `kind`.
    pub fn new(kind: SourceKind, records: Vec<EngagementRecord>) -> Self {
        Self {
            kind,
            columns: kind.columns().to_vec(),
            records,
        }
    }

    /// Batch with an explicit column list.
    pub fn with_columns(
        kind: SourceKind,
        columns: Vec<&'static str>,
        records: Vec<EngagementRecord>,
    ) -> Self {
        Self {
            kind,
            columns,
            records,
        }
    }

    pub fn empty(kind: SourceKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The unified record set flowing through decode, propagate, and enrich.
#[derive(Debug, Clone, Default)]
pub struct EngagementTable {
    pub columns: Vec<&'static str>,
    pub records: Vec<EngagementRecord>,
}

impl EngagementTable {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| *c == column)
    }

    /// Append a column name unless already present.
    pub fn add_column(&mut self, column: &'static str) {
        if !self.has_column(column) {
            self.columns.push(column);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Concatenate batches in order.
///
/// Empty batches contribute neither rows nor columns. Columns appear in
/// first-seen order across the remaining batches.
pub fn union_batches(batches: Vec<SourceBatch>) -> EngagementTable {
    let mut table = EngagementTable::default();
    for batch in batches {
        if batch.is_empty() {
            debug!(source = %batch.kind, "skipping empty batch");
            continue;
        }
        debug!(source = %batch.kind, rows = batch.records.len(), "appending batch");
        for column in batch.columns {
            table.add_column(column);
        }
        table.records.extend(batch.records);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::columns::*;
    use crate::models::SourceDetail;

    fn asset(program: i64) -> EngagementRecord {
        EngagementRecord::new(program, SourceDetail::AssetView)
    }

    fn email(program: i64) -> EngagementRecord {
        EngagementRecord::new(
            program,
            SourceDetail::Email {
                campaign_identifier: None,
                subject: None,
                link_url: None,
            },
        )
    }

    #[test]
    fn test_disjoint_columns_sum() {
        let table = union_batches(vec![
            SourceBatch::with_columns(
                SourceKind::Email,
                vec![EMAIL_CAMPAIGN_SUBJECT, EMAIL_CAMPAIGN_LINK_URL],
                vec![email(1), email(1)],
            ),
            SourceBatch::with_columns(
                SourceKind::AssetView,
                vec![PROVIDER_NPI],
                vec![asset(1)],
            ),
            SourceBatch::with_columns(
                SourceKind::SurveyResponse,
                vec![SURVEY_RESPONSE, SURVEY_LOCATION],
                vec![EngagementRecord::new(
                    1,
                    SourceDetail::SurveyResponse {
                        question_number: None,
                        response: None,
                        location: None,
                    },
                )],
            ),
        ]);
        assert_eq!(table.columns.len(), 5);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_shared_columns_deduplicated_in_first_seen_order() {
        let table = union_batches(vec![
            SourceBatch::new(SourceKind::AssetView, vec![asset(1)]),
            SourceBatch::new(SourceKind::Email, vec![email(1)]),
        ]);
        assert_eq!(table.columns[0], PROGRAM_IDENTIFIER);
        assert_eq!(
            table.columns.iter().filter(|c| **c == SOURCE).count(),
            1
        );
        assert!(table.has_column(EMAIL_CAMPAIGN_SUBJECT));
        let unique: std::collections::HashSet<_> = SourceKind::AssetView
            .columns()
            .iter()
            .chain(SourceKind::Email.columns())
            .collect();
        assert_eq!(table.columns.len(), unique.len());
    }

    #[test]
    fn test_empty_batches_contribute_nothing() {
        let table = union_batches(vec![
            SourceBatch::new(SourceKind::Email, vec![email(1)]),
            SourceBatch::empty(SourceKind::SurveyResponse),
        ]);
        assert!(!table.has_column(SURVEY_RESPONSE));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_all_empty() {
        let table = union_batches(vec![SourceBatch::empty(SourceKind::Email)]);
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }
}
