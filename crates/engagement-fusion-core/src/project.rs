//! Projection onto the reporting schema.

use crate::models::columns::*;
use crate::table::Table;
use crate::union::EngagementTable;

/// Canonical reporting columns, in output order.
pub const REPORT_COLUMNS: [&str; 20] = [
    PROGRAM_IDENTIFIER,
    PROGRAM_NAME,
    PROGRAM_DRUG_BRAND_NAME,
    PROGRAM_START_DATE,
    PROGRAM_END_DATE,
    PROGRAM_STATUS,
    PROVIDER_NPI,
    SPECIALTY,
    EMAIL_CAMPAIGN_IDENTIFIER,
    EMAIL_CAMPAIGN_SUBJECT,
    EMAIL_CAMPAIGN_LINK_URL,
    CHOOZLE_BANNER_AD_NAME,
    CHOOZLE_BANNER_LINK_URL,
    ENGAGED_ON,
    ENGAGED_AT,
    ENGAGEMENT_TYPE,
    SOURCE,
    SURVEY_QUESTION_NUMBER,
    SURVEY_RESPONSE,
    SURVEY_LOCATION,
];

/// Widen typed records into a [`Table`] restricted to `canonical`.
///
/// Only canonical columns present in `table` are kept, in canonical order.
/// Canonical columns no batch populated are omitted rather than null-filled.
pub fn project(table: &EngagementTable, canonical: &[&str]) -> Table {
    let columns: Vec<&str> = canonical
        .iter()
        .copied()
        .filter(|c| table.has_column(c))
        .collect();

    let mut out = Table::new(columns.iter().map(|c| c.to_string()).collect());
    for record in &table.records {
        out.push_row(columns.iter().map(|c| record.cell(c)).collect());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngagementRecord, SourceDetail, SourceKind};
    use crate::table::Value;
    use crate::union::{union_batches, SourceBatch};

    #[test]
    fn test_intersection_in_canonical_order() {
        let mut record = EngagementRecord::new(
            42,
            SourceDetail::SurveyResponse {
                question_number: Some("3".to_string()),
                response: Some("Yes".to_string()),
                location: None,
            },
        );
        record.program.name = Some("Trial".to_string());
        let mut table = union_batches(vec![SourceBatch::new(
            SourceKind::SurveyResponse,
            vec![record],
        )]);
        table.add_column("internal_only");

        let projected = project(&table, &REPORT_COLUMNS);
        assert_eq!(
            projected.columns,
            vec![
                "program_identifier",
                "program_name",
                "provider_npi",
                "engaged_at",
                "source",
                "survey_question_number",
                "survey_response",
                "survey_location",
            ]
        );
        assert_eq!(projected.rows[0][0], Value::Int(42));
        assert_eq!(projected.rows[0][4], Value::Text("survey_response".into()));
        assert_eq!(projected.rows[0][7], Value::Null);
    }

    #[test]
    fn test_never_invents_columns() {
        let table = union_batches(vec![SourceBatch::with_columns(
            SourceKind::AssetView,
            vec![SOURCE, "asset_debug"],
            vec![EngagementRecord::new(1, SourceDetail::AssetView)],
        )]);
        let projected = project(&table, &REPORT_COLUMNS);
        assert_eq!(projected.columns, vec!["source"]);
    }

    #[test]
    fn test_empty_table_projects_to_no_rows() {
        let projected = project(&EngagementTable::default(), &REPORT_COLUMNS);
        assert!(projected.columns.is_empty());
        assert!(projected.is_empty());
    }
}
