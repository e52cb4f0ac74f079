//! Provider specialty enrichment.
//!
//! The unified table is left-joined against a provider taxonomy keyed by
//! NPI. Because the taxonomy key is unique, the join never drops or
//! duplicates rows: unknown and null NPIs simply get a null specialty.

use std::collections::{BTreeSet, HashMap};

use crate::models::columns::SPECIALTY;
use crate::union::EngagementTable;

/// Distinct non-null NPIs in the table, sorted.
pub fn distinct_npis(table: &EngagementTable) -> Vec<String> {
    table
        .records
        .iter()
        .filter_map(|r| r.provider_npi.as_deref())
        .map(str::trim)
        .filter(|npi| !npi.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Attach specialties by NPI and add the `specialty` column.
///
/// An empty map (failed or empty lookup) nulls every specialty. A table with
/// no rows is left without the column. Returns the number of rows that
/// received a specialty.
pub fn attach_specialties(
    table: &mut EngagementTable,
    specialties: &HashMap<String, String>,
) -> usize {
    let mut matched = 0;
    for record in &mut table.records {
        record.specialty = record
            .provider_npi
            .as_deref()
            .and_then(|npi| specialties.get(npi.trim()))
            .cloned();
        if record.specialty.is_some() {
            matched += 1;
        }
    }
    if !table.is_empty() {
        table.add_column(SPECIALTY);
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngagementRecord, SourceDetail, SourceKind};
    use crate::union::{union_batches, SourceBatch};

    fn table_with(npis: &[Option<&str>]) -> EngagementTable {
        let records = npis
            .iter()
            .map(|npi| {
                let mut r = EngagementRecord::new(1, SourceDetail::AssetView);
                r.provider_npi = npi.map(String::from);
                r
            })
            .collect();
        union_batches(vec![SourceBatch::new(SourceKind::AssetView, records)])
    }

    #[test]
    fn test_distinct_npis_sorted_and_deduplicated() {
        let table = table_with(&[
            Some("1234567893"),
            None,
            Some("1003000126"),
            Some("1234567893"),
        ]);
        assert_eq!(distinct_npis(&table), vec!["1003000126", "1234567893"]);
    }

    #[test]
    fn test_null_npi_gets_null_specialty() {
        let mut table = table_with(&[None, Some("1234567893"), Some("1999999999")]);
        let map = HashMap::from([("1234567893".to_string(), "Cardiology".to_string())]);
        let matched = attach_specialties(&mut table, &map);

        assert_eq!(matched, 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.records[0].specialty, None);
        assert_eq!(table.records[1].specialty.as_deref(), Some("Cardiology"));
        assert_eq!(table.records[2].specialty, None);
        assert!(table.has_column(SPECIALTY));
    }

    #[test]
    fn test_empty_lookup_nulls_everything() {
        let mut table = table_with(&[Some("1234567893")]);
        table.records[0].specialty = Some("stale".to_string());
        attach_specialties(&mut table, &HashMap::new());
        assert_eq!(table.records[0].specialty, None);
        assert!(table.has_column(SPECIALTY));
    }

    #[test]
    fn test_empty_table_gets_no_specialty_column() {
        let mut table = union_batches(Vec::new());
        assert_eq!(attach_specialties(&mut table, &HashMap::new()), 0);
        assert!(!table.has_column(SPECIALTY));
        assert!(table.columns.is_empty());
    }
}
