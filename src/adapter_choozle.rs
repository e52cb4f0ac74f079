//! Choozle banner engagements from the operational store.
//!
//! Banner activity lives in `healthst_media.tbl_banner_data` and is limited
//! to providers present in the program's BTL concentrate
//! (`healthst_master.tbl_btl_concentrate`). The query groups by raw activity
//! label; [`collapse_by_interaction`] then classifies each label as an
//! impression or a click and merges rows that land in the same class,
//! keeping the latest engagement date.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::mysql::MySqlRow;
use sqlx::Row;
use tracing::{debug, info};

use engagement_fusion_core::{BannerInteraction, EngagementRecord, SourceDetail, SourceKind};

use crate::config::OperationalConfig;
use crate::db;
use crate::error::SourceError;
use crate::traits::SourceAdapter;

/// One grouped row as returned by the operational store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerActivityRow {
    pub program_identifier: i64,
    pub provider_npi: Option<String>,
    pub engaged_on: Option<NaiveDate>,
    pub ad_name: Option<String>,
    pub activity: Option<String>,
    pub link_url: Option<String>,
}

pub struct ChoozleAdapter {
    config: OperationalConfig,
}

impl ChoozleAdapter {
    pub fn new(config: OperationalConfig) -> Self {
        Self { config }
    }
}

/// Build the banner query for `count` program ids.
///
/// The placeholder list appears twice; bind the ids twice, in order.
fn banner_query(count: usize) -> String {
    let placeholders = vec!["?"; count].join(", ");
    format!(
        r#"
        SELECT
            CAST(bd.PRG_ID AS SIGNED) AS program_identifier,
            CAST(bd.npiNumber AS CHAR) AS provider_npi,
            CAST(MAX(bd.date) AS DATE) AS engaged_on,
            bd.ad_name AS choozle_banner_ad_name,
            bd.activity AS activity,
            bd.destination_url AS choozle_banner_link_url
        FROM healthst_media.tbl_banner_data bd
        WHERE bd.PRG_ID IN ({placeholders})
          AND bd.npiNumber IN (
              SELECT c.npi
              FROM healthst_master.tbl_btl_concentrate c
              WHERE c.fk_prgID IN ({placeholders})
          )
        GROUP BY bd.PRG_ID, bd.npiNumber, bd.ad_name, bd.activity, bd.destination_url
        "#
    )
}

fn map_row(row: &MySqlRow) -> Result<BannerActivityRow, sqlx::Error> {
    Ok(BannerActivityRow {
        program_identifier: row.try_get("program_identifier")?,
        provider_npi: row.try_get("provider_npi")?,
        engaged_on: row.try_get("engaged_on")?,
        ad_name: row.try_get("choozle_banner_ad_name")?,
        activity: row.try_get("activity")?,
        link_url: row.try_get("choozle_banner_link_url")?,
    })
}

/// Classify activity labels and merge rows of the same interaction class.
///
/// Rows sharing program, provider, ad name, class, and link URL collapse
/// into one record dated with the latest `engaged_on`. Output keeps the
/// first-seen order of each merged key.
pub fn collapse_by_interaction(rows: Vec<BannerActivityRow>) -> Vec<EngagementRecord> {
    type Key = (
        i64,
        Option<String>,
        Option<String>,
        BannerInteraction,
        Option<String>,
    );

    let mut index: HashMap<Key, usize> = HashMap::new();
    let mut records: Vec<EngagementRecord> = Vec::new();

    for row in rows {
        let interaction = BannerInteraction::classify(row.activity.as_deref().unwrap_or(""));
        let key: Key = (
            row.program_identifier,
            row.provider_npi.clone(),
            row.ad_name.clone(),
            interaction,
            row.link_url.clone(),
        );

        if let Some(&i) = index.get(&key) {
            let existing = &mut records[i];
            existing.engaged_on = existing.engaged_on.max(row.engaged_on);
            continue;
        }

        let mut record = EngagementRecord::new(
            row.program_identifier,
            SourceDetail::Choozle {
                interaction,
                ad_name: row.ad_name,
                link_url: row.link_url,
            },
        );
        record.provider_npi = row.provider_npi;
        record.engaged_on = row.engaged_on;
        record.engagement_type = Some(interaction.source().as_str().to_string());

        index.insert(key, records.len());
        records.push(record);
    }

    records
}

#[async_trait]
impl SourceAdapter for ChoozleAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Choozle
    }

    async fn fetch(&self, program_ids: &[i64]) -> Result<Vec<EngagementRecord>, SourceError> {
        let sql = banner_query(program_ids.len());
        let mut operational = db::connect_operational(&self.config).await?;

        debug!(?program_ids, "running Choozle banner query");
        let mut query = sqlx::query(&sql);
        for id in program_ids.iter().chain(program_ids.iter()) {
            query = query.bind(*id);
        }
        let result = query.fetch_all(&mut operational.conn).await;
        operational.close().await;

        let rows = result.map_err(SourceError::Query)?;
        let activity = rows
            .iter()
            .map(map_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let records = collapse_by_interaction(activity);
        info!(
            "Pulled {} Choozle banner engagements for {:?}",
            records.len(),
            program_ids
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engagement_fusion_core::Source;

    fn row(activity: Option<&str>, day: u32) -> BannerActivityRow {
        BannerActivityRow {
            program_identifier: 9123,
            provider_npi: Some("1234567893".to_string()),
            engaged_on: NaiveDate::from_ymd_opt(2024, 3, day),
            ad_name: Some("Leaderboard 728x90".to_string()),
            activity: activity.map(String::from),
            link_url: Some("https://example.com/druga".to_string()),
        }
    }

    #[test]
    fn test_ad_view_is_impression() {
        let records = collapse_by_interaction(vec![row(Some("Ad View"), 1)]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source(), Source::ChoozleBannerImpression);
        assert_eq!(
            records[0].engagement_type.as_deref(),
            Some("choozle_banner_impression")
        );
    }

    #[test]
    fn test_other_labels_merge_into_one_click() {
        let records = collapse_by_interaction(vec![
            row(Some("Ad Click"), 4),
            row(Some("Landing Page Visit"), 9),
            row(None, 2),
        ]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source(), Source::ChoozleBannerClick);
        assert_eq!(records[0].engaged_on, NaiveDate::from_ymd_opt(2024, 3, 9));
    }

    #[test]
    fn test_impressions_and_clicks_stay_separate() {
        let records = collapse_by_interaction(vec![
            row(Some("Ad View"), 1),
            row(Some("Ad Click"), 2),
            row(Some("Ad View"), 5),
        ]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source(), Source::ChoozleBannerImpression);
        assert_eq!(records[0].engaged_on, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(records[1].source(), Source::ChoozleBannerClick);
    }

    #[test]
    fn test_different_providers_not_merged() {
        let mut other = row(Some("Ad View"), 1);
        other.provider_npi = Some("1003000126".to_string());
        let records = collapse_by_interaction(vec![row(Some("Ad View"), 1), other]);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_query_placeholders_bound_twice() {
        let sql = banner_query(3);
        assert_eq!(sql.matches('?').count(), 6);
        assert!(sql.contains("tbl_btl_concentrate"));
    }
}
