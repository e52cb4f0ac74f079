//! Warehouse (Postgres) source adapters.
//!
//! Email engagements, asset views, survey responses, and AdButler banner
//! impressions all live in the warehouse's `dbt` schema. Each kind has one
//! query selecting exactly the columns declared by
//! [`SourceKind::columns`], restricted to the requested programs through a
//! single array parameter (`= ANY($1)`).
//!
//! Columns are cast in SQL (`::bigint`, `::text`, `::timestamp`) so row
//! decoding does not depend on the exact warehouse column types. The
//! activation multirange is read in its text form and decoded later by
//! [`engagement_fusion_core::range`].

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Connection, Row};
use tracing::{debug, info};

use engagement_fusion_core::{EngagementRecord, SourceDetail, SourceKind};

use crate::config::WarehouseConfig;
use crate::db;
use crate::error::SourceError;
use crate::traits::SourceAdapter;

const EMAIL_QUERY: &str = r#"
    SELECT
        ee.program_identifier::bigint AS program_identifier,
        ee.program_name::text AS program_name,
        ee.program_drug_brand_name::text AS program_drug_brand_name,
        ee.program_activation_ranges::text AS program_activation_ranges,
        ee.provider_npi::text AS provider_npi,
        ee.email_campaign_identifier::text AS email_campaign_identifier,
        ee.email_campaign_subject::text AS email_campaign_subject,
        ee.email_campaign_link_url::text AS email_campaign_link_url,
        ee.engaged_at::timestamp AS engaged_at,
        ee.engagement_type::text AS engagement_type
    FROM dbt.email_engagements ee
    WHERE ee.program_identifier = ANY($1)
"#;

const ASSET_VIEW_QUERY: &str = r#"
    SELECT
        av.program_identifier::bigint AS program_identifier,
        av.program_name::text AS program_name,
        av.program_drug_brand_name::text AS program_drug_brand_name,
        av.provider_npi::text AS provider_npi,
        av.engaged_at::timestamp AS engaged_at
    FROM dbt.asset_views av
    WHERE av.program_identifier = ANY($1)
"#;

const SURVEY_RESPONSE_QUERY: &str = r#"
    SELECT
        sr.program_identifier::bigint AS program_identifier,
        sr.program_name::text AS program_name,
        sr.provider_npi::text AS provider_npi,
        sr.survey_question_number::text AS survey_question_number,
        sr.survey_response::text AS survey_response,
        sr.survey_location::text AS survey_location,
        sr.engaged_at::timestamp AS engaged_at
    FROM dbt.survey_responses sr
    WHERE sr.program_identifier = ANY($1)
"#;

const ADBUTLER_QUERY: &str = r#"
    SELECT
        bai.program_identifier::bigint AS program_identifier,
        bai.program_name::text AS program_name,
        bai.program_drug_brand_name::text AS program_drug_brand_name,
        bai.provider_npi::text AS provider_npi,
        bai.engaged_on::date AS engaged_on,
        bai.engagement_type::text AS engagement_type
    FROM dbt.banner_ad_impressions bai
    WHERE bai.program_identifier = ANY($1)
"#;

/// One warehouse-backed source.
pub struct WarehouseAdapter {
    kind: SourceKind,
    config: WarehouseConfig,
}

impl WarehouseAdapter {
    /// Adapter for `kind`. Non-warehouse kinds fail every fetch with
    /// [`SourceError::Unavailable`].
    pub fn new(kind: SourceKind, config: WarehouseConfig) -> Self {
        Self { kind, config }
    }
}

fn query_for(kind: SourceKind) -> Option<&'static str> {
    match kind {
        SourceKind::Email => Some(EMAIL_QUERY),
        SourceKind::AssetView => Some(ASSET_VIEW_QUERY),
        SourceKind::SurveyResponse => Some(SURVEY_RESPONSE_QUERY),
        SourceKind::AdButler => Some(ADBUTLER_QUERY),
        SourceKind::Choozle => None,
    }
}

#[async_trait]
impl SourceAdapter for WarehouseAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, program_ids: &[i64]) -> Result<Vec<EngagementRecord>, SourceError> {
        let sql = query_for(self.kind)
            .ok_or_else(|| SourceError::Unavailable(format!("no warehouse query for {}", self.kind)))?;

        let mut conn = db::connect_warehouse(&self.config).await?;
        debug!(source = %self.kind, ?program_ids, "running warehouse query");
        let result = sqlx::query(sql)
            .bind(program_ids.to_vec())
            .fetch_all(&mut conn)
            .await;
        let _ = conn.close().await;

        let rows = result.map_err(SourceError::Query)?;
        let records = rows
            .iter()
            .map(|row| map_row(self.kind, row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        info!("Pulled {} {} for {:?}", records.len(), self.kind, program_ids);
        Ok(records)
    }
}

fn text(row: &PgRow, column: &str) -> Result<Option<String>, sqlx::Error> {
    row.try_get::<Option<String>, _>(column)
}

fn map_row(kind: SourceKind, row: &PgRow) -> Result<EngagementRecord, sqlx::Error> {
    let program_identifier: i64 = row.try_get("program_identifier")?;

    let detail = match kind {
        SourceKind::Email => SourceDetail::Email {
            campaign_identifier: text(row, "email_campaign_identifier")?,
            subject: text(row, "email_campaign_subject")?,
            link_url: text(row, "email_campaign_link_url")?,
        },
        SourceKind::SurveyResponse => SourceDetail::SurveyResponse {
            question_number: text(row, "survey_question_number")?,
            response: text(row, "survey_response")?,
            location: text(row, "survey_location")?,
        },
        SourceKind::AdButler => SourceDetail::AdButler,
        _ => SourceDetail::AssetView,
    };

    let mut record = EngagementRecord::new(program_identifier, detail);
    record.provider_npi = text(row, "provider_npi")?;
    record.program.name = text(row, "program_name")?;

    if matches!(
        kind,
        SourceKind::Email | SourceKind::AssetView | SourceKind::AdButler
    ) {
        record.program.drug_brand_name = text(row, "program_drug_brand_name")?;
    }
    match kind {
        SourceKind::Email => {
            record.activation_ranges = text(row, "program_activation_ranges")?;
            record.engaged_at = row.try_get("engaged_at")?;
            record.engagement_type = text(row, "engagement_type")?;
        }
        SourceKind::AdButler => {
            record.engaged_on = row.try_get("engaged_on")?;
            record.engagement_type = text(row, "engagement_type")?;
        }
        _ => {
            record.engaged_at = row.try_get("engaged_at")?;
        }
    }

    Ok(record)
}
