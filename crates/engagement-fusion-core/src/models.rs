//! Core data models for the engagement fusion pipeline.
//!
//! Each source adapter produces [`EngagementRecord`]s whose source-specific
//! fields live in a tagged [`SourceDetail`] variant. The wide reporting
//! schema only exists at the [`Table`](crate::table::Table) boundary, built
//! through [`EngagementRecord::cell`].

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::EngineError;
use crate::table::Value;

/// Column names shared by the union, projection, and export stages.
pub mod columns {
    pub const PROGRAM_IDENTIFIER: &str = "program_identifier";
    pub const PROGRAM_NAME: &str = "program_name";
    pub const PROGRAM_DRUG_BRAND_NAME: &str = "program_drug_brand_name";
    pub const PROGRAM_START_DATE: &str = "program_start_date";
    pub const PROGRAM_END_DATE: &str = "program_end_date";
    pub const PROGRAM_STATUS: &str = "program_status";
    pub const PROGRAM_ACTIVATION_RANGES: &str = "program_activation_ranges";
    pub const PROVIDER_NPI: &str = "provider_npi";
    pub const SPECIALTY: &str = "specialty";
    pub const EMAIL_CAMPAIGN_IDENTIFIER: &str = "email_campaign_identifier";
    pub const EMAIL_CAMPAIGN_SUBJECT: &str = "email_campaign_subject";
    pub const EMAIL_CAMPAIGN_LINK_URL: &str = "email_campaign_link_url";
    pub const CHOOZLE_BANNER_AD_NAME: &str = "choozle_banner_ad_name";
    pub const CHOOZLE_BANNER_LINK_URL: &str = "choozle_banner_link_url";
    pub const ENGAGED_ON: &str = "engaged_on";
    pub const ENGAGED_AT: &str = "engaged_at";
    pub const ENGAGEMENT_TYPE: &str = "engagement_type";
    pub const SOURCE: &str = "source";
    pub const SURVEY_QUESTION_NUMBER: &str = "survey_question_number";
    pub const SURVEY_RESPONSE: &str = "survey_response";
    pub const SURVEY_LOCATION: &str = "survey_location";
}

use columns::*;

/// Label of the source that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    EmailEngagement,
    AssetView,
    SurveyResponse,
    AdbutlerBannerAd,
    ChoozleBannerImpression,
    ChoozleBannerClick,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::EmailEngagement => "email_engagement",
            Source::AssetView => "asset_view",
            Source::SurveyResponse => "survey_response",
            Source::AdbutlerBannerAd => "adbutler_banner_ad",
            Source::ChoozleBannerImpression => "choozle_banner_impression",
            Source::ChoozleBannerClick => "choozle_banner_click",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backing store an adapter reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Analytical warehouse (Postgres, dbt schema).
    Warehouse,
    /// Operational store (MySQL, usually behind an SSH tunnel).
    Operational,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Warehouse => "warehouse",
            Backend::Operational => "operational",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One kind of source adapter.
///
/// A kind may produce more than one [`Source`] label: the Choozle adapter
/// splits its rows into impressions and clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Email,
    AssetView,
    SurveyResponse,
    AdButler,
    Choozle,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Email => "email engagements",
            SourceKind::AssetView => "asset views",
            SourceKind::SurveyResponse => "survey responses",
            SourceKind::AdButler => "AdButler banner impressions",
            SourceKind::Choozle => "Choozle banner engagements",
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            SourceKind::Choozle => Backend::Operational,
            _ => Backend::Warehouse,
        }
    }

    /// Source labels this kind of adapter may emit.
    pub fn sources(&self) -> &'static [Source] {
        match self {
            SourceKind::Email => &[Source::EmailEngagement],
            SourceKind::AssetView => &[Source::AssetView],
            SourceKind::SurveyResponse => &[Source::SurveyResponse],
            SourceKind::AdButler => &[Source::AdbutlerBannerAd],
            SourceKind::Choozle => &[Source::ChoozleBannerImpression, Source::ChoozleBannerClick],
        }
    }

    /// Columns populated by this adapter's query, in query order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Email => &[
                PROGRAM_IDENTIFIER,
                PROGRAM_NAME,
                PROGRAM_DRUG_BRAND_NAME,
                PROGRAM_ACTIVATION_RANGES,
                PROVIDER_NPI,
                EMAIL_CAMPAIGN_IDENTIFIER,
                EMAIL_CAMPAIGN_SUBJECT,
                EMAIL_CAMPAIGN_LINK_URL,
                ENGAGED_AT,
                ENGAGEMENT_TYPE,
                SOURCE,
            ],
            SourceKind::AssetView => &[
                PROGRAM_IDENTIFIER,
                PROGRAM_NAME,
                PROGRAM_DRUG_BRAND_NAME,
                PROVIDER_NPI,
                ENGAGED_AT,
                SOURCE,
            ],
            SourceKind::SurveyResponse => &[
                PROGRAM_IDENTIFIER,
                PROGRAM_NAME,
                PROVIDER_NPI,
                SURVEY_QUESTION_NUMBER,
                SURVEY_RESPONSE,
                SURVEY_LOCATION,
                ENGAGED_AT,
                SOURCE,
            ],
            SourceKind::AdButler => &[
                PROGRAM_IDENTIFIER,
                PROGRAM_NAME,
                PROGRAM_DRUG_BRAND_NAME,
                PROVIDER_NPI,
                ENGAGED_ON,
                ENGAGEMENT_TYPE,
                SOURCE,
            ],
            SourceKind::Choozle => &[
                PROGRAM_IDENTIFIER,
                PROVIDER_NPI,
                ENGAGED_ON,
                CHOOZLE_BANNER_AD_NAME,
                ENGAGEMENT_TYPE,
                CHOOZLE_BANNER_LINK_URL,
                SOURCE,
            ],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Campaign type selecting which sources participate in an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignMode {
    /// Email, asset views, survey responses, and Choozle banners.
    Custom,
    /// Email and AdButler banners.
    Turnkey,
}

impl CampaignMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignMode::Custom => "custom",
            CampaignMode::Turnkey => "turnkey",
        }
    }

    /// Adapter kinds invoked for this mode, in invocation order.
    pub fn source_kinds(&self) -> &'static [SourceKind] {
        match self {
            CampaignMode::Custom => &[
                SourceKind::Email,
                SourceKind::AssetView,
                SourceKind::SurveyResponse,
                SourceKind::Choozle,
            ],
            CampaignMode::Turnkey => &[SourceKind::Email, SourceKind::AdButler],
        }
    }

    /// Every source label a record may carry under this mode.
    pub fn allowed_sources(&self) -> Vec<Source> {
        self.source_kinds()
            .iter()
            .flat_map(|kind| kind.sources().iter().copied())
            .collect()
    }
}

impl FromStr for CampaignMode {
    type Err = EngineError;

    /// Only the exact lowercase names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "custom" => Ok(CampaignMode::Custom),
            "turnkey" => Ok(CampaignMode::Turnkey),
            _ => Err(EngineError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for CampaignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded program run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    /// At least one activation interval is open-ended.
    Active,
    /// Every activation interval has an end.
    Complete,
}

impl ProgramStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramStatus::Active => "active",
            ProgramStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Banner interaction class for Choozle rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerInteraction {
    Impression,
    Click,
}

impl BannerInteraction {
    /// The only activity label counted as an impression. Every other label
    /// is treated as a click; pending confirmation with the data owner.
    pub const IMPRESSION_ACTIVITY: &'static str = "Ad View";

    /// Classify a raw Choozle activity label.
    pub fn classify(activity: &str) -> Self {
        if activity == Self::IMPRESSION_ACTIVITY {
            BannerInteraction::Impression
        } else {
            BannerInteraction::Click
        }
    }

    pub fn source(&self) -> Source {
        match self {
            BannerInteraction::Impression => Source::ChoozleBannerImpression,
            BannerInteraction::Click => Source::ChoozleBannerClick,
        }
    }
}

/// Sparse program-level attributes carried on every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramMetadata {
    pub name: Option<String>,
    pub drug_brand_name: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub status: Option<ProgramStatus>,
}

/// Source-specific fields, one variant per adapter kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDetail {
    Email {
        campaign_identifier: Option<String>,
        subject: Option<String>,
        link_url: Option<String>,
    },
    AssetView,
    SurveyResponse {
        question_number: Option<String>,
        response: Option<String>,
        location: Option<String>,
    },
    AdButler,
    Choozle {
        interaction: BannerInteraction,
        ad_name: Option<String>,
        link_url: Option<String>,
    },
}

impl SourceDetail {
    pub fn source(&self) -> Source {
        match self {
            SourceDetail::Email { .. } => Source::EmailEngagement,
            SourceDetail::AssetView => Source::AssetView,
            SourceDetail::SurveyResponse { .. } => Source::SurveyResponse,
            SourceDetail::AdButler => Source::AdbutlerBannerAd,
            SourceDetail::Choozle { interaction, .. } => interaction.source(),
        }
    }
}

/// One engagement row of the unified result.
///
/// The source label is derived from [`detail`](EngagementRecord::detail)
/// and cannot be reassigned independently of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementRecord {
    pub program_identifier: i64,
    pub provider_npi: Option<String>,
    pub engaged_on: Option<NaiveDate>,
    pub engaged_at: Option<NaiveDateTime>,
    pub engagement_type: Option<String>,
    /// Encoded activation intervals, decoded by [`crate::range`].
    pub activation_ranges: Option<String>,
    pub program: ProgramMetadata,
    pub specialty: Option<String>,
    pub detail: SourceDetail,
}

impl EngagementRecord {
    pub fn new(program_identifier: i64, detail: SourceDetail) -> Self {
        Self {
            program_identifier,
            provider_npi: None,
            engaged_on: None,
            engaged_at: None,
            engagement_type: None,
            activation_ranges: None,
            program: ProgramMetadata::default(),
            specialty: None,
            detail,
        }
    }

    pub fn source(&self) -> Source {
        self.detail.source()
    }

    /// Value of a named reporting column for this record.
    ///
    /// Columns that do not apply to the record's source, and unknown
    /// column names, yield [`Value::Null`].
    pub fn cell(&self, column: &str) -> Value {
        match column {
            PROGRAM_IDENTIFIER => Value::Int(self.program_identifier),
            PROGRAM_NAME => Value::text(&self.program.name),
            PROGRAM_DRUG_BRAND_NAME => Value::text(&self.program.drug_brand_name),
            PROGRAM_START_DATE => Value::timestamp(self.program.start_date),
            PROGRAM_END_DATE => Value::timestamp(self.program.end_date),
            PROGRAM_STATUS => self
                .program
                .status
                .map(|s| Value::Text(s.as_str().to_string()))
                .unwrap_or(Value::Null),
            PROGRAM_ACTIVATION_RANGES => Value::text(&self.activation_ranges),
            PROVIDER_NPI => Value::text(&self.provider_npi),
            SPECIALTY => Value::text(&self.specialty),
            ENGAGED_ON => self.engaged_on.map(Value::Date).unwrap_or(Value::Null),
            ENGAGED_AT => Value::timestamp(self.engaged_at),
            ENGAGEMENT_TYPE => Value::text(&self.engagement_type),
            SOURCE => Value::Text(self.source().as_str().to_string()),
            _ => self.detail_cell(column),
        }
    }

    fn detail_cell(&self, column: &str) -> Value {
        match (&self.detail, column) {
            (
                SourceDetail::Email {
                    campaign_identifier,
                    ..
                },
                EMAIL_CAMPAIGN_IDENTIFIER,
            ) => Value::text(campaign_identifier),
            (SourceDetail::Email { subject, .. }, EMAIL_CAMPAIGN_SUBJECT) => Value::text(subject),
            (SourceDetail::Email { link_url, .. }, EMAIL_CAMPAIGN_LINK_URL) => {
                Value::text(link_url)
            }
            (
                SourceDetail::SurveyResponse {
                    question_number, ..
                },
                SURVEY_QUESTION_NUMBER,
            ) => Value::text(question_number),
            (SourceDetail::SurveyResponse { response, .. }, SURVEY_RESPONSE) => {
                Value::text(response)
            }
            (SourceDetail::SurveyResponse { location, .. }, SURVEY_LOCATION) => {
                Value::text(location)
            }
            (SourceDetail::Choozle { ad_name, .. }, CHOOZLE_BANNER_AD_NAME) => Value::text(ad_name),
            (SourceDetail::Choozle { link_url, .. }, CHOOZLE_BANNER_LINK_URL) => {
                Value::text(link_url)
            }
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("custom".parse::<CampaignMode>(), Ok(CampaignMode::Custom));
        assert_eq!("turnkey".parse::<CampaignMode>(), Ok(CampaignMode::Turnkey));
        assert_eq!(
            "legacy".parse::<CampaignMode>(),
            Err(EngineError::InvalidMode("legacy".to_string()))
        );
    }

    #[test]
    fn test_mode_parse_is_exact() {
        for mode in ["Turnkey", " custom ", "CUSTOM", "turnkey\n", ""] {
            assert_eq!(
                mode.parse::<CampaignMode>(),
                Err(EngineError::InvalidMode(mode.to_string())),
                "{:?} should be rejected",
                mode
            );
        }
    }

    #[test]
    fn test_custom_excludes_adbutler() {
        let sources = CampaignMode::Custom.allowed_sources();
        assert!(!sources.contains(&Source::AdbutlerBannerAd));
        assert!(sources.contains(&Source::ChoozleBannerClick));
        assert_eq!(sources.len(), 5);
    }

    #[test]
    fn test_turnkey_sources() {
        assert_eq!(
            CampaignMode::Turnkey.allowed_sources(),
            vec![Source::EmailEngagement, Source::AdbutlerBannerAd]
        );
    }

    #[test]
    fn test_only_choozle_uses_operational_store() {
        for kind in CampaignMode::Custom.source_kinds() {
            let expected = if *kind == SourceKind::Choozle {
                Backend::Operational
            } else {
                Backend::Warehouse
            };
            assert_eq!(kind.backend(), expected);
        }
    }

    #[test]
    fn test_banner_classification() {
        assert_eq!(BannerInteraction::classify("Ad View"), BannerInteraction::Impression);
        assert_eq!(BannerInteraction::classify("Ad Click"), BannerInteraction::Click);
        assert_eq!(BannerInteraction::classify("ad view"), BannerInteraction::Click);
    }

    #[test]
    fn test_source_follows_detail() {
        let record = EngagementRecord::new(
            1,
            SourceDetail::Choozle {
                interaction: BannerInteraction::Impression,
                ad_name: Some("Leaderboard".to_string()),
                link_url: None,
            },
        );
        assert_eq!(record.source(), Source::ChoozleBannerImpression);
        assert_eq!(
            record.cell(SOURCE),
            Value::Text("choozle_banner_impression".to_string())
        );
        assert_eq!(
            record.cell(CHOOZLE_BANNER_AD_NAME),
            Value::Text("Leaderboard".to_string())
        );
    }

    #[test]
    fn test_foreign_detail_column_is_null() {
        let record = EngagementRecord::new(7, SourceDetail::AssetView);
        assert_eq!(record.cell(EMAIL_CAMPAIGN_SUBJECT), Value::Null);
        assert_eq!(record.cell(SURVEY_RESPONSE), Value::Null);
        assert_eq!(record.cell("no_such_column"), Value::Null);
        assert_eq!(record.cell(PROGRAM_IDENTIFIER), Value::Int(7));
    }
}
