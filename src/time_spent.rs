//! App time-spent summary from the operational store.
//!
//! Sessions come from `healthst_master.tbl_app_tracking_time_spent`, joined
//! to users (for the NPI) and program assets (for the program). The query
//! returns raw sessions; grouping and bucketing happen here.
//!
//! ```text
//! sessions ──▶ filter (0.125..=60 min, 10-char NPI)
//!          ──▶ group by (npi, program, start, end)
//!          ──▶ ats + bucket fractions
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use sqlx::mysql::MySqlRow;
use sqlx::Row;
use tracing::{debug, info, warn};

use engagement_fusion_core::{Table, Value};

use crate::config::Config;
use crate::db;
use crate::error::SourceError;

/// Shortest session counted, in seconds (0.125 minutes).
pub const MIN_SESSION_SECS: f64 = 7.5;
/// Longest session counted, in seconds (60 minutes).
pub const MAX_SESSION_SECS: f64 = 3600.0;

pub const SUMMARY_COLUMNS: [&str; 10] = [
    "npi",
    "program_identifier",
    "start_time",
    "end_time",
    "ats",
    "3-30 seconds",
    "30 sec -1 minute",
    "1 min - 3 minutes",
    "3 min - 6 minutes",
    "> 6 min",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSpentSession {
    pub npi: String,
    pub program_identifier: i64,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub seconds: f64,
}

/// Session length class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DurationBucket {
    UnderThirtySeconds,
    ThirtySecondsToMinute,
    OneToThreeMinutes,
    ThreeToSixMinutes,
    SixMinutesPlus,
}

impl DurationBucket {
    pub const ALL: [DurationBucket; 5] = [
        DurationBucket::UnderThirtySeconds,
        DurationBucket::ThirtySecondsToMinute,
        DurationBucket::OneToThreeMinutes,
        DurationBucket::ThreeToSixMinutes,
        DurationBucket::SixMinutesPlus,
    ];

    pub fn classify(seconds: f64) -> Self {
        if seconds < 30.0 {
            DurationBucket::UnderThirtySeconds
        } else if seconds < 60.0 {
            DurationBucket::ThirtySecondsToMinute
        } else if seconds < 180.0 {
            DurationBucket::OneToThreeMinutes
        } else if seconds < 360.0 {
            DurationBucket::ThreeToSixMinutes
        } else {
            DurationBucket::SixMinutesPlus
        }
    }

    /// Report column header.
    pub fn column(&self) -> &'static str {
        match self {
            DurationBucket::UnderThirtySeconds => "3-30 seconds",
            DurationBucket::ThirtySecondsToMinute => "30 sec -1 minute",
            DurationBucket::OneToThreeMinutes => "1 min - 3 minutes",
            DurationBucket::ThreeToSixMinutes => "3 min - 6 minutes",
            DurationBucket::SixMinutesPlus => "> 6 min",
        }
    }
}

impl fmt::Display for DurationBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

fn in_scope(session: &TimeSpentSession) -> bool {
    session.npi.chars().count() == 10
        && session.seconds >= MIN_SESSION_SECS
        && session.seconds <= MAX_SESSION_SECS
}

/// Group sessions and compute average minutes plus bucket fractions.
///
/// Groups are ordered by program, NPI, start time, end time.
pub fn summarize(sessions: &[TimeSpentSession]) -> Table {
    type Key = (
        i64,
        String,
        Option<NaiveDateTime>,
        Option<NaiveDateTime>,
    );

    let mut groups: BTreeMap<Key, Vec<f64>> = BTreeMap::new();
    for session in sessions.iter().filter(|s| in_scope(s)) {
        groups
            .entry((
                session.program_identifier,
                session.npi.clone(),
                session.start_time,
                session.end_time,
            ))
            .or_default()
            .push(session.seconds);
    }

    let mut table = Table::new(SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect());
    for ((program, npi, start, end), durations) in groups {
        let count = durations.len() as f64;
        let avg_minutes = durations.iter().sum::<f64>() / count / 60.0;

        let mut row = vec![
            Value::Text(npi),
            Value::Int(program),
            Value::timestamp(start),
            Value::timestamp(end),
            Value::Float(avg_minutes),
        ];
        for bucket in DurationBucket::ALL {
            let hits = durations
                .iter()
                .filter(|s| DurationBucket::classify(**s) == bucket)
                .count() as f64;
            row.push(Value::Float(hits / count));
        }
        table.push_row(row);
    }
    table
}

fn session_query(count: usize) -> String {
    let placeholders = vec!["?"; count].join(", ");
    format!(
        r#"
        SELECT
            CAST(u.npiNumber AS CHAR) AS npi,
            CAST(a.fk_prgID AS SIGNED) AS program_identifier,
            ts.start_time AS start_time,
            ts.end_time AS end_time,
            CAST(TIMESTAMPDIFF(SECOND, ts.start_time, ts.end_time) AS SIGNED) AS seconds
        FROM healthst_master.tbl_app_tracking_time_spent ts
        LEFT JOIN healthst_master.tbl_user_master u ON ts.fk_uid = u.pk_uid
        JOIN healthst_master.tbl_program_assets a ON ts.asset_id = a.pk_paID
        WHERE a.fk_prgID IN ({placeholders})
          AND (TIMESTAMPDIFF(SECOND, ts.start_time, ts.end_time) / 60) BETWEEN 0.125 AND 60
          AND LENGTH(u.npiNumber) = 10
        "#
    )
}

fn map_row(row: &MySqlRow) -> Result<Option<TimeSpentSession>, sqlx::Error> {
    let npi: Option<String> = row.try_get("npi")?;
    let seconds: Option<i64> = row.try_get("seconds")?;
    let (Some(npi), Some(seconds)) = (npi, seconds) else {
        return Ok(None);
    };
    Ok(Some(TimeSpentSession {
        npi,
        program_identifier: row.try_get("program_identifier")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        seconds: seconds as f64,
    }))
}

pub async fn fetch_sessions(
    config: &Config,
    program_ids: &[i64],
) -> Result<Vec<TimeSpentSession>, SourceError> {
    if program_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = session_query(program_ids.len());
    let mut operational = db::connect_operational(&config.operational).await?;

    debug!(?program_ids, "running time-spent query");
    let mut query = sqlx::query(&sql);
    for id in program_ids {
        query = query.bind(*id);
    }
    let result = query.fetch_all(&mut operational.conn).await;
    operational.close().await;

    let rows = result.map_err(SourceError::Query)?;
    let mut sessions = Vec::with_capacity(rows.len());
    for row in &rows {
        if let Some(session) = map_row(row).map_err(|e| SourceError::Decode(e.to_string()))? {
            sessions.push(session);
        }
    }
    Ok(sessions)
}

/// Fetch and summarize. A failed query yields an empty table.
pub async fn run_time_spent_summary(config: &Config, program_ids: &[i64]) -> Table {
    match fetch_sessions(config, program_ids).await {
        Ok(sessions) => {
            let table = summarize(&sessions);
            info!(
                "Pulled time spent summary for {} NPI(s): {:?}",
                table.row_count(),
                program_ids
            );
            table
        }
        Err(e) => {
            warn!(error = %e, "time spent summary query failed");
            Table::new(Vec::new())
        }
    }
}
