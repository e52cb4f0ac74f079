//! Provider specialty lookup against `dbt.int_provider_specialties`.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Connection, Row};
use tracing::{debug, info};

use crate::config::WarehouseConfig;
use crate::db;
use crate::error::SourceError;
use crate::traits::SpecialtyLookup;

const SPECIALTY_QUERY: &str = r#"
    SELECT provider_npi::text AS provider_npi, specialty::text AS specialty
    FROM dbt.int_provider_specialties
    WHERE provider_npi::text = ANY($1)
"#;

pub struct WarehouseSpecialtyLookup {
    config: WarehouseConfig,
}

impl WarehouseSpecialtyLookup {
    pub fn new(config: WarehouseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SpecialtyLookup for WarehouseSpecialtyLookup {
    async fn lookup(&self, npis: &[String]) -> Result<HashMap<String, String>, SourceError> {
        if npis.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = db::connect_warehouse(&self.config).await?;
        debug!(count = npis.len(), "looking up provider specialties");
        let result = sqlx::query(SPECIALTY_QUERY)
            .bind(npis.to_vec())
            .fetch_all(&mut conn)
            .await;
        let _ = conn.close().await;

        let mut specialties = HashMap::new();
        for row in result.map_err(SourceError::Query)? {
            let npi: Option<String> = row
                .try_get("provider_npi")
                .map_err(|e| SourceError::Decode(e.to_string()))?;
            let specialty: Option<String> = row
                .try_get("specialty")
                .map_err(|e| SourceError::Decode(e.to_string()))?;
            if let (Some(npi), Some(specialty)) = (npi, specialty) {
                specialties.entry(npi).or_insert(specialty);
            }
        }

        info!(
            "Loaded specialties for {} of {} providers",
            specialties.len(),
            npis.len()
        );
        Ok(specialties)
    }
}
