use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::connection::Database;
use crate::interfaces::StudentContext;
use crate::models::RiskFactors;

fn row_to_factors(row: &Row) -> Result<RiskFactors> {
    let regions: String = row.get("injured_regions")?;
    Ok(RiskFactors {
        prior_injury: row.get("prior_injury")?,
        recent_return_from_injury: row.get("recent_return_from_injury")?,
        hypermobility: row.get("hypermobility")?,
        injured_regions: serde_json::from_str(&regions).context("failed to parse injured_regions")?,
        multiplier_override: row.get::<_, Option<f64>>("multiplier_override")?.map(|v| v as f32),
    })
}

impl Database {
    pub async fn upsert_risk_factors(&self, student_id: &str, factors: &RiskFactors) -> Result<()> {
        let student_id = student_id.to_string();
        let record = factors.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO student_risk_factors (
                    student_id, prior_injury, recent_return_from_injury, hypermobility,
                    injured_regions, multiplier_override, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(student_id) DO UPDATE SET
                    prior_injury = excluded.prior_injury,
                    recent_return_from_injury = excluded.recent_return_from_injury,
                    hypermobility = excluded.hypermobility,
                    injured_regions = excluded.injured_regions,
                    multiplier_override = excluded.multiplier_override,
                    updated_at = excluded.updated_at",
                params![
                    student_id,
                    record.prior_injury,
                    record.recent_return_from_injury,
                    record.hypermobility,
                    serde_json::to_string(&record.injured_regions)?,
                    record.multiplier_override.map(f64::from),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_student_risk_factors(&self, student_id: &str) -> Result<Option<RiskFactors>> {
        let student_id = student_id.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT prior_injury, recent_return_from_injury, hypermobility, injured_regions, multiplier_override
                 FROM student_risk_factors
                 WHERE student_id = ?1",
                params![student_id],
                |row| Ok(row_to_factors(row)),
            )
            .optional()?
            .transpose()
        })
        .await
    }
}

/// Students without a stored record have no known risk factors.
#[async_trait]
impl StudentContext for Database {
    async fn get_risk_factors(&self, student_id: &str) -> Result<RiskFactors> {
        Ok(self
            .get_student_risk_factors(student_id)
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_lookup() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_risk_factors("alice").await.unwrap(), RiskFactors::default());

        let factors = RiskFactors {
            prior_injury: true,
            injured_regions: vec!["left_knee".into()],
            ..RiskFactors::default()
        };
        db.upsert_risk_factors("alice", &factors).await.unwrap();
        assert_eq!(db.get_risk_factors("alice").await.unwrap(), factors);

        let updated = RiskFactors {
            multiplier_override: Some(1.25),
            ..factors
        };
        db.upsert_risk_factors("alice", &updated).await.unwrap();
        assert_eq!(db.get_student_risk_factors("alice").await.unwrap(), Some(updated));
    }
}
