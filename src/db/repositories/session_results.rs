use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_label, parse_optional_datetime, parse_optional_tier, parse_status, to_i64, to_u64},
};
use crate::interfaces::ResultStore;
use crate::models::{SessionAggregate, SessionResult};

const SELECT_COLUMNS: &str = "session_id, student_id, status, started_at, ended_at, complete, failure_reason,
     model_name, context_unavailable, frames_received, frames_admitted, frames_rejected, frames_degraded,
     windows_classified, windows_failed, windows_invalidated, mean_technique_score, max_risk_tier,
     max_reported_tier, critical_reached";

fn row_to_result(row: &Row) -> Result<SessionResult> {
    let status: String = row.get("status")?;
    let started_at: Option<String> = row.get("started_at")?;
    let ended_at: String = row.get("ended_at")?;

    let aggregate = SessionAggregate {
        frames_received: to_u64(row.get("frames_received")?, "frames_received")?,
        frames_admitted: to_u64(row.get("frames_admitted")?, "frames_admitted")?,
        frames_rejected: to_u64(row.get("frames_rejected")?, "frames_rejected")?,
        frames_degraded: to_u64(row.get("frames_degraded")?, "frames_degraded")?,
        windows_classified: to_u64(row.get("windows_classified")?, "windows_classified")?,
        windows_failed: to_u64(row.get("windows_failed")?, "windows_failed")?,
        windows_invalidated: to_u64(row.get("windows_invalidated")?, "windows_invalidated")?,
        mean_technique_score: row.get::<_, Option<f64>>("mean_technique_score")?.map(|v| v as f32),
        max_risk_tier: parse_optional_tier(row.get("max_risk_tier")?, "max_risk_tier")?,
        max_reported_tier: parse_optional_tier(row.get("max_reported_tier")?, "max_reported_tier")?,
        label_histogram: Default::default(),
        critical_reached: row.get("critical_reached")?,
    };

    Ok(SessionResult {
        session_id: row.get("session_id")?,
        student_id: row.get("student_id")?,
        status: parse_status(&status)?,
        started_at: parse_optional_datetime(started_at, "started_at")?,
        ended_at: parse_datetime(&ended_at, "ended_at")?,
        complete: row.get("complete")?,
        failure_reason: row.get("failure_reason")?,
        model_name: row.get("model_name")?,
        context_unavailable: row.get("context_unavailable")?,
        aggregate,
    })
}

fn load_labels(conn: &rusqlite::Connection, result: &mut SessionResult) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT label, window_count FROM session_labels WHERE session_id = ?1",
    )?;
    let mut rows = stmt.query(params![result.session_id])?;
    while let Some(row) = rows.next()? {
        let label: String = row.get(0)?;
        let count: u32 = row.get(1)?;
        result.aggregate.label_histogram.insert(parse_label(&label)?, count);
    }
    Ok(())
}

impl Database {
    /// Insert a finalized session and its label histogram in one transaction.
    /// A second insert for the same session fails on the primary key.
    pub async fn insert_session_result(&self, result: &SessionResult) -> Result<()> {
        let record = result.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let aggregate = &record.aggregate;

            tx.execute(
                "INSERT INTO session_results (
                    session_id, student_id, status, started_at, ended_at, complete, failure_reason,
                    model_name, context_unavailable, frames_received, frames_admitted, frames_rejected,
                    frames_degraded, windows_classified, windows_failed, windows_invalidated,
                    mean_technique_score, max_risk_tier, max_reported_tier, critical_reached, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
                params![
                    record.session_id,
                    record.student_id,
                    record.status.as_str(),
                    record.started_at.map(|dt| dt.to_rfc3339()),
                    record.ended_at.to_rfc3339(),
                    record.complete,
                    record.failure_reason,
                    record.model_name,
                    record.context_unavailable,
                    to_i64(aggregate.frames_received)?,
                    to_i64(aggregate.frames_admitted)?,
                    to_i64(aggregate.frames_rejected)?,
                    to_i64(aggregate.frames_degraded)?,
                    to_i64(aggregate.windows_classified)?,
                    to_i64(aggregate.windows_failed)?,
                    to_i64(aggregate.windows_invalidated)?,
                    aggregate.mean_technique_score.map(f64::from),
                    aggregate.max_risk_tier.map(|tier| tier.as_str()),
                    aggregate.max_reported_tier.map(|tier| tier.as_str()),
                    aggregate.critical_reached,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to insert result for session {}", record.session_id))?;

            for (label, count) in &aggregate.label_histogram {
                tx.execute(
                    "INSERT INTO session_labels (session_id, label, window_count) VALUES (?1, ?2, ?3)",
                    params![record.session_id, label.as_str(), count],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_session_result(&self, session_id: &str) -> Result<Option<SessionResult>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let found = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM session_results WHERE session_id = ?1"),
                    params![session_id],
                    |row| Ok(row_to_result(row)),
                )
                .optional()?
                .transpose()?;

            match found {
                Some(mut result) => {
                    load_labels(conn, &mut result)?;
                    Ok(Some(result))
                }
                None => Ok(None),
            }
        })
        .await
    }

    /// Results for one student, most recent first.
    pub async fn list_student_results(&self, student_id: &str, limit: usize) -> Result<Vec<SessionResult>> {
        let student_id = student_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM session_results
                 WHERE student_id = ?1
                 ORDER BY ended_at DESC
                 LIMIT ?2"
            ))?;

            let mut rows = stmt.query(params![student_id, to_i64(limit as u64)?])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_result(row)?);
            }
            drop(rows);
            drop(stmt);

            for result in &mut results {
                load_labels(conn, result)?;
            }
            Ok(results)
        })
        .await
    }
}

#[async_trait]
impl ResultStore for Database {
    async fn persist_session_result(&self, result: &SessionResult) -> Result<()> {
        self.insert_session_result(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovementLabel, RiskTier, SessionStatus};

    fn sample(session_id: &str, status: SessionStatus) -> SessionResult {
        let mut aggregate = SessionAggregate {
            frames_received: 120,
            frames_admitted: 110,
            frames_rejected: 10,
            frames_degraded: 4,
            windows_classified: 6,
            windows_failed: 1,
            windows_invalidated: 1,
            mean_technique_score: Some(0.75),
            max_risk_tier: Some(RiskTier::High),
            max_reported_tier: Some(RiskTier::High),
            critical_reached: false,
            ..SessionAggregate::default()
        };
        aggregate.label_histogram.insert(MovementLabel::Squat, 4);
        aggregate.label_histogram.insert(MovementLabel::Unknown, 2);

        SessionResult {
            session_id: session_id.into(),
            student_id: Some("student-1".into()),
            status,
            started_at: Some(Utc::now()),
            ended_at: Utc::now(),
            complete: status == SessionStatus::Completed,
            failure_reason: (status == SessionStatus::Failed).then(|| "aborted".to_string()),
            model_name: Some("rule-based-v1".into()),
            context_unavailable: false,
            aggregate,
        }
    }

    #[tokio::test]
    async fn test_result_round_trips_with_labels() {
        let db = Database::in_memory().unwrap();
        let original = sample("s1", SessionStatus::Completed);
        db.persist_session_result(&original).await.unwrap();

        let loaded = db.get_session_result("s1").await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Completed);
        assert!(loaded.complete);
        assert_eq!(loaded.aggregate.frames_admitted, 110);
        assert_eq!(loaded.aggregate.max_reported_tier, Some(RiskTier::High));
        assert_eq!(loaded.aggregate.label_histogram, original.aggregate.label_histogram);
        assert_eq!(loaded.model_name.as_deref(), Some("rule-based-v1"));

        assert!(db.get_session_result("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_persist_is_refused() {
        let db = Database::in_memory().unwrap();
        let result = sample("s1", SessionStatus::Failed);
        db.persist_session_result(&result).await.unwrap();
        assert!(db.persist_session_result(&result).await.is_err());
    }

    #[tokio::test]
    async fn test_list_student_results() {
        let db = Database::in_memory().unwrap();
        db.insert_session_result(&sample("s1", SessionStatus::Completed)).await.unwrap();
        db.insert_session_result(&sample("s2", SessionStatus::Failed)).await.unwrap();

        let results = db.list_student_results("student-1", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.aggregate.label_histogram.len() == 2));
        assert!(db.list_student_results("nobody", 10).await.unwrap().is_empty());
    }
}
