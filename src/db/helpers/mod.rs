use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{MovementLabel, RiskTier, SessionStatus};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<SessionStatus> {
    SessionStatus::parse(value).ok_or_else(|| anyhow!("unknown session status {value}"))
}

pub fn parse_optional_tier(value: Option<String>, field: &str) -> Result<Option<RiskTier>> {
    value
        .map(|raw| RiskTier::parse(&raw).ok_or_else(|| anyhow!("{field} has unknown tier {raw}")))
        .transpose()
}

pub fn parse_label(value: &str) -> Result<MovementLabel> {
    MovementLabel::parse(value).ok_or_else(|| anyhow!("unknown movement label {value}"))
}
