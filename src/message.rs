use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A stored message, as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
}

impl Message {
    /// The message timestamp as a UTC instant.
    pub fn timestamp_utc(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Body of `POST /messages`
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Parse an ISO-8601 timestamp. RFC 3339 strings keep their offset; naive
/// date-times (no offset) are taken as UTC. The UTC year must fall in
/// 0000..=9999 so the stored form stays fixed width.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    let at = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .with_context(|| format!("Invalid ISO-8601 timestamp: {}", raw))?,
    };
    if !(0..=9999).contains(&at.year()) {
        bail!("Timestamp year out of range (0000-9999): {}", raw);
    }
    Ok(at)
}

/// Canonical stored form: fixed width, so text order is time order.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Normalize a client-supplied timestamp, or stamp `now` when none was given.
pub fn resolve_timestamp(supplied: Option<&str>, now: DateTime<Utc>) -> Result<String> {
    match supplied {
        Some(raw) => parse_timestamp(raw).map(|at| format_timestamp(&at)),
        None => Ok(format_timestamp(&now)),
    }
}
