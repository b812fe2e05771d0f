use crate::findings::Finding;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use std::path::Path;

/// One persisted analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAnalysis {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub message_body: String,
    pub threat_score: u32,
    pub findings: Vec<Finding>,
}

/// Inclusive date and score bounds for `ResultStore::load`.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub min_score: Option<u32>,
    pub max_score: Option<u32>,
}

pub struct ResultStore {
    conn: Connection,
}

fn timestamp_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn day_start(date: NaiveDate) -> String {
    timestamp_text(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

impl ResultStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open results database: {}", db_path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS analysis_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                message_body TEXT NOT NULL,
                threat_score INTEGER NOT NULL,
                findings_json TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn save(&self, message_body: &str, score: u32, findings: &[Finding]) -> Result<i64> {
        self.save_at(message_body, score, findings, Utc::now())
    }

    pub fn save_at(
        &self,
        message_body: &str,
        score: u32,
        findings: &[Finding],
        timestamp: DateTime<Utc>,
    ) -> Result<i64> {
        let findings_json = serde_json::to_string(findings)?;
        self.conn.execute(
            "INSERT INTO analysis_results (timestamp, message_body, threat_score, findings_json)
             VALUES (?, ?, ?, ?)",
            params![timestamp_text(timestamp), message_body, score, findings_json],
        )?;
        let id = self.conn.last_insert_rowid();
        log::debug!("Saved analysis {id} (score {score})");
        Ok(id)
    }

    pub fn load(&self, filter: &RecordFilter) -> Result<Vec<StoredAnalysis>> {
        let mut sql = String::from(
            "SELECT id, timestamp, message_body, threat_score, findings_json
             FROM analysis_results WHERE 1 = 1",
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(since) = filter.since {
            sql.push_str(" AND timestamp >= ?");
            values.push(Value::Text(day_start(since)));
        }
        if let Some(until) = filter.until {
            // Whole final day included
            let next_day = until.succ_opt().unwrap_or(until);
            sql.push_str(" AND timestamp < ?");
            values.push(Value::Text(day_start(next_day)));
        }
        if let Some(min) = filter.min_score {
            sql.push_str(" AND threat_score >= ?");
            values.push(Value::Integer(i64::from(min)));
        }
        if let Some(max) = filter.max_score {
            sql.push_str(" AND threat_score <= ?");
            values.push(Value::Integer(i64::from(max)));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, timestamp, message_body, threat_score, findings_json)| {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .with_context(|| format!("Bad timestamp on analysis {id}: {timestamp}"))?
                    .with_timezone(&Utc);
                let findings = serde_json::from_str(findings_json.as_deref().unwrap_or("[]"))
                    .with_context(|| format!("Bad findings on analysis {id}"))?;
                Ok(StoredAnalysis {
                    id,
                    timestamp,
                    message_body,
                    threat_score,
                    findings,
                })
            })
            .collect()
    }

    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM analysis_results", [])?)
    }
}
