//! Sensor status storage using SQLite.
//!
//! Columns are nullable on purpose: rows written by older deployments or by
//! hand may lack fields, and such rows must read back as "no prior status"
//! instead of failing the sensor.

use super::SensorStateStore;
use crate::error::{Error, Result};
use crate::model::{SensorStatusRecord, StoredStatus};
use anyhow::{anyhow, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Sensor status storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE sensor_status (
///     eui TEXT PRIMARY KEY,
///     is_online INTEGER,          -- 0 / 1
///     sensor_name TEXT,
///     structure_name TEXT,
///     last_status_change TEXT,    -- RFC 3339, microsecond precision, UTC
///     last_updated TEXT           -- RFC 3339, microsecond precision, UTC
/// );
/// ```
///
/// # Atomicity
/// `upsert` reads the previous `last_status_change` and writes the new row
/// inside one `BEGIN IMMEDIATE` transaction, so a concurrent writer cannot
/// interleave between read and write. A previous value that does not parse as
/// RFC 3339 is replaced, never kept.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Creates or opens a state store at `db_path` (`":memory:"` for tests).
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::open(db_path.as_ref()).map_err(Error::store)
    }

    fn open(db_path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sensor_status (
                eui TEXT PRIMARY KEY,
                is_online INTEGER,
                sensor_name TEXT,
                structure_name TEXT,
                last_status_change TEXT,
                last_updated TEXT
            )
            "#,
            [],
        )
        .context("Failed to create sensor_status table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sensor_status connection mutex poisoned"))
    }

    /// Runs raw SQL against the backing database.
    ///
    /// Lets tests plant rows that the regular write path never produces.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> anyhow::Result<usize> {
        Ok(self.lock()?.execute(sql, [])?)
    }

    fn get_inner(&self, eui: &str) -> anyhow::Result<Option<SensorStatusRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT eui, is_online, sensor_name, structure_name,
                       last_status_change, last_updated
                FROM sensor_status
                WHERE eui = ?1
                "#,
            )
            .context("Failed to prepare query")?;

        let mut rows = stmt.query(params![eui]).context("Failed to execute query")?;

        match rows.next().context("Failed to read row")? {
            Some(row) => Ok(decode_record(row)?),
            None => Ok(None),
        }
    }

    fn upsert_inner(
        &self,
        eui: &str,
        is_online: bool,
        sensor_name: &str,
        structure_name: &str,
        bump_status_change: bool,
    ) -> anyhow::Result<()> {
        let now = Utc::now();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin upsert transaction")?;

        let previous: Option<DateTime<Utc>> = tx
            .query_row(
                "SELECT last_status_change FROM sensor_status WHERE eui = ?1",
                params![eui],
                |row| Ok(text_value(row.get_ref(0)?).and_then(parse_timestamp)),
            )
            .optional()
            .context("Failed to read previous status change")?
            .flatten();

        // Never moves backwards; a missing or unreadable value is replaced
        let last_status_change = match previous {
            Some(previous) if bump_status_change => previous.max(now),
            Some(previous) => previous,
            None => now,
        };

        tx.execute(
            r#"
            INSERT INTO sensor_status (
                eui, is_online, sensor_name, structure_name,
                last_status_change, last_updated
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(eui) DO UPDATE SET
                is_online = excluded.is_online,
                sensor_name = excluded.sensor_name,
                structure_name = excluded.structure_name,
                last_status_change = excluded.last_status_change,
                last_updated = excluded.last_updated
            "#,
            params![
                eui,
                is_online,
                sensor_name,
                structure_name,
                format_timestamp(last_status_change),
                format_timestamp(now)
            ],
        )
        .context("Failed to upsert sensor status")?;

        tx.commit().context("Failed to commit sensor status")?;
        Ok(())
    }

    fn list_all_inner(&self) -> anyhow::Result<Vec<StoredStatus>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT eui, is_online, sensor_name, structure_name,
                       last_status_change, last_updated
                FROM sensor_status
                ORDER BY structure_name, sensor_name, eui
                "#,
            )
            .context("Failed to prepare query")?;

        let mut rows = stmt.query([]).context("Failed to execute query")?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().context("Failed to read row")? {
            if let Some(stored) = decode_stored(row)? {
                records.push(stored);
            }
        }

        Ok(records)
    }
}

impl SensorStateStore for SqliteStateStore {
    fn get(&self, eui: &str) -> Result<Option<SensorStatusRecord>> {
        self.get_inner(eui).map_err(Error::store)
    }

    fn upsert(
        &self,
        eui: &str,
        is_online: bool,
        sensor_name: &str,
        structure_name: &str,
        bump_status_change: bool,
    ) -> Result<()> {
        self.upsert_inner(eui, is_online, sensor_name, structure_name, bump_status_change)
            .map_err(Error::store)
    }

    fn list_all(&self) -> Result<Vec<StoredStatus>> {
        self.list_all_inner().map_err(Error::store)
    }
}

/// Decodes one row leniently: NULL, mistyped or unparsable cells become `None`.
///
/// Returns `Ok(None)` only when the key itself is not text. Genuine database
/// errors are returned as `Err`.
fn decode_stored(row: &Row<'_>) -> anyhow::Result<Option<StoredStatus>> {
    let Some(eui) = text_value(row.get_ref(0)?) else {
        warn!("Stored sensor row has a non-text key, skipping");
        return Ok(None);
    };

    let is_online = match row.get_ref(1)? {
        ValueRef::Integer(value) => Some(value != 0),
        _ => None,
    };

    Ok(Some(StoredStatus {
        eui: eui.to_string(),
        is_online,
        sensor_name: text_value(row.get_ref(2)?).map(str::to_string),
        structure_name: text_value(row.get_ref(3)?).map(str::to_string),
        last_status_change: text_value(row.get_ref(4)?).and_then(parse_timestamp),
        last_updated: text_value(row.get_ref(5)?).and_then(parse_timestamp),
    }))
}

/// Decodes one row as a full record, or `None` (with a warning) when it is
/// incomplete.
fn decode_record(row: &Row<'_>) -> anyhow::Result<Option<SensorStatusRecord>> {
    let Some(stored) = decode_stored(row)? else {
        return Ok(None);
    };

    let eui = stored.eui.clone();
    let record = stored.into_record();
    if record.is_none() {
        warn!(eui = %eui, "Stored sensor record has missing or malformed fields, treating as unseen");
    }
    Ok(record)
}

fn text_value(value: ValueRef<'_>) -> Option<&str> {
    match value {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok(),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
