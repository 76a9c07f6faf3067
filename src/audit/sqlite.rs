use super::{AuditEntry, AuditStats, AuditStore, stats_over};
use crate::error::AuditError;
use crate::guardrail::access::AccessLevel;
use crate::guardrail::risk::RiskLevel;
use rusqlite::{Connection, Error as SqlError, params, types::Type};
use std::path::Path;
use std::sync::Mutex;

/// Durable audit store backed by sqlite. Rows are only ever inserted or
/// bulk-deleted; there is no UPDATE path, preserving the append-only ledger
/// contract at the storage layer.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    pub fn new(db_path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                agent TEXT NOT NULL,
                service TEXT NOT NULL,
                service_name TEXT NOT NULL,
                action TEXT NOT NULL,
                access_level TEXT NOT NULL,
                risk TEXT NOT NULL,
                approved INTEGER NOT NULL,
                result TEXT NOT NULL,
                duration_ms INTEGER
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
        Ok(AuditEntry {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            agent: row.get(2)?,
            service: row.get(3)?,
            service_name: row.get(4)?,
            action: row.get(5)?,
            access_level: parse_enum::<AccessLevel>(row.get::<_, String>(6)?, 6)?,
            risk: parse_enum::<RiskLevel>(row.get::<_, String>(7)?, 7)?,
            approved: row.get::<_, i64>(8)? != 0,
            result: parse_enum::<super::ActionResult>(row.get::<_, String>(9)?, 9)?,
            duration_ms: row
                .get::<_, Option<i64>>(10)?
                .map(|ms| u64::try_from(ms).unwrap_or(0)),
        })
    }
}

impl AuditStore for SqliteAuditStore {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let duration_ms = entry.duration_ms.map(|ms| i64::try_from(ms).unwrap_or(i64::MAX));
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute(
            "INSERT INTO audit_entries (id, timestamp, agent, service, service_name, action, access_level, risk, approved, result, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.id,
                entry.timestamp,
                entry.agent,
                entry.service,
                entry.service_name,
                entry.action,
                entry.access_level.to_string(),
                entry.risk.to_string(),
                i64::from(entry.approved),
                entry.result.to_string(),
                duration_ms,
            ],
        )?;
        Ok(())
    }

    fn list(&self, limit: usize, service: Option<&str>) -> Result<Vec<AuditEntry>, AuditError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let entries = if let Some(svc) = service {
            let mut stmt = conn.prepare_cached(
                "SELECT id, timestamp, agent, service, service_name, action, access_level, risk, approved, result, duration_ms
                 FROM audit_entries WHERE service = ?1 ORDER BY seq DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![svc, limit], |row| Self::row_to_entry(row))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            let mut stmt = conn.prepare_cached(
                "SELECT id, timestamp, agent, service, service_name, action, access_level, risk, approved, result, duration_ms
                 FROM audit_entries ORDER BY seq DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| Self::row_to_entry(row))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        Ok(entries)
    }

    fn stats(&self) -> Result<AuditStats, AuditError> {
        // stats only look at today's entries; pulling them through list keeps
        // the fold identical to the in-memory store
        let todays = self.list(usize::MAX, None)?;
        Ok(stats_over(todays.iter()))
    }

    fn clear(&self) -> Result<(), AuditError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute("DELETE FROM audit_entries", [])?;
        Ok(())
    }
}

fn parse_enum<T: std::str::FromStr>(value: String, column_index: usize) -> rusqlite::Result<T> {
    value.parse::<T>().map_err(|_| {
        SqlError::FromSqlConversionFailure(
            column_index,
            Type::Text,
            format!("unrecognized enum value '{value}'").into(),
        )
    })
}
