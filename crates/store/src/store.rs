//! SQLite-backed local data store.
//!
//! All mission data, findings, and the audit trail live locally on the
//! vehicle. WAL mode keeps writes durable across power loss. The audit
//! table is insert-only: no update or delete statement for it exists
//! anywhere in this crate, and rows are ordered by a monotonic `seq`
//! column rather than by timestamp so replay order matches append order
//! even when entries share a millisecond.

use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use skysentry_domain::{AuditEntry, Finding, Mission, MissionStatus};

use crate::error::{Result, StoreError};

/// Local store for missions, findings, and the audit trail.
///
/// Shareable across components via `Arc`; every statement runs under the
/// internal connection lock.
pub struct DataStore {
    conn: Mutex<Connection>,
}

impl DataStore {
    /// Create or open the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "opening data store");

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::init_schema(&conn)?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS missions (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                created_at INTEGER NOT NULL,
                created_by TEXT NOT NULL,
                waypoints TEXT NOT NULL DEFAULT '[]',
                parameters TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS findings (
                id TEXT PRIMARY KEY,
                mission_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                alt REAL NOT NULL,
                detection_class TEXT NOT NULL,
                confidence REAL NOT NULL,
                image_path TEXT NOT NULL,
                image_hash TEXT NOT NULL,
                signature TEXT NOT NULL,
                FOREIGN KEY (mission_id) REFERENCES missions(id)
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                timestamp INTEGER NOT NULL,
                actor TEXT NOT NULL,
                action TEXT NOT NULL,
                details TEXT NOT NULL DEFAULT '{}',
                prev_hash TEXT NOT NULL,
                signature TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_findings_mission ON findings(mission_id);
            CREATE INDEX IF NOT EXISTS idx_findings_timestamp ON findings(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Missions ──────────────────────────────────────────────

    pub fn save_mission(&self, mission: &Mission) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO missions
                (id, kind, status, created_at, created_by, waypoints, parameters)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                mission.id,
                mission.kind,
                mission.status.as_str(),
                mission.created_at as i64,
                mission.created_by,
                serde_json::to_string(&mission.waypoints)?,
                serde_json::to_string(&mission.parameters)?,
            ],
        )?;
        debug!(mission_id = %mission.id, status = mission.status.as_str(), "mission saved");
        Ok(())
    }

    pub fn get_mission(&self, mission_id: &str) -> Result<Option<Mission>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, kind, status, created_at, created_by, waypoints, parameters
             FROM missions WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([mission_id], mission_row)?;
        rows.next().transpose().map_err(StoreError::from)
    }

    pub fn update_mission_status(&self, mission_id: &str, status: MissionStatus) -> Result<()> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE missions SET status = ?1 WHERE id = ?2",
            params![status.as_str(), mission_id],
        )?;
        if changed == 0 {
            return Err(StoreError::MissionNotFound { id: mission_id.to_string() });
        }
        Ok(())
    }

    pub fn list_missions(&self) -> Result<Vec<Mission>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, kind, status, created_at, created_by, waypoints, parameters
             FROM missions ORDER BY created_at DESC",
        )?;
        let missions = stmt
            .query_map([], mission_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(missions)
    }

    // ── Findings ──────────────────────────────────────────────

    pub fn save_finding(&self, finding: &Finding) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO findings
                (id, mission_id, timestamp, lat, lon, alt,
                 detection_class, confidence, image_path, image_hash, signature)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                finding.id,
                finding.mission_id,
                finding.timestamp as i64,
                finding.lat,
                finding.lon,
                finding.alt,
                finding.detection_class,
                finding.confidence,
                finding.image_path,
                finding.image_hash,
                finding.signature,
            ],
        )?;
        Ok(())
    }

    pub fn findings_for_mission(&self, mission_id: &str) -> Result<Vec<Finding>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, mission_id, timestamp, lat, lon, alt,
                    detection_class, confidence, image_path, image_hash, signature
             FROM findings WHERE mission_id = ?1 ORDER BY timestamp",
        )?;
        let findings = stmt
            .query_map([mission_id], finding_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(findings)
    }

    pub fn finding_count(&self, mission_id: &str) -> Result<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM findings WHERE mission_id = ?1",
            [mission_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ── Audit Log ─────────────────────────────────────────────

    /// Append an audit entry. Chain linearity is enforced by the audit
    /// log's single writer, one level up.
    pub fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO audit_log
                (id, timestamp, actor, action, details, prev_hash, signature)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                entry.id,
                entry.timestamp as i64,
                entry.actor,
                entry.action,
                entry.canonical_details(),
                entry.prev_hash,
                entry.signature,
            ],
        )?;
        Ok(())
    }

    /// The most recently appended audit entry, if any.
    pub fn last_audit_entry(&self) -> Result<Option<AuditEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, actor, action, details, prev_hash, signature
             FROM audit_log ORDER BY seq DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], audit_row)?;
        rows.next().transpose().map_err(StoreError::from)
    }

    /// Recent entries, most recent first (UI consumption).
    pub fn audit_entries_desc(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, actor, action, details, prev_hash, signature
             FROM audit_log ORDER BY seq DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map([limit as i64], audit_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// All entries in append order (chain verification).
    pub fn audit_entries_asc(&self) -> Result<Vec<AuditEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, actor, action, details, prev_hash, signature
             FROM audit_log ORDER BY seq ASC",
        )?;
        let entries = stmt
            .query_map([], audit_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Execute raw SQL for testing purposes only.
    ///
    /// **WARNING**: bypasses the store's insert-only discipline. Exists so
    /// tests can simulate tampering; never call from production code.
    #[doc(hidden)]
    pub fn __test_execute_raw_sql(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<usize> {
        let conn = self.lock();
        Ok(conn.execute(sql, params)?)
    }
}

fn json_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn mission_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Mission> {
    let status_raw: String = row.get(2)?;
    let waypoints_raw: String = row.get(5)?;
    let parameters_raw: String = row.get(6)?;
    Ok(Mission {
        id: row.get(0)?,
        kind: row.get(1)?,
        status: MissionStatus::from_str(&status_raw).map_err(|e| json_error(2, e))?,
        created_at: row.get::<_, i64>(3)? as u64,
        created_by: row.get(4)?,
        waypoints: serde_json::from_str(&waypoints_raw).map_err(|e| json_error(5, e))?,
        parameters: serde_json::from_str(&parameters_raw).map_err(|e| json_error(6, e))?,
    })
}

fn finding_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Finding> {
    Ok(Finding {
        id: row.get(0)?,
        mission_id: row.get(1)?,
        timestamp: row.get::<_, i64>(2)? as u64,
        lat: row.get(3)?,
        lon: row.get(4)?,
        alt: row.get(5)?,
        detection_class: row.get(6)?,
        confidence: row.get(7)?,
        image_path: row.get(8)?,
        image_hash: row.get(9)?,
        signature: row.get(10)?,
    })
}

fn audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let details_raw: String = row.get(4)?;
    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp: row.get::<_, i64>(1)? as u64,
        actor: row.get(2)?,
        action: row.get(3)?,
        details: serde_json::from_str(&details_raw).map_err(|e| json_error(4, e))?,
        prev_hash: row.get(5)?,
        signature: row.get(6)?,
    })
}
