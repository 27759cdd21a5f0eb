//! SQLite-backed audit trail of gateway requests.
//!
//! One row per request, success or failure: identifiers, matched route,
//! requested model, outcome kind, outgoing status, latency, and how many
//! vault entries the request produced. Message bodies and vault contents are
//! never written here.

pub mod export;

use rusqlite::Connection;

use crate::error::Result;

/// A single audited gateway request.
#[derive(Debug, Clone)]
pub struct GatewayLog {
    pub id: Option<i64>,
    pub timestamp: String,
    pub request_id: String,
    pub route_id: String,
    pub model: String,
    /// `"ok"` or an error kind such as `"no-route"`.
    pub outcome: String,
    /// HTTP status returned to the client.
    pub status: u16,
    pub latency_ms: i64,
    /// Vault entries created while masking this request.
    pub masked: i64,
}

/// Initialize the audit schema if it does not exist.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS requests (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp  TEXT NOT NULL,
            request_id TEXT NOT NULL,
            route_id   TEXT NOT NULL,
            model      TEXT NOT NULL,
            outcome    TEXT NOT NULL,
            status     INTEGER NOT NULL,
            latency_ms INTEGER NOT NULL,
            masked     INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_requests_timestamp ON requests(timestamp);
        CREATE INDEX IF NOT EXISTS idx_requests_route ON requests(route_id);",
    )?;
    Ok(())
}

/// Insert one audit row, returning its id.
pub fn log_request(conn: &Connection, log: &GatewayLog) -> Result<i64> {
    conn.execute(
        "INSERT INTO requests (timestamp, request_id, route_id, model, outcome, status, latency_ms, masked)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            log.timestamp,
            log.request_id,
            log.route_id,
            log.model,
            log.outcome,
            log.status,
            log.latency_ms,
            log.masked,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Query the most recent N audit rows, newest first.
pub fn query_recent(conn: &Connection, limit: usize) -> Result<Vec<GatewayLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, request_id, route_id, model, outcome, status, latency_ms, masked
         FROM requests ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
        Ok(GatewayLog {
            id: Some(row.get(0)?),
            timestamp: row.get(1)?,
            request_id: row.get(2)?,
            route_id: row.get(3)?,
            model: row.get(4)?,
            outcome: row.get(5)?,
            status: row.get::<_, i64>(6)? as u16,
            latency_ms: row.get(7)?,
            masked: row.get(8)?,
        })
    })?;

    let mut logs = Vec::new();
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

/// Open or create the audit database at the given path.
pub fn open_db(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Open an in-memory audit database (for testing).
pub fn open_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}
