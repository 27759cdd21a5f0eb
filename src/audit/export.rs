use rusqlite::Connection;
use serde::Serialize;

use super::GatewayLog;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct LogEntry {
    id: i64,
    timestamp: String,
    request_id: String,
    route_id: String,
    model: String,
    outcome: String,
    status: u16,
    latency_ms: i64,
    masked: i64,
}

impl From<&GatewayLog> for LogEntry {
    fn from(log: &GatewayLog) -> Self {
        LogEntry {
            id: log.id.unwrap_or(0),
            timestamp: log.timestamp.clone(),
            request_id: log.request_id.clone(),
            route_id: log.route_id.clone(),
            model: log.model.clone(),
            outcome: log.outcome.clone(),
            status: log.status,
            latency_ms: log.latency_ms,
            masked: log.masked,
        }
    }
}

/// Export all audit rows as a JSON string.
pub fn export_json(conn: &Connection) -> Result<String> {
    let logs = super::query_recent(conn, usize::MAX)?;
    let entries: Vec<LogEntry> = logs.iter().map(LogEntry::from).collect();
    let json = serde_json::to_string_pretty(&entries)?;
    Ok(json)
}

/// Export all audit rows as a CSV string.
pub fn export_csv(conn: &Connection) -> Result<String> {
    let logs = super::query_recent(conn, usize::MAX)?;
    let mut output =
        String::from("id,timestamp,request_id,route_id,model,outcome,status,latency_ms,masked\n");
    for log in &logs {
        output.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            log.id.unwrap_or(0),
            log.timestamp,
            log.request_id,
            log.route_id,
            log.model,
            log.outcome,
            log.status,
            log.latency_ms,
            log.masked,
        ));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{log_request, open_memory_db, GatewayLog};

    fn sample_log(route_id: &str) -> GatewayLog {
        GatewayLog {
            id: None,
            timestamp: "2026-08-01T10:00:00Z".to_string(),
            request_id: "req_42".to_string(),
            route_id: route_id.to_string(),
            model: "claude-3-opus".to_string(),
            outcome: "ok".to_string(),
            status: 200,
            latency_ms: 88,
            masked: 0,
        }
    }

    #[test]
    fn export_json_format() {
        let conn = open_memory_db().unwrap();
        log_request(&conn, &sample_log("anthropic")).unwrap();

        let json = export_json(&conn).unwrap();
        assert!(json.contains("\"route_id\": \"anthropic\""));
        assert!(json.contains("\"outcome\": \"ok\""));

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn export_csv_format() {
        let conn = open_memory_db().unwrap();
        log_request(&conn, &sample_log("anthropic")).unwrap();
        log_request(&conn, &sample_log("openai")).unwrap();

        let csv = export_csv(&conn).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "id,timestamp,request_id,route_id,model,outcome,status,latency_ms,masked"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn export_empty_db() {
        let conn = open_memory_db().unwrap();
        assert_eq!(export_json(&conn).unwrap(), "[]");
        assert_eq!(export_csv(&conn).unwrap().lines().count(), 1);
    }
}
