use rusqlite::{params, Connection, OptionalExtension};

use super::ArtifactStore;
use crate::{error::GenResult, validation::ValidationReport};

pub(super) fn insert(conn: &Connection, run_id: &str, report: &ValidationReport) -> GenResult<()> {
    conn.execute(
        "INSERT INTO validation_report (run_id, passed, deviations, report_json)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            run_id,
            if report.passed() { 1 } else { 0 },
            report.deviation_count() as i64,
            serde_json::to_string(report)?
        ],
    )?;
    Ok(())
}

impl ArtifactStore {
    // ── Validation report ─────────────────────────────────────────

    pub fn validation_report(&self, run_id: &str) -> GenResult<Option<ValidationReport>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT report_json FROM validation_report WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }
}
