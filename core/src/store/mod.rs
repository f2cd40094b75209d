//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Callers hand over a whole Dataset; the write mode is always explicit.

use rusqlite::{params, Connection, OptionalExtension};

use crate::{
    config::GeneratorConfig,
    engine::Dataset,
    error::GenResult,
    validation::ValidationReport,
};

mod artifacts;
mod report;

pub use artifacts::ArtifactCounts;

/// How a run's artifacts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop every stored run, then write this one.
    FullRebuild,
    /// Add this run alongside existing ones. Re-writing a stored run id fails.
    Append,
}

pub struct ArtifactStore {
    conn: Connection,
}

impl ArtifactStore {
    pub fn open(path: &str) -> GenResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GenResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> GenResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_artifacts.sql"))?;
        Ok(())
    }

    /// Persist a dataset (and its report, if any) in one transaction.
    pub fn write_run(
        &mut self,
        run_id: &str,
        config: &GeneratorConfig,
        dataset: &Dataset,
        report: Option<&ValidationReport>,
        mode: WriteMode,
    ) -> GenResult<ArtifactCounts> {
        let tx = self.conn.transaction()?;
        if mode == WriteMode::FullRebuild {
            tx.execute_batch(
                "DELETE FROM validation_report;
                 DELETE FROM assessment;
                 DELETE FROM bet;
                 DELETE FROM player;
                 DELETE FROM run;",
            )?;
        }
        tx.execute(
            "INSERT INTO run (run_id, seed, population, version, registry_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                dataset.seed as i64,
                dataset.players.len() as i64,
                env!("CARGO_PKG_VERSION"),
                serde_json::to_string(config)?,
            ],
        )?;
        let counts = artifacts::insert_all(&tx, run_id, dataset)?;
        if let Some(report) = report {
            report::insert(&tx, run_id, report)?;
        }
        tx.commit()?;
        log::info!(
            "Stored run {} ({:?}): {} players, {} bets, {} assessments",
            run_id, mode, counts.players, counts.bets, counts.assessments
        );
        Ok(counts)
    }

    pub fn run_ids(&self) -> GenResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT run_id FROM run ORDER BY run_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn run_seed(&self, run_id: &str) -> GenResult<Option<u64>> {
        let seed = self
            .conn
            .query_row(
                "SELECT seed FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(seed.map(|s| s as u64))
    }
}
