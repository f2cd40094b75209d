use rusqlite::{params, Connection};

use super::ArtifactStore;
use crate::{
    engine::Dataset,
    error::GenResult,
    export::{AssessmentRow, BetRow, PlayerRow},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactCounts {
    pub players:     usize,
    pub bets:        usize,
    pub assessments: usize,
}

pub(super) fn insert_all(conn: &Connection, run_id: &str, dataset: &Dataset) -> GenResult<ArtifactCounts> {
    let mut counts = ArtifactCounts::default();

    let mut stmt = conn.prepare(
        "INSERT INTO player (
            run_id, player_id, first_name, last_name, email, age, state, risk_cohort, self_excluded
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for p in dataset.players.iter().map(PlayerRow::from) {
        stmt.execute(params![
            run_id,
            p.player_id,
            p.first_name,
            p.last_name,
            p.email,
            p.age,
            p.state,
            p.risk_cohort,
            if p.self_excluded { 1 } else { 0 }
        ])?;
        counts.players += 1;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO bet (
            run_id, bet_id, player_id, bet_timestamp, sport_category, market_type,
            market_tier, bet_amount, odds_american, outcome
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for b in dataset.bets.iter().map(BetRow::from) {
        stmt.execute(params![
            run_id,
            b.bet_id,
            b.player_id,
            b.bet_timestamp,
            b.sport_category,
            b.market_type,
            b.market_tier,
            b.bet_amount,
            b.odds_american,
            b.outcome
        ])?;
        counts.bets += 1;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO assessment (
            run_id, assessment_id, player_id, assessment_date, sensitivity_to_loss,
            sensitivity_to_reward, risk_tolerance, decision_consistency, assessment_version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for a in dataset.assessments.iter().map(AssessmentRow::from) {
        stmt.execute(params![
            run_id,
            a.assessment_id,
            a.player_id,
            a.assessment_date,
            a.sensitivity_to_loss,
            a.sensitivity_to_reward,
            a.risk_tolerance,
            a.decision_consistency,
            a.assessment_version
        ])?;
        counts.assessments += 1;
    }

    Ok(counts)
}

impl ArtifactStore {
    // ── Artifact queries ──────────────────────────────────────────

    pub fn counts(&self, run_id: &str) -> GenResult<ArtifactCounts> {
        let count = |table: &str| -> GenResult<usize> {
            let sql = format!("SELECT COUNT(*) FROM {table} WHERE run_id = ?1");
            let n: i64 = self.conn.query_row(&sql, params![run_id], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(ArtifactCounts {
            players:     count("player")?,
            bets:        count("bet")?,
            assessments: count("assessment")?,
        })
    }

    pub fn players(&self, run_id: &str) -> GenResult<Vec<PlayerRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, first_name, last_name, email, age, state, risk_cohort, self_excluded
             FROM player WHERE run_id = ?1 ORDER BY player_id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(PlayerRow {
                player_id:     row.get(0)?,
                first_name:    row.get(1)?,
                last_name:     row.get(2)?,
                email:         row.get(3)?,
                age:           row.get(4)?,
                state:         row.get(5)?,
                risk_cohort:   row.get(6)?,
                self_excluded: row.get::<_, i32>(7)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// One player's bets in timestamp order.
    pub fn bets_for_player(&self, run_id: &str, player_id: &str) -> GenResult<Vec<BetRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT bet_id, player_id, bet_timestamp, sport_category, market_type,
                    market_tier, bet_amount, odds_american, outcome
             FROM bet WHERE run_id = ?1 AND player_id = ?2
             ORDER BY bet_timestamp ASC, bet_id ASC",
        )?;
        let rows = stmt.query_map(params![run_id, player_id], |row| {
            Ok(BetRow {
                bet_id:         row.get(0)?,
                player_id:      row.get(1)?,
                bet_timestamp:  row.get(2)?,
                sport_category: row.get(3)?,
                market_type:    row.get(4)?,
                market_tier:    row.get(5)?,
                bet_amount:     row.get(6)?,
                odds_american:  row.get(7)?,
                outcome:        row.get(8)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn assessment(&self, run_id: &str, player_id: &str) -> GenResult<Option<AssessmentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT assessment_id, player_id, assessment_date, sensitivity_to_loss,
                    sensitivity_to_reward, risk_tolerance, decision_consistency, assessment_version
             FROM assessment WHERE run_id = ?1 AND player_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![run_id, player_id], |row| {
            Ok(AssessmentRow {
                assessment_id:         row.get(0)?,
                player_id:             row.get(1)?,
                assessment_date:       row.get(2)?,
                sensitivity_to_loss:   row.get(3)?,
                sensitivity_to_reward: row.get(4)?,
                risk_tolerance:        row.get(5)?,
                decision_consistency:  row.get(6)?,
                assessment_version:    row.get(7)?,
            })
        })?;
        let first = rows.next().transpose()?;
        Ok(first)
    }
}
