//! Published artifacts: players, bets and assessments.
//!
//! Every run writes two renditions. The CSV files carry the tabular column
//! set downstream loaders read (`players.csv`, `bets.csv`,
//! `gamalyze_scores.csv`). The JSON Lines files carry the full row structs
//! below. Latent traits and behavioural profiles never leave the process.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    bet_sequence::{BetEvent, MARKET_TYPE},
    engine::Dataset,
    error::GenResult,
    marker_transformer::NeuroAssessment,
    player_generator::PlayerRecord,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const PLAYERS_FILE: &str = "players.jsonl";
pub const BETS_FILE: &str = "bets.jsonl";
pub const ASSESSMENTS_FILE: &str = "assessments.jsonl";

pub const PLAYERS_CSV: &str = "players.csv";
pub const BETS_CSV: &str = "bets.csv";
pub const ASSESSMENTS_CSV: &str = "gamalyze_scores.csv";

const PLAYERS_HEADER: &str = "player_id,first_name,last_name,email,age,state,risk_cohort";
const BETS_HEADER: &str =
    "bet_id,player_id,bet_timestamp,sport_category,market_type,bet_amount,odds_american,outcome";
const ASSESSMENTS_HEADER: &str = "assessment_id,player_id,assessment_date,sensitivity_to_loss,\
sensitivity_to_reward,risk_tolerance,decision_consistency,gamalyze_version";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub player_id:     String,
    pub first_name:    String,
    pub last_name:     String,
    pub email:         String,
    pub age:           u32,
    pub state:         String,
    pub risk_cohort:   String,
    pub self_excluded: bool,
}

impl From<&PlayerRecord> for PlayerRow {
    fn from(p: &PlayerRecord) -> Self {
        Self {
            player_id:     p.player_id.clone(),
            first_name:    p.first_name.clone(),
            last_name:     p.last_name.clone(),
            email:         p.email.clone(),
            age:           p.age,
            state:         p.jurisdiction.code().to_string(),
            risk_cohort:   p.cohort.label().to_string(),
            self_excluded: p.self_excluded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRow {
    pub bet_id:         String,
    pub player_id:      String,
    pub bet_timestamp:  String,
    pub sport_category: Option<String>,
    pub market_type:    String,
    pub market_tier:    Option<f64>,
    pub bet_amount:     f64,
    pub odds_american:  i32,
    pub outcome:        String,
}

impl From<&BetEvent> for BetRow {
    fn from(b: &BetEvent) -> Self {
        Self {
            bet_id:         b.bet_id.clone(),
            player_id:      b.player_id.clone(),
            bet_timestamp:  b.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            sport_category: b.sport.map(|s| s.code().to_string()),
            market_type:    MARKET_TYPE.to_string(),
            market_tier:    b.market_tier,
            bet_amount:     b.stake,
            odds_american:  b.odds_american,
            outcome:        b.outcome.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRow {
    pub assessment_id:         String,
    pub player_id:             String,
    pub assessment_date:       String,
    pub sensitivity_to_loss:   f64,
    pub sensitivity_to_reward: f64,
    pub risk_tolerance:        f64,
    pub decision_consistency:  f64,
    pub assessment_version:    String,
}

impl From<&NeuroAssessment> for AssessmentRow {
    fn from(a: &NeuroAssessment) -> Self {
        Self {
            assessment_id:         a.assessment_id.clone(),
            player_id:             a.player_id.clone(),
            assessment_date:       a.assessment_date.format(DATE_FORMAT).to_string(),
            sensitivity_to_loss:   a.sensitivity_to_loss,
            sensitivity_to_reward: a.sensitivity_to_reward,
            risk_tolerance:        a.risk_tolerance,
            decision_consistency:  a.decision_consistency,
            assessment_version:    a.version.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub players:         PathBuf,
    pub bets:            PathBuf,
    pub assessments:     PathBuf,
    pub players_csv:     PathBuf,
    pub bets_csv:        PathBuf,
    pub assessments_csv: PathBuf,
}

/// Write every artifact into `dir`, creating it if needed.
pub fn export_dataset(dataset: &Dataset, dir: &Path) -> GenResult<ArtifactPaths> {
    fs::create_dir_all(dir)?;
    let paths = ArtifactPaths {
        players:         dir.join(PLAYERS_FILE),
        bets:            dir.join(BETS_FILE),
        assessments:     dir.join(ASSESSMENTS_FILE),
        players_csv:     dir.join(PLAYERS_CSV),
        bets_csv:        dir.join(BETS_CSV),
        assessments_csv: dir.join(ASSESSMENTS_CSV),
    };
    let players: Vec<PlayerRow> = dataset.players.iter().map(PlayerRow::from).collect();
    let bets: Vec<BetRow> = dataset.bets.iter().map(BetRow::from).collect();
    let assessments: Vec<AssessmentRow> = dataset.assessments.iter().map(AssessmentRow::from).collect();

    write_jsonl(&paths.players, &players)?;
    write_jsonl(&paths.bets, &bets)?;
    write_jsonl(&paths.assessments, &assessments)?;
    write_players_csv(&paths.players_csv, &players)?;
    write_bets_csv(&paths.bets_csv, &bets)?;
    write_assessments_csv(&paths.assessments_csv, &assessments)?;
    log::info!("Exported artifacts to {}", dir.display());
    Ok(paths)
}

pub fn write_players_csv(path: &Path, rows: &[PlayerRow]) -> GenResult<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{PLAYERS_HEADER}")?;
    for r in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            r.player_id,
            csv_field(&r.first_name),
            csv_field(&r.last_name),
            csv_field(&r.email),
            r.age,
            r.state,
            r.risk_cohort
        )?;
    }
    out.flush()?;
    Ok(rows.len())
}

/// A missing sport is written as an empty field.
pub fn write_bets_csv(path: &Path, rows: &[BetRow]) -> GenResult<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{BETS_HEADER}")?;
    for r in rows {
        writeln!(
            out,
            "{},{},{},{},{},{:.2},{},{}",
            r.bet_id,
            r.player_id,
            r.bet_timestamp,
            r.sport_category.as_deref().unwrap_or(""),
            r.market_type,
            r.bet_amount,
            r.odds_american,
            r.outcome
        )?;
    }
    out.flush()?;
    Ok(rows.len())
}

pub fn write_assessments_csv(path: &Path, rows: &[AssessmentRow]) -> GenResult<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{ASSESSMENTS_HEADER}")?;
    for r in rows {
        writeln!(
            out,
            "{},{},{},{:.2},{:.2},{:.2},{:.2},{}",
            r.assessment_id,
            r.player_id,
            r.assessment_date,
            r.sensitivity_to_loss,
            r.sensitivity_to_reward,
            r.risk_tolerance,
            r.decision_consistency,
            csv_field(&r.assessment_version)
        )?;
    }
    out.flush()?;
    Ok(rows.len())
}

/// Quote a free-text field when it holds a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One JSON object per line. Returns the number of rows written.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> GenResult<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut count = 0;
    for row in rows {
        serde_json::to_writer(&mut out, &row)?;
        out.write_all(b"\n")?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> GenResult<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}
