//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Same seed, same request ⇒ byte-identical artifacts, regardless of how
//! many worker threads generated them. Any divergence is a blocker.

use std::{fs, path::PathBuf};

use sentinel_core::{
    config::GeneratorConfig,
    engine::{Dataset, Generator, RunRequest},
    export::{
        export_dataset, read_jsonl, AssessmentRow, BetRow, PlayerRow, ASSESSMENTS_CSV, ASSESSMENTS_FILE,
        BETS_CSV, BETS_FILE, PLAYERS_CSV, PLAYERS_FILE,
    },
};

fn generator() -> Generator {
    Generator::new(GeneratorConfig::default()).expect("default registry")
}

fn run(seed: u64, population: usize, threads: Option<usize>) -> Dataset {
    let _ = env_logger::builder().is_test(true).try_init();
    let request = RunRequest { threads, validate: false, ..RunRequest::new(seed, population) };
    generator().run(&request).expect("run").dataset
}

/// Every published row, serialized, in artifact order.
fn artifact_lines(dataset: &Dataset) -> Vec<String> {
    let players = dataset.players.iter().map(|p| serde_json::to_string(&PlayerRow::from(p)));
    let bets = dataset.bets.iter().map(|b| serde_json::to_string(&BetRow::from(b)));
    let assessments = dataset
        .assessments
        .iter()
        .map(|a| serde_json::to_string(&AssessmentRow::from(a)));
    players
        .chain(bets)
        .chain(assessments)
        .map(|line| line.expect("serialize row"))
        .collect()
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sentinel-det-{}-{tag}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn same_seed_produces_identical_artifacts() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    let a = artifact_lines(&run(SEED, 600, None));
    let b = artifact_lines(&run(SEED, 600, None));

    assert_eq!(a.len(), b.len(), "artifact lengths differ: {} vs {}", a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert_eq!(x, y, "artifacts diverged at line {i}:\n  A: {x}\n  B: {y}");
    }
}

#[test]
fn worker_count_does_not_change_output() {
    let single = artifact_lines(&run(42, 400, Some(1)));
    let many = artifact_lines(&run(42, 400, Some(4)));
    let global = artifact_lines(&run(42, 400, None));
    assert_eq!(single, many);
    assert_eq!(single, global);
}

#[test]
fn different_seeds_diverge() {
    let a = run(1, 200, None);
    let b = run(2, 200, None);
    assert_ne!(artifact_lines(&a), artifact_lines(&b));
}

#[test]
fn seed_42_hundred_players_is_reproducible_on_disk() {
    let first = run(42, 100, None);
    let second = run(42, 100, None);
    assert_eq!(first.bets.len(), second.bets.len());

    // The count follows the weekly-rate × window formula.
    let g = generator();
    let registry = g.registry();
    let expected: f64 = first
        .players
        .iter()
        .map(|p| match p.edge_case {
            Some(_) => first.bets_for(&p.player_id).count() as f64,
            None => registry.expected_bets_per_player(p.cohort),
        })
        .sum();
    let actual = first.bets.len() as f64;
    assert!(
        (actual - expected).abs() / expected <= 0.20,
        "seed 42 produced {actual} bets, formula expects {expected:.0}"
    );

    let dir_a = scratch_dir("a");
    let dir_b = scratch_dir("b");
    let paths = export_dataset(&first, &dir_a).expect("export a");
    export_dataset(&second, &dir_b).expect("export b");
    for file in [PLAYERS_FILE, BETS_FILE, ASSESSMENTS_FILE, PLAYERS_CSV, BETS_CSV, ASSESSMENTS_CSV] {
        let a = fs::read(dir_a.join(file)).expect("read a");
        let b = fs::read(dir_b.join(file)).expect("read b");
        assert!(!a.is_empty(), "{file} is empty");
        assert_eq!(a, b, "{file} differs between runs");
    }

    // JSON Lines read back into the same rows.
    let players: Vec<PlayerRow> = read_jsonl(&paths.players).expect("read players");
    assert_eq!(players, first.players.iter().map(PlayerRow::from).collect::<Vec<_>>());
    let bets: Vec<BetRow> = read_jsonl(&paths.bets).expect("read bets");
    assert_eq!(bets.len(), first.bets.len());
    for (row, bet) in bets.iter().zip(&first.bets) {
        let expected = BetRow::from(bet);
        assert_eq!(
            (&row.bet_id, &row.player_id, &row.bet_timestamp, &row.outcome),
            (&expected.bet_id, &expected.player_id, &expected.bet_timestamp, &expected.outcome)
        );
        assert_eq!(row.sport_category, expected.sport_category);
    }
    let assessments: Vec<AssessmentRow> = read_jsonl(&paths.assessments).expect("read assessments");
    assert_eq!(assessments.len(), first.assessments.len());

    // CSV: header plus one line per row.
    let csv_lines = |path: &PathBuf| fs::read_to_string(path).expect("read csv").lines().count();
    assert_eq!(csv_lines(&paths.players_csv), first.players.len() + 1);
    assert_eq!(csv_lines(&paths.bets_csv), first.bets.len() + 1);
    assert_eq!(csv_lines(&paths.assessments_csv), first.assessments.len() + 1);
    let bets_csv = fs::read_to_string(&paths.bets_csv).expect("read bets csv");
    assert!(bets_csv.starts_with(
        "bet_id,player_id,bet_timestamp,sport_category,market_type,bet_amount,odds_american,outcome\n"
    ));

    let _ = fs::remove_dir_all(&dir_a);
    let _ = fs::remove_dir_all(&dir_b);
}
