//! Validation Suite: blocking tiers gate, advisory tiers report.

use chrono::{Duration, NaiveDate};
use sentinel_core::{
    bet_sequence::BetEvent,
    config::GeneratorConfig,
    engine::{Dataset, Generator, RunRequest},
    types::{LatentDim, Outcome, Sport},
    validation::{BehaviorMetric, PlayerMetrics, ValidationReport, ValidationSuite},
};

fn generator() -> Generator {
    Generator::new(GeneratorConfig::default()).expect("default registry")
}

fn dataset(seed: u64, population: usize) -> Dataset {
    let request = RunRequest { validate: false, ..RunRequest::new(seed, population) };
    generator().run(&request).expect("run").dataset
}

fn validate(dataset: &Dataset, expected: usize) -> ValidationReport {
    let generator = generator();
    ValidationSuite::new(generator.registry()).run(dataset, expected)
}

#[test]
fn clean_run_passes_blocking_tiers() {
    let output = generator().run(&RunRequest::new(42, 2_000)).expect("run");
    let report = output.report.expect("validation requested");

    assert!(report.passed(), "blocking tiers failed:\n{}", report.render());
    assert_eq!(report.tiers.len(), 4);
    assert!(report.tier(1).unwrap().blocking && report.tier(2).unwrap().blocking);
    assert!(!report.tier(3).unwrap().blocking && !report.tier(4).unwrap().blocking);
    // The NULL_SPORT fixture is counted, not failed.
    assert_eq!(report.null_sport_count, 3);
    assert!(report.tier(2).unwrap().check("sport_nullable").unwrap().passed);
}

#[test]
fn stable_distributions_land_inside_tolerance() {
    let report = validate(&dataset(8, 2_000), 2_000);
    let tier3 = report.tier(3).expect("tier 3");
    for name in ["win_rate:low_risk", "sport_mix:low_risk"] {
        let check = tier3.check(name).unwrap_or_else(|| panic!("missing {name}"));
        assert!(check.passed, "{name}: {}", check.detail);
    }
}

#[test]
fn wrong_population_fails_tier_one() {
    let data = dataset(3, 300);
    let report = validate(&data, 301);
    assert!(!report.passed());
    assert!(!report.tier(1).unwrap().check("population_size").unwrap().passed);
}

#[test]
fn negative_stake_fails_tier_two() {
    let mut data = dataset(4, 300);
    data.bets[0].stake = -5.0;
    let report = validate(&data, 300);
    assert!(!report.passed());
    assert!(!report.tier(2).unwrap().check("stake_positive").unwrap().passed);
}

#[test]
fn decreasing_timestamp_fails_tier_two() {
    let mut data = dataset(5, 300);
    let pid = data.players[10].player_id.clone();
    let idx: Vec<usize> = data
        .bets
        .iter()
        .enumerate()
        .filter(|(_, b)| b.player_id == pid)
        .map(|(i, _)| i)
        .collect();
    assert!(idx.len() >= 2, "player {pid} needs two bets");
    data.bets[idx[1]].timestamp = data.bets[idx[0]].timestamp - Duration::hours(1);

    let report = validate(&data, 300);
    assert!(!report.passed());
    assert!(!report.tier(2).unwrap().check("timestamp_order").unwrap().passed);
}

#[test]
fn dangling_reference_fails_tier_two() {
    let mut data = dataset(6, 200);
    data.bets[0].player_id = "PLR_9999_MA".into();
    let report = validate(&data, 200);
    assert!(!report.tier(2).unwrap().check("player_references").unwrap().passed);
}

#[test]
fn correlations_carry_the_expected_sign() {
    let report = validate(&dataset(42, 3_000), 3_000);
    let achieved = |dim: LatentDim, metric: BehaviorMetric| {
        report
            .correlations
            .iter()
            .find(|c| c.trait_dim == dim && c.metric == metric)
            .and_then(|c| c.achieved)
            .unwrap_or_else(|| panic!("{}~{} undefined", dim.label(), metric.label()))
    };
    assert!(achieved(LatentDim::LossSensitivity, BehaviorMetric::BetEscalationRatio) > 0.0);
    assert!(achieved(LatentDim::DecisionConsistency, BehaviorMetric::TemporalRisk) < 0.0);
    // Advisory only: deviations never flip the blocking verdict.
    assert!(report.passed());
}

fn bet(hour: u32, outcome: Outcome, stake: f64, tier: Option<f64>) -> BetEvent {
    let timestamp = NaiveDate::from_ymd_opt(2026, 1, 5)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid timestamp");
    BetEvent {
        bet_id: format!("BET_{hour:08}"),
        player_id: "PLR_0001_MA".into(),
        timestamp,
        sport: tier.map(|_| Sport::Nfl),
        stake,
        odds_american: -110,
        outcome,
        market_tier: tier,
    }
}

#[test]
fn player_metrics_follow_their_definitions() {
    let bets = [
        bet(1, Outcome::Loss, 10.0, Some(1.0)),
        bet(3, Outcome::Loss, 20.0, Some(1.0)),
        bet(4, Outcome::Win, 40.0, Some(0.2)),
        bet(9, Outcome::Loss, 10.0, Some(0.2)),
    ];
    let refs: Vec<&BetEvent> = bets.iter().collect();
    let m = PlayerMetrics::compute("PLR_0001_MA", &refs);

    assert_eq!(m.bet_count, 4);
    // Two of three follow-up bets come after a loss.
    assert!((m.bet_after_loss_ratio.unwrap() - 2.0 / 3.0).abs() < 1e-12);
    // After loss: 20, 40 → 30. After win: 10.
    assert!((m.bet_escalation_ratio.unwrap() - 3.0).abs() < 1e-12);
    assert!((m.market_tier_drift.unwrap() - 0.8).abs() < 1e-12);
    // 03:00 and 04:00 are late-night; 01:00 and 09:00 are not.
    assert!((m.temporal_risk.unwrap() - 0.5).abs() < 1e-12);
}

#[test]
fn single_bet_leaves_sequence_metrics_undefined() {
    let bets = [bet(20, Outcome::Win, 10.0, None)];
    let refs: Vec<&BetEvent> = bets.iter().collect();
    let m = PlayerMetrics::compute("PLR_0001_MA", &refs);
    assert!(m.bet_after_loss_ratio.is_none());
    assert!(m.bet_escalation_ratio.is_none());
    assert!(m.market_tier_drift.is_none());
    assert_eq!(m.temporal_risk, Some(0.0));
}
