//! Validation Suite — four independent tiers over an assembled dataset.
//!
//!   Tier 1  counts         blocking
//!   Tier 2  quality        blocking
//!   Tier 3  distribution   advisory
//!   Tier 4  correlation    advisory
//!
//! Advisory deviations are reported and logged, never returned as errors.
//! Tier 4 targets are aspirational: outcomes are sampled independently of
//! the state machine, which attenuates trait/behaviour correlations. The
//! achieved values in the report are the contract.

use std::collections::{HashMap, HashSet};

use chrono::Timelike;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    bet_sequence::BetEvent,
    config::Registry,
    correlation_engine::pearson,
    engine::Dataset,
    marker_transformer::{SCORE_MAX, SCORE_MIN},
    player_generator::PlayerRecord,
    types::{Cohort, LatentDim, Outcome, Sport},
};

/// Hours counted as late-night for temporal risk (02:00–05:59).
pub const LATE_NIGHT_HOURS: std::ops::RangeInclusive<u32> = 2..=5;

/// Per-player behavioural ratios derived from the bets artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorMetric {
    /// Share of bets placed directly after a losing bet.
    BetAfterLossRatio,
    /// Mean stake after a loss over mean stake after a win.
    BetEscalationRatio,
    /// Mean market tier of the first half minus the second half.
    MarketTierDrift,
    /// Share of bets placed 02:00–05:59.
    TemporalRisk,
}

impl BehaviorMetric {
    pub fn label(self) -> &'static str {
        match self {
            Self::BetAfterLossRatio => "bet_after_loss_ratio",
            Self::BetEscalationRatio => "bet_escalation_ratio",
            Self::MarketTierDrift => "market_tier_drift",
            Self::TemporalRisk => "temporal_risk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMetrics {
    pub player_id:            String,
    pub bet_count:            usize,
    pub bet_after_loss_ratio: Option<f64>,
    pub bet_escalation_ratio: Option<f64>,
    pub market_tier_drift:    Option<f64>,
    pub temporal_risk:        Option<f64>,
}

impl PlayerMetrics {
    /// `bets` must be one player's bets in timestamp order.
    pub fn compute(player_id: &str, bets: &[&BetEvent]) -> Self {
        let n = bets.len();

        let bet_after_loss_ratio = (n >= 2).then(|| {
            let after_loss = bets.windows(2).filter(|w| w[0].outcome == Outcome::Loss).count();
            after_loss as f64 / (n - 1) as f64
        });

        let (mut after_loss, mut after_win) = (Vec::new(), Vec::new());
        for w in bets.windows(2) {
            match w[0].outcome {
                Outcome::Loss => after_loss.push(w[1].stake),
                Outcome::Win => after_win.push(w[1].stake),
            }
        }
        let bet_escalation_ratio = (!after_loss.is_empty() && !after_win.is_empty())
            .then(|| mean(&after_loss) / mean(&after_win).max(0.01));

        let tiers: Vec<f64> = bets.iter().filter_map(|b| b.market_tier).collect();
        let market_tier_drift = (tiers.len() >= 2).then(|| {
            let (early, late) = tiers.split_at(tiers.len() / 2);
            mean(early) - mean(late)
        });

        let temporal_risk = (n > 0).then(|| {
            let late = bets
                .iter()
                .filter(|b| LATE_NIGHT_HOURS.contains(&b.timestamp.hour()))
                .count();
            late as f64 / n as f64
        });

        Self {
            player_id: player_id.to_string(),
            bet_count: n,
            bet_after_loss_ratio,
            bet_escalation_ratio,
            market_tier_drift,
            temporal_risk,
        }
    }

    pub fn get(&self, metric: BehaviorMetric) -> Option<f64> {
        match metric {
            BehaviorMetric::BetAfterLossRatio => self.bet_after_loss_ratio,
            BehaviorMetric::BetEscalationRatio => self.bet_escalation_ratio,
            BehaviorMetric::MarketTierDrift => self.market_tier_drift,
            BehaviorMetric::TemporalRisk => self.temporal_risk,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name:   String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn new(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self { name: name.into(), passed, detail: detail.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierReport {
    pub tier:     u8,
    pub name:     String,
    pub blocking: bool,
    pub checks:   Vec<CheckResult>,
}

impl TierReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn deviations(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub trait_dim:        LatentDim,
    pub metric:           BehaviorMetric,
    pub target:           f64,
    pub achieved:         Option<f64>,
    pub sample_size:      usize,
    pub within_tolerance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tiers:            Vec<TierReport>,
    pub correlations:     Vec<CorrelationResult>,
    pub null_sport_count: usize,
}

impl ValidationReport {
    /// True when every blocking tier passed.
    pub fn passed(&self) -> bool {
        self.tiers.iter().filter(|t| t.blocking).all(TierReport::passed)
    }

    pub fn tier(&self, tier: u8) -> Option<&TierReport> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    pub fn deviation_count(&self) -> usize {
        self.tiers.iter().map(|t| t.deviations().count()).sum()
    }

    /// Human-readable multi-line summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for tier in &self.tiers {
            let status = if tier.passed() { "PASS" } else if tier.blocking { "FAIL" } else { "DEVIATION" };
            out.push_str(&format!("Tier {} ({}): {}\n", tier.tier, tier.name, status));
            for check in &tier.checks {
                let mark = if check.passed { "ok " } else { "!! " };
                out.push_str(&format!("  {mark}{:<28} {}\n", check.name, check.detail));
            }
        }
        out
    }
}

pub struct ValidationSuite<'a> {
    registry: &'a Registry,
}

impl<'a> ValidationSuite<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub fn run(&self, dataset: &Dataset, expected_population: usize) -> ValidationReport {
        let by_player = bets_by_player(dataset);
        let null_sport_count = dataset.bets.iter().filter(|b| b.sport.is_none()).count();

        let tiers = vec![
            self.tier1_counts(dataset, expected_population, &by_player),
            self.tier2_quality(dataset, &by_player, null_sport_count),
            self.tier3_distribution(dataset, &by_player),
        ];
        let correlations = self.correlations(dataset, &by_player);
        let tier4 = TierReport {
            tier: 4,
            name: "correlation".into(),
            blocking: false,
            checks: correlations
                .iter()
                .map(|c| {
                    let name = format!("{}~{}", c.trait_dim.label(), c.metric.label());
                    let detail = match c.achieved {
                        Some(r) => format!("r={r:.3} target={:.2} n={}", c.target, c.sample_size),
                        None => format!("undefined (n={})", c.sample_size),
                    };
                    CheckResult::new(name, c.within_tolerance, detail)
                })
                .collect(),
        };

        let mut report = ValidationReport { tiers, correlations, null_sport_count };
        report.tiers.push(tier4);

        for tier in &report.tiers {
            for check in tier.deviations() {
                warn!("Tier {} {}: {}", tier.tier, check.name, check.detail);
            }
        }
        info!(
            "Validation finished: blocking {} with {} deviation(s)",
            if report.passed() { "passed" } else { "failed" },
            report.deviation_count()
        );
        report
    }

    // ── Tier 1 ─────────────────────────────────────────────────

    fn tier1_counts(
        &self,
        dataset: &Dataset,
        expected_population: usize,
        by_player: &HashMap<&str, Vec<&BetEvent>>,
    ) -> TierReport {
        let thresholds = &self.registry.config().validation;
        let mut checks = Vec::new();

        let n = dataset.players.len();
        checks.push(CheckResult::new(
            "population_size",
            n == expected_population,
            format!("{n} players (expected {expected_population})"),
        ));

        let mut expected_bets = 0.0;
        for p in &dataset.players {
            expected_bets += match p.edge_case {
                Some(_) => bet_count(by_player, &p.player_id) as f64,
                None => self.registry.expected_bets_per_player(p.cohort),
            };
        }
        let actual = dataset.bets.len() as f64;
        let deviation = if expected_bets > 0.0 { (actual - expected_bets).abs() / expected_bets } else { 0.0 };
        checks.push(CheckResult::new(
            "bet_count",
            deviation <= thresholds.bet_count_tolerance,
            format!(
                "{actual:.0} bets vs expected {expected_bets:.0} ({:+.1}%, tolerance ±{:.0}%)",
                100.0 * (actual - expected_bets) / expected_bets.max(1.0),
                100.0 * thresholds.bet_count_tolerance
            ),
        ));

        let forced_missing = dataset
            .players
            .iter()
            .filter(|p| p.edge_case.is_some() && dataset.assessment(&p.player_id).is_none())
            .count();
        let generated = dataset.players.iter().filter(|p| p.edge_case.is_none()).count() as f64;
        let rate = self.registry.config().markers.missing_rate;
        let expected_assessments = (n - forced_missing) as f64 - rate * generated;
        let allowance = 3.0 * (generated * rate * (1.0 - rate)).sqrt();
        let got = dataset.assessments.len() as f64;
        checks.push(CheckResult::new(
            "assessment_count",
            (got - expected_assessments).abs() <= allowance + 1e-9,
            format!("{got:.0} assessments (expected {expected_assessments:.0})"),
        ));

        TierReport { tier: 1, name: "counts".into(), blocking: true, checks }
    }

    // ── Tier 2 ─────────────────────────────────────────────────

    fn tier2_quality(
        &self,
        dataset: &Dataset,
        by_player: &HashMap<&str, Vec<&BetEvent>>,
        null_sport_count: usize,
    ) -> TierReport {
        let config = self.registry.config();
        let mut checks = Vec::new();

        let player_ids: HashSet<&str> = dataset.players.iter().map(|p| p.player_id.as_str()).collect();
        let required_missing = dataset
            .players
            .iter()
            .filter(|p| {
                p.player_id.is_empty()
                    || p.first_name.is_empty()
                    || p.last_name.is_empty()
                    || p.email.is_empty()
            })
            .count();
        checks.push(CheckResult::new(
            "player_required_fields",
            required_missing == 0,
            format!("{required_missing} player(s) with empty required fields"),
        ));
        checks.push(unique_check("player_id_unique", dataset.players.iter().map(|p| p.player_id.as_str())));
        checks.push(unique_check("bet_id_unique", dataset.bets.iter().map(|b| b.bet_id.as_str())));
        checks.push(unique_check(
            "assessment_id_unique",
            dataset.assessments.iter().map(|a| a.assessment_id.as_str()),
        ));

        let dangling = dataset
            .bets
            .iter()
            .map(|b| b.player_id.as_str())
            .chain(dataset.assessments.iter().map(|a| a.player_id.as_str()))
            .filter(|id| !player_ids.contains(id))
            .count();
        checks.push(CheckResult::new(
            "player_references",
            dangling == 0,
            format!("{dangling} record(s) reference unknown players"),
        ));

        let (age_lo, age_hi) = config.age_range;
        let bad_age = dataset.players.iter().filter(|p| p.age < age_lo || p.age > age_hi).count();
        checks.push(CheckResult::new(
            "age_range",
            bad_age == 0,
            format!("{bad_age} age(s) outside {age_lo}..={age_hi}"),
        ));

        let bad_stake = dataset.bets.iter().filter(|b| !(b.stake.is_finite() && b.stake > 0.0)).count();
        checks.push(CheckResult::new(
            "stake_positive",
            bad_stake == 0,
            format!("{bad_stake} non-positive stake(s)"),
        ));

        let bad_odds = dataset.bets.iter().filter(|b| b.odds_american.abs() < 100).count();
        checks.push(CheckResult::new(
            "odds_domain",
            bad_odds == 0,
            format!("{bad_odds} price(s) inside (-100, 100)"),
        ));

        let bad_scores = dataset
            .assessments
            .iter()
            .flat_map(|a| a.scores())
            .filter(|s| !(SCORE_MIN..=SCORE_MAX).contains(s))
            .count();
        checks.push(CheckResult::new(
            "score_bounds",
            bad_scores == 0,
            format!("{bad_scores} score(s) outside [0, 100]"),
        ));

        let (start, end) = (self.registry.window_start(), self.registry.window_end());
        let outside = dataset.bets.iter().filter(|b| b.timestamp < start || b.timestamp > end).count();
        checks.push(CheckResult::new(
            "timestamp_window",
            outside == 0,
            format!("{outside} bet(s) outside the window"),
        ));

        let unordered = by_player
            .values()
            .filter(|bets| bets.windows(2).any(|w| w[1].timestamp < w[0].timestamp))
            .count();
        checks.push(CheckResult::new(
            "timestamp_order",
            unordered == 0,
            format!("{unordered} player(s) with decreasing timestamps"),
        ));

        checks.push(CheckResult::new(
            "sport_nullable",
            true,
            format!("{null_sport_count} bet(s) with no sport"),
        ));

        TierReport { tier: 2, name: "quality".into(), blocking: true, checks }
    }

    // ── Tier 3 ─────────────────────────────────────────────────

    fn tier3_distribution(
        &self,
        dataset: &Dataset,
        by_player: &HashMap<&str, Vec<&BetEvent>>,
    ) -> TierReport {
        let config = self.registry.config();
        let thresholds = &config.validation;
        let generated: Vec<&PlayerRecord> =
            dataset.players.iter().filter(|p| p.edge_case.is_none()).collect();
        let n = generated.len();
        let mut checks = Vec::new();

        // Cohort mix.
        for row in &config.cohorts {
            let count = generated.iter().filter(|p| p.cohort == row.cohort).count();
            checks.push(share_check(
                &format!("cohort_mix:{}", row.cohort.label()),
                count,
                n,
                row.population_share,
                thresholds.cohort_tolerance,
            ));
        }

        // Jurisdiction mix.
        for row in &config.jurisdictions {
            let count = generated.iter().filter(|p| p.jurisdiction == row.jurisdiction).count();
            checks.push(share_check(
                &format!("jurisdiction_mix:{}", row.jurisdiction.code()),
                count,
                n,
                row.share,
                thresholds.jurisdiction_tolerance,
            ));
        }

        // Sport mix and hour-of-day for the non-drifting, unimodal cohort.
        let baseline_bets: Vec<&BetEvent> = generated
            .iter()
            .filter(|p| p.cohort == Cohort::LowRisk)
            .flat_map(|p| by_player.get(p.player_id.as_str()).into_iter().flatten().copied())
            .collect();
        let m = baseline_bets.len();
        if m > 0 {
            let mut within = true;
            let mut worst: (Sport, f64) = (Sport::Nfl, 0.0);
            for row in &config.sports {
                let count = baseline_bets.iter().filter(|b| b.sport == Some(row.sport)).count();
                let dev = (count as f64 / m as f64 - row.baseline_share).abs();
                within &= dev <= band(row.baseline_share, m, thresholds.sport_tolerance);
                if dev > worst.1 {
                    worst = (row.sport, dev);
                }
            }
            checks.push(CheckResult::new(
                "sport_mix:low_risk",
                within,
                format!("largest deviation {:.3} on {} over {m} bets", worst.1, worst.0.code()),
            ));

            let expected = config.hours.primetime.probabilities();
            let mut observed = [0usize; 24];
            for b in &baseline_bets {
                observed[b.timestamp.hour() as usize] += 1;
            }
            let tv: f64 = (0..24)
                .map(|h| (observed[h] as f64 / m as f64 - expected[h]).abs())
                .sum::<f64>()
                / 2.0;
            let allowance: f64 = expected.iter().map(|p| (p * (1.0 - p) / m as f64).sqrt()).sum();
            checks.push(CheckResult::new(
                "hour_histogram:low_risk",
                tv <= thresholds.hour_tolerance + allowance,
                format!("total variation {tv:.3} (tolerance {:.3})", thresholds.hour_tolerance + allowance),
            ));
        }

        // Late-night share should not fall as cohort risk rises.
        let mut shares = Vec::new();
        for cohort in Cohort::ALL {
            let bets: Vec<&BetEvent> = generated
                .iter()
                .filter(|p| p.cohort == cohort)
                .flat_map(|p| by_player.get(p.player_id.as_str()).into_iter().flatten().copied())
                .collect();
            if bets.len() >= 50 {
                let late = bets.iter().filter(|b| LATE_NIGHT_HOURS.contains(&b.timestamp.hour())).count();
                shares.push((cohort, late as f64 / bets.len() as f64));
            }
        }
        let ordered = shares.windows(2).all(|w| w[1].1 + 0.01 >= w[0].1);
        checks.push(CheckResult::new(
            "late_night_by_cohort",
            ordered,
            shares
                .iter()
                .map(|(c, s)| format!("{}={s:.3}", c.label()))
                .collect::<Vec<_>>()
                .join(" "),
        ));

        // Realized win rate per cohort.
        for row in &config.cohorts {
            let bets: Vec<&BetEvent> = generated
                .iter()
                .filter(|p| p.cohort == row.cohort)
                .flat_map(|p| by_player.get(p.player_id.as_str()).into_iter().flatten().copied())
                .collect();
            if bets.is_empty() {
                continue;
            }
            let wins = bets.iter().filter(|b| b.outcome == Outcome::Win).count();
            checks.push(share_check(
                &format!("win_rate:{}", row.cohort.label()),
                wins,
                bets.len(),
                row.win_rate,
                thresholds.win_rate_tolerance,
            ));
        }

        TierReport { tier: 3, name: "distribution".into(), blocking: false, checks }
    }

    // ── Tier 4 ─────────────────────────────────────────────────

    fn correlations(
        &self,
        dataset: &Dataset,
        by_player: &HashMap<&str, Vec<&BetEvent>>,
    ) -> Vec<CorrelationResult> {
        let config = self.registry.config();
        let metrics: Vec<(&PlayerRecord, PlayerMetrics)> = dataset
            .players
            .iter()
            .filter(|p| p.edge_case.is_none())
            .map(|p| {
                let bets = by_player.get(p.player_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                (p, PlayerMetrics::compute(&p.player_id, bets))
            })
            .collect();

        config
            .correlation_targets
            .iter()
            .map(|target| {
                let (xs, ys): (Vec<f64>, Vec<f64>) = metrics
                    .iter()
                    .filter_map(|(p, m)| m.get(target.metric).map(|y| (p.latent.get(target.trait_dim), y)))
                    .unzip();
                let achieved = pearson(&xs, &ys);
                let within_tolerance = achieved
                    .map(|r| (r - target.target).abs() <= config.validation.correlation_tolerance)
                    .unwrap_or(false);
                CorrelationResult {
                    trait_dim: target.trait_dim,
                    metric: target.metric,
                    target: target.target,
                    achieved,
                    sample_size: xs.len(),
                    within_tolerance,
                }
            })
            .collect()
    }
}

fn bets_by_player(dataset: &Dataset) -> HashMap<&str, Vec<&BetEvent>> {
    let mut map: HashMap<&str, Vec<&BetEvent>> = HashMap::new();
    for bet in &dataset.bets {
        map.entry(bet.player_id.as_str()).or_default().push(bet);
    }
    map
}

fn bet_count(by_player: &HashMap<&str, Vec<&BetEvent>>, player_id: &str) -> usize {
    by_player.get(player_id).map_or(0, Vec::len)
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

/// Tolerance band for an observed share: the configured floor or three
/// binomial standard errors, whichever is wider.
fn band(p: f64, n: usize, floor: f64) -> f64 {
    if n == 0 {
        return f64::INFINITY;
    }
    floor.max(3.0 * (p * (1.0 - p) / n as f64).sqrt())
}

fn share_check(name: &str, count: usize, n: usize, target: f64, floor: f64) -> CheckResult {
    let observed = if n == 0 { 0.0 } else { count as f64 / n as f64 };
    let band = band(target, n, floor);
    CheckResult::new(
        name,
        (observed - target).abs() <= band,
        format!("{observed:.4} vs target {target:.4} (±{band:.4})"),
    )
}

fn unique_check<'a>(name: &str, ids: impl Iterator<Item = &'a str>) -> CheckResult {
    let mut seen = HashSet::new();
    let mut duplicates = 0;
    let mut empty = 0;
    for id in ids {
        if id.is_empty() {
            empty += 1;
        } else if !seen.insert(id) {
            duplicates += 1;
        }
    }
    CheckResult::new(
        name,
        duplicates == 0 && empty == 0,
        format!("{duplicates} duplicate(s), {empty} empty"),
    )
}
