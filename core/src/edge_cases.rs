//! Edge-Case Injector.
//!
//! A fixed table of player sequence numbers whose generated records are
//! replaced by deterministic constructions. Nothing here draws randomness,
//! so applying the injector twice yields the same population as applying it once.

use chrono::{Duration, NaiveDateTime};
use log::info;

use crate::{
    bet_sequence::{round_stake, Wager},
    config::Registry,
    engine::{PlayerOutput, Population},
    error::{GenError, GenResult},
    marker_transformer::MarkerTransformer,
    player_generator::{BehaviorProfile, LatentTraits, PlayerRecord},
    types::{player_id, Cohort, Jurisdiction, Outcome, Sport},
};

const PRIMETIME_HOUR: i64 = 20;
const FIXED_ODDS: i32 = -110;
const EXCLUSION_GAP_DAYS: i64 = 30;
const ROTATION: [Sport; 4] = [Sport::Nfl, Sport::Nba, Sport::Mlb, Sport::Nhl];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeCaseKind {
    AlwaysWin,
    AlwaysLoss,
    SingleBet,
    SingleSport(Sport),
    FixedHour(u32),
    MinimumStake,
    MaximumStake(f64),
    MissingAssessment,
    NullSport { count: usize },
    SelfExclusionReversal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCaseSpec {
    /// 1-based player sequence number.
    pub sequence:     usize,
    pub label:        &'static str,
    pub kind:         EdgeCaseKind,
    pub first_name:   &'static str,
    pub last_name:    &'static str,
    pub age:          u32,
    pub jurisdiction: Jurisdiction,
    pub cohort:       Cohort,
    pub bet_count:    usize,
}

impl EdgeCaseSpec {
    pub fn player_id(&self) -> String {
        player_id(self.sequence - 1, self.jurisdiction.code())
    }

    pub fn email(&self) -> String {
        format!(
            "{}.{}@example.com",
            self.first_name.to_ascii_lowercase(),
            self.last_name.to_ascii_lowercase()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCaseTable {
    entries: Vec<EdgeCaseSpec>,
}

impl EdgeCaseTable {
    pub fn standard() -> Self {
        use EdgeCaseKind::*;
        use Jurisdiction::*;
        let row = |sequence, label, kind, first_name, last_name, age, jurisdiction, cohort, bet_count| {
            EdgeCaseSpec {
                sequence, label, kind, first_name, last_name, age, jurisdiction, cohort, bet_count,
            }
        };
        Self {
            entries: vec![
                row(1, "ALWAYS_WIN", AlwaysWin, "Lucky", "Winner", 35, Ma, Cohort::LowRisk, 10),
                row(2, "ALWAYS_LOSS", AlwaysLoss, "Unlucky", "Loser", 42, Nj, Cohort::Critical, 15),
                row(3, "SINGLE_BET", SingleBet, "One", "Timer", 28, Pa, Cohort::LowRisk, 1),
                row(42, "TABLE_TENNIS_ONLY", SingleSport(Sport::TableTennis), "Ping", "Pong", 31, Ma, Cohort::HighRisk, 20),
                row(99, "THREE_AM_ONLY", FixedHour(3), "Night", "Owl", 39, Nj, Cohort::Critical, 25),
                row(156, "PENNY_BETTOR", MinimumStake, "Penny", "Pincher", 65, Ma, Cohort::LowRisk, 50),
                row(203, "WHALE", MaximumStake(10_000.0), "High", "Roller", 55, Pa, Cohort::Critical, 30),
                row(333, "NO_ASSESSMENT", MissingAssessment, "Missing", "Data", 44, Nj, Cohort::MediumRisk, 12),
                row(405, "NULL_SPORT", NullSport { count: 3 }, "Null", "Sport", 37, Ma, Cohort::LowRisk, 18),
                row(500, "SELF_EXCLUSION_REVERSAL", SelfExclusionReversal, "Self", "Excluded", 48, Pa, Cohort::Critical, 22),
            ],
        }
    }

    /// The standard table restricted to sequences that exist in a population of `n`.
    pub fn for_population(n: usize) -> Self {
        let mut table = Self::standard();
        table.entries.retain(|e| e.sequence >= 1 && e.sequence <= n);
        table
    }

    /// Labels of standard entries a population of `n` cannot hold.
    pub fn unreachable_labels(n: usize) -> Vec<&'static str> {
        Self::standard()
            .entries
            .iter()
            .filter(|e| e.sequence == 0 || e.sequence > n)
            .map(|e| e.label)
            .collect()
    }

    pub fn new(entries: Vec<EdgeCaseSpec>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[EdgeCaseSpec] {
        &self.entries
    }

    pub fn find(&self, label: &str) -> Option<&EdgeCaseSpec> {
        self.entries.iter().find(|e| e.label == label)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct EdgeCaseInjector<'a> {
    registry: &'a Registry,
    table:    EdgeCaseTable,
}

impl<'a> EdgeCaseInjector<'a> {
    /// Fails fast if any entry falls outside `1..=population`.
    pub fn new(registry: &'a Registry, table: EdgeCaseTable, population: usize) -> GenResult<Self> {
        if let Some(bad) = table
            .entries
            .iter()
            .find(|e| e.sequence == 0 || e.sequence > population)
        {
            return Err(GenError::EdgeCaseOutOfRange {
                player_seq: bad.sequence,
                population,
            });
        }
        Ok(Self { registry, table })
    }

    pub fn table(&self) -> &EdgeCaseTable {
        &self.table
    }

    /// Replace every listed player's record. Returns the number replaced.
    pub fn apply(&self, population: &mut Population) -> usize {
        let mut replaced = 0;
        for spec in &self.table.entries {
            if let Some(slot) = population.players.get_mut(spec.sequence - 1) {
                *slot = self.build(spec);
                replaced += 1;
            }
        }
        info!("Injected {} edge-case player(s)", replaced);
        replaced
    }

    /// Deterministic record for one table entry.
    pub fn build(&self, spec: &EdgeCaseSpec) -> PlayerOutput {
        let registry = self.registry;
        let player = PlayerRecord {
            player_id:     spec.player_id(),
            index:         spec.sequence - 1,
            cohort:        spec.cohort,
            jurisdiction:  spec.jurisdiction,
            first_name:    spec.first_name.to_string(),
            last_name:     spec.last_name.to_string(),
            email:         spec.email(),
            age:           spec.age,
            latent:        LatentTraits { values: registry.cohort(spec.cohort).latent_means },
            profile:       BehaviorProfile::cohort_midpoint(registry, spec.cohort),
            self_excluded: spec.kind == EdgeCaseKind::SelfExclusionReversal,
            edge_case:     Some(spec.label),
        };

        let assessment = match spec.kind {
            EdgeCaseKind::MissingAssessment => None,
            _ => {
                let back = registry.config().window.assessment_lookback_days as i64 / 2;
                let date = registry.config().window.start - Duration::days(back);
                Some(MarkerTransformer::assess_exact(registry, &player, date))
            }
        };

        let wagers = self.wagers(spec, &player.profile);
        PlayerOutput { player, assessment, wagers }
    }

    fn wagers(&self, spec: &EdgeCaseSpec, profile: &BehaviorProfile) -> Vec<Wager> {
        let registry = self.registry;
        let stakes = &registry.config().stakes;
        let win_rate = registry.cohort(spec.cohort).win_rate;
        let days = registry.config().window.days as i64;
        let n = spec.bet_count.max(1);

        let null_every = match spec.kind {
            EdgeCaseKind::NullSport { count } if count > 0 => Some((n / count).max(1)),
            _ => None,
        };
        let null_count = match spec.kind {
            EdgeCaseKind::NullSport { count } => count,
            _ => 0,
        };

        (0..n)
            .map(|k| {
                let hour = match spec.kind {
                    EdgeCaseKind::FixedHour(h) => h as i64,
                    _ => PRIMETIME_HOUR,
                };
                let day = match spec.kind {
                    EdgeCaseKind::SelfExclusionReversal => exclusion_day(k, n, days),
                    _ => k as i64 * days / n as i64,
                };
                let timestamp = registry.window_start() + Duration::days(day) + Duration::hours(hour);

                let outcome = match spec.kind {
                    EdgeCaseKind::AlwaysWin => Outcome::Win,
                    EdgeCaseKind::AlwaysLoss => Outcome::Loss,
                    _ => spread_outcome(k, win_rate),
                };

                let sport = match (spec.kind, null_every) {
                    (EdgeCaseKind::SingleSport(s), _) => Some(s),
                    (_, Some(every)) if k % every == 0 && k / every < null_count => None,
                    _ => Some(ROTATION[k % ROTATION.len()]),
                };

                let raw = match spec.kind {
                    EdgeCaseKind::MinimumStake => stakes.min_stake,
                    EdgeCaseKind::MaximumStake(amount) => amount,
                    EdgeCaseKind::SelfExclusionReversal if 2 * k >= n => {
                        let step = (k - n / 2 + 1) as i32;
                        profile.base_stake
                            * profile.escalation_ratio.powi(step).min(stakes.max_escalation_multiplier)
                    }
                    _ => profile.base_stake,
                };
                let (stake, _) = round_stake(raw, stakes.min_stake);

                Wager { timestamp: clamp_to_window(registry, timestamp), sport, stake, odds_american: FIXED_ODDS, outcome }
            })
            .collect()
    }
}

/// First half before the exclusion, then a gap, then the reversal burst.
fn exclusion_day(k: usize, n: usize, days: i64) -> i64 {
    let before = (days - EXCLUSION_GAP_DAYS) / 2;
    let after_start = before + EXCLUSION_GAP_DAYS;
    let half = (n / 2).max(1);
    if k < n / 2 {
        k as i64 * before / half as i64
    } else {
        let tail = (n - n / 2).max(1);
        after_start + (k - n / 2) as i64 * (days - after_start) / tail as i64
    }
}

/// Deterministic outcome pattern whose running win share tracks `win_rate`.
fn spread_outcome(k: usize, win_rate: f64) -> Outcome {
    let before = (k as f64 * win_rate).floor();
    let after = ((k + 1) as f64 * win_rate).floor();
    if after > before { Outcome::Win } else { Outcome::Loss }
}

fn clamp_to_window(registry: &Registry, ts: NaiveDateTime) -> NaiveDateTime {
    ts.min(registry.window_end())
}
