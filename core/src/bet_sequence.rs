//! Bet Sequence Generator — per-player wager synthesis.
//!
//! STATE MACHINE (one per player, strictly sequential):
//!
//!   NORMAL     --loss, p = chase_probability-->  CHASING
//!   CHASING    --loss-->                         ESCALATING
//!   ESCALATING --loss-->                         ESCALATING
//!   any        --win-->                          NORMAL (loss counter reset)
//!
//! Stakes:
//!   NORMAL      base × U(1 - v, 1 + v)
//!   CHASING     base × min(ratio × U(1 - cv, 1 + cv), cap)
//!   ESCALATING  base × min(ratio ^ consecutive_losses, cap)
//!
//! RULES:
//!   - Outcomes are Bernoulli(cohort win rate), independent of state.
//!   - Timestamps are non-decreasing; violations are clamped in place.
//!   - Stakes are floored at the registry minimum and rounded to cents.
//!   - Gaps are exponential. Chasing gaps are scaled by chase_gap_factor,
//!     and the base gap is sized on the stationary chasing share so the
//!     expected schedule spans the whole window.
//!   - Generation stops at window exhaustion or the bet target.

use chrono::{Duration, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    config::Registry,
    player_generator::{BehaviorProfile, PlayerRecord},
    rng::StreamRng,
    types::{BetId, Cohort, Outcome, PlayerId, Sport},
};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Lines offered on major markets most of the time.
const STANDARD_LINES: [i32; 6] = [-110, -105, -115, -120, 100, 110];
const STANDARD_LINE_SHARE: f64 = 0.70;

pub const MARKET_TYPE: &str = "moneyline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BehavioralState {
    Normal,
    Chasing,
    Escalating,
}

/// Transient FSM for one player. Discarded once the sequence is built.
#[derive(Debug, Clone, PartialEq)]
pub struct BettingStateMachine {
    state: BehavioralState,
    consecutive_losses: u32,
}

impl Default for BettingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl BettingStateMachine {
    pub fn new() -> Self {
        Self { state: BehavioralState::Normal, consecutive_losses: 0 }
    }

    pub fn state(&self) -> BehavioralState {
        self.state
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn is_chasing(&self) -> bool {
        self.state != BehavioralState::Normal
    }

    /// Apply one outcome. The chase draw is only consumed on a NORMAL loss.
    pub fn on_outcome(
        &mut self,
        outcome: Outcome,
        chase_probability: f64,
        rng: &mut StreamRng,
    ) -> BehavioralState {
        match outcome {
            Outcome::Win => {
                self.state = BehavioralState::Normal;
                self.consecutive_losses = 0;
            }
            Outcome::Loss => {
                self.consecutive_losses += 1;
                self.state = match self.state {
                    BehavioralState::Normal if rng.chance(chase_probability) => {
                        BehavioralState::Chasing
                    }
                    BehavioralState::Normal => BehavioralState::Normal,
                    BehavioralState::Chasing | BehavioralState::Escalating => {
                        BehavioralState::Escalating
                    }
                };
            }
        }
        self.state
    }

    /// Stake multiplier over the base stake for the current state.
    pub fn stake_multiplier(&self, registry: &Registry, ratio: f64, rng: &mut StreamRng) -> f64 {
        let stakes = &registry.config().stakes;
        let cap = stakes.max_escalation_multiplier;
        match self.state {
            BehavioralState::Normal => {
                rng.uniform(1.0 - stakes.normal_variance, 1.0 + stakes.normal_variance)
            }
            BehavioralState::Chasing => {
                let jitter = rng.uniform(1.0 - stakes.chase_variance, 1.0 + stakes.chase_variance);
                (ratio * jitter).min(cap)
            }
            BehavioralState::Escalating => {
                ratio.powi(self.consecutive_losses as i32).min(cap)
            }
        }
    }
}

/// Time-varying sport distribution for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct SportSelector {
    early: Vec<f64>,
    late: Vec<f64>,
    exploration: Option<(f64, f64)>,
}

impl SportSelector {
    pub fn for_player(registry: &Registry, cohort: Cohort, profile: &BehaviorProfile) -> Self {
        let sports = &registry.config().sports;
        let early: Vec<f64> = sports.iter().map(|s| s.baseline_share).collect();

        let Some(drift) = &registry.cohort(cohort).drift else {
            return Self { late: early.clone(), early, exploration: None };
        };

        let boost = (drift.niche_boost * profile.drift_multiplier).clamp(0.0, 0.95);
        let moved: f64 = sports
            .iter()
            .filter(|s| s.liquidity_tier >= 1.0)
            .map(|s| s.baseline_share * boost)
            .sum();
        let niche_weight: f64 = sports
            .iter()
            .filter(|s| s.liquidity_tier <= 0.5)
            .map(|s| 1.0 - s.liquidity_tier)
            .sum();

        let late = sports
            .iter()
            .map(|s| {
                if s.liquidity_tier >= 1.0 {
                    s.baseline_share * (1.0 - boost)
                } else if s.liquidity_tier <= 0.5 && niche_weight > 0.0 {
                    s.baseline_share + moved * (1.0 - s.liquidity_tier) / niche_weight
                } else {
                    s.baseline_share
                }
            })
            .collect();

        let exploration = (drift.late_exploration > 0.0)
            .then_some((drift.exploration_after, drift.late_exploration));
        Self { early, late, exploration }
    }

    /// Interpolated weights at `position` ∈ [0, 1] of the window.
    pub fn weights_at(&self, position: f64) -> Vec<f64> {
        let t = position.clamp(0.0, 1.0);
        self.early
            .iter()
            .zip(&self.late)
            .map(|(e, l)| e + (l - e) * t)
            .collect()
    }

    pub fn pick(&self, position: f64, rng: &mut StreamRng) -> Sport {
        if let Some((after, probability)) = self.exploration {
            if position > after && rng.chance(probability) {
                return Sport::ALL[rng.next_u64_below(Sport::ALL.len() as u64) as usize];
            }
        }
        Sport::ALL[rng.weighted_index(&self.weights_at(position))]
    }
}

/// A generated wager before the merge barrier assigns its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Wager {
    pub timestamp:     NaiveDateTime,
    pub sport:         Option<Sport>,
    pub stake:         f64,
    pub odds_american: i32,
    pub outcome:       Outcome,
}

/// A wager together with the FSM state it was placed in.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedWager {
    pub wager: Wager,
    pub state: BehavioralState,
    pub consecutive_losses: u32,
}

/// A finalized bet record as published in the bets artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct BetEvent {
    pub bet_id:        BetId,
    pub player_id:     PlayerId,
    pub timestamp:     NaiveDateTime,
    pub sport:         Option<Sport>,
    pub stake:         f64,
    pub odds_american: i32,
    pub outcome:       Outcome,
    pub market_tier:   Option<f64>,
}

pub struct BetSequenceGenerator;

impl BetSequenceGenerator {
    pub fn generate(registry: &Registry, player: &PlayerRecord, rng: &mut StreamRng) -> Vec<Wager> {
        Self::generate_traced(registry, player, rng)
            .into_iter()
            .map(|t| t.wager)
            .collect()
    }

    /// Same draws as `generate`, keeping the state each bet was placed in.
    pub fn generate_traced(
        registry: &Registry,
        player: &PlayerRecord,
        rng: &mut StreamRng,
    ) -> Vec<TracedWager> {
        let config = registry.config();
        let row = registry.cohort(player.cohort);
        let profile = &player.profile;
        let hours = &config.hours;

        let start = registry.window_start();
        let end = registry.window_end();
        let window_secs = (end - start).num_seconds() as f64;

        let target = (profile.bets_per_week * registry.weeks_in_window()).round().max(1.0) as usize;
        let chasing = stationary_chasing_share(row.win_rate, profile.chase_probability);
        let gap_scale = (1.0 - chasing) + chasing * config.stakes.chase_gap_factor;
        let mean_gap = window_secs / (target as f64 * gap_scale);

        let selector = SportSelector::for_player(registry, player.cohort, profile);
        let mut machine = BettingStateMachine::new();
        let mut out: Vec<TracedWager> = Vec::with_capacity(target);
        let mut cursor = 0.0_f64;
        let mut previous: Option<NaiveDateTime> = None;
        let mut clamps = 0u32;
        let mut floors = 0u32;

        while out.len() < target {
            let factor = if machine.is_chasing() { config.stakes.chase_gap_factor } else { 1.0 };
            cursor += rng.exponential(mean_gap * factor);
            if cursor > window_secs {
                break;
            }

            // ── When ─────────────────────────────────────────
            let day = (cursor / SECONDS_PER_DAY).floor() as i64;
            let late_night = row.bimodal_hours && machine.is_chasing() && {
                let share = (profile.late_night_share
                    * (1.0 + hours.late_night_step * machine.consecutive_losses() as f64))
                    .min(hours.late_night_cap.max(profile.late_night_share));
                rng.chance(share)
            };
            let hour = if late_night {
                hours.late_night.sample(rng)
            } else {
                hours.primetime.sample(rng)
            };
            let minute = rng.int_in(0, 59);
            let second = rng.int_in(0, 59);
            let mut timestamp = start
                + Duration::days(day)
                + Duration::hours(hour as i64)
                + Duration::minutes(minute)
                + Duration::seconds(second);
            if timestamp > end {
                timestamp = end;
            }
            if let Some(prev) = previous {
                if timestamp < prev {
                    clamps += 1;
                    timestamp += Duration::days(1);
                    if timestamp > end || timestamp < prev {
                        timestamp = prev;
                    }
                }
            }

            // ── What ─────────────────────────────────────────
            let position = (timestamp - start).num_seconds() as f64 / window_secs;
            let sport = selector.pick(position, rng);
            let multiplier = machine.stake_multiplier(registry, profile.escalation_ratio, rng);
            let (stake, floored) = round_stake(profile.base_stake * multiplier, config.stakes.min_stake);
            floors += floored as u32;
            let odds_american = american_odds(registry.sport(sport).liquidity_tier, rng);
            let outcome = if rng.chance(row.win_rate) { Outcome::Win } else { Outcome::Loss };

            out.push(TracedWager {
                wager: Wager { timestamp, sport: Some(sport), stake, odds_american, outcome },
                state: machine.state(),
                consecutive_losses: machine.consecutive_losses(),
            });
            machine.on_outcome(outcome, profile.chase_probability, rng);
            previous = Some(timestamp);
        }

        if clamps > 0 || floors > 0 {
            debug!(
                "{}: {} timestamp clamp(s), {} stake floor(s)",
                player.player_id, clamps, floors
            );
        }
        out
    }
}

/// Long-run fraction of bets placed while CHASING or ESCALATING.
///
/// A NORMAL loss enters the chase with probability `chase_probability`
/// and any win leaves it, so the two-state chain settles at
/// `(1 - w)c / ((1 - w)c + w)`.
pub fn stationary_chasing_share(win_rate: f64, chase_probability: f64) -> f64 {
    let enter = (1.0 - win_rate) * chase_probability;
    let denom = enter + win_rate;
    if denom <= 0.0 {
        0.0
    } else {
        enter / denom
    }
}

/// Round to cents, never below `min_stake`. Returns whether the floor applied.
pub fn round_stake(raw: f64, min_stake: f64) -> (f64, bool) {
    let cents = (raw * 100.0).round() / 100.0;
    if cents.is_finite() && cents >= min_stake {
        (cents, false)
    } else {
        (min_stake, true)
    }
}

/// American odds. Major markets mostly sit on standard lines; |odds| >= 100.
pub fn american_odds(liquidity_tier: f64, rng: &mut StreamRng) -> i32 {
    let raw = if liquidity_tier >= 1.0 {
        if rng.chance(STANDARD_LINE_SHARE) {
            STANDARD_LINES[rng.next_u64_below(STANDARD_LINES.len() as u64) as usize] as i64
        } else {
            rng.int_in(-200, 200)
        }
    } else {
        rng.int_in(-300, 300)
    };
    let snapped = match raw {
        r if r.abs() >= 100 => r,
        r if r < 0 => -100,
        _ => 100,
    };
    snapped as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chasing_share_matches_the_two_state_chain() {
        assert_eq!(stationary_chasing_share(0.5, 0.0), 0.0);
        assert_eq!(stationary_chasing_share(0.0, 0.5), 1.0);
        let share = stationary_chasing_share(0.30, 0.97);
        assert!((share - 0.679 / 0.979).abs() < 1e-12);
    }

    #[test]
    fn win_resets_from_any_state() {
        let mut rng = StreamRng::new(1, 1);
        let mut fsm = BettingStateMachine::new();
        fsm.on_outcome(Outcome::Loss, 1.0, &mut rng);
        assert_eq!(fsm.state(), BehavioralState::Chasing);
        fsm.on_outcome(Outcome::Loss, 1.0, &mut rng);
        fsm.on_outcome(Outcome::Loss, 1.0, &mut rng);
        assert_eq!(fsm.state(), BehavioralState::Escalating);
        assert_eq!(fsm.consecutive_losses(), 3);
        fsm.on_outcome(Outcome::Win, 1.0, &mut rng);
        assert_eq!(fsm.state(), BehavioralState::Normal);
        assert_eq!(fsm.consecutive_losses(), 0);
    }

    #[test]
    fn normal_loss_without_chase_stays_normal_but_counts() {
        let mut rng = StreamRng::new(2, 2);
        let mut fsm = BettingStateMachine::new();
        fsm.on_outcome(Outcome::Loss, 0.0, &mut rng);
        fsm.on_outcome(Outcome::Loss, 0.0, &mut rng);
        assert_eq!(fsm.state(), BehavioralState::Normal);
        assert_eq!(fsm.consecutive_losses(), 2);
    }

    #[test]
    fn odds_never_inside_plus_minus_100() {
        let mut rng = StreamRng::new(3, 3);
        for tier in [1.0, 0.7, 0.2] {
            for _ in 0..2_000 {
                assert!(american_odds(tier, &mut rng).abs() >= 100);
            }
        }
    }

    #[test]
    fn stake_rounding_respects_floor() {
        assert_eq!(round_stake(7.126, 0.01), (7.13, false));
        assert_eq!(round_stake(0.001, 0.01), (0.01, true));
        assert_eq!(round_stake(f64::NAN, 0.01), (0.01, true));
    }
}
