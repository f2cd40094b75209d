//! Bet Sequence Generator: state machine, ordering, stakes and drift.

use sentinel_core::{
    bet_sequence::{BehavioralState, BetSequenceGenerator, SportSelector, TracedWager, Wager},
    config::{GeneratorConfig, Registry},
    player_generator::{BehaviorProfile, PlayerGenerator, PlayerRecord},
    rng::{RngBank, StreamSlot},
    types::{Cohort, Jurisdiction, Outcome, Sport},
};

fn registry() -> Registry {
    Registry::new(GeneratorConfig::default()).expect("default registry")
}

/// A generated player pinned to `cohort`.
fn player_in(registry: &Registry, cohort: Cohort, index: usize) -> PlayerRecord {
    let bank = RngBank::new(2026);
    let mut rng = bank.for_player(StreamSlot::Player, index);
    let latent = PlayerGenerator::draw_latent(registry, cohort, &mut rng);
    let profile = BehaviorProfile::derive(registry, cohort, &latent, &mut rng);
    PlayerRecord {
        player_id: format!("PLR_{:04}_MA", index + 1),
        index,
        cohort,
        jurisdiction: Jurisdiction::Ma,
        first_name: "Test".into(),
        last_name: "Player".into(),
        email: format!("test{index}@example.com"),
        age: 30,
        latent,
        profile,
        self_excluded: false,
        edge_case: None,
    }
}

fn traced(registry: &Registry, player: &PlayerRecord) -> Vec<TracedWager> {
    let mut rng = RngBank::new(2026).for_player(StreamSlot::Bets, player.index);
    BetSequenceGenerator::generate_traced(registry, player, &mut rng)
}

fn wagers(registry: &Registry, player: &PlayerRecord) -> Vec<Wager> {
    let mut rng = RngBank::new(2026).for_player(StreamSlot::Bets, player.index);
    BetSequenceGenerator::generate(registry, player, &mut rng)
}

#[test]
fn timestamps_never_decrease_and_stakes_stay_positive() {
    let registry = registry();
    let (start, end) = (registry.window_start(), registry.window_end());
    for cohort in Cohort::ALL {
        for i in 0..25 {
            let player = player_in(&registry, cohort, i);
            let bets = wagers(&registry, &player);
            assert!(!bets.is_empty(), "{} player {i} produced no bets", cohort.label());
            for w in bets.windows(2) {
                assert!(w[1].timestamp >= w[0].timestamp, "timestamps decreased for {}", player.player_id);
            }
            for b in &bets {
                assert!(b.stake > 0.0, "non-positive stake {}", b.stake);
                assert!(b.timestamp >= start && b.timestamp <= end);
                assert!(b.odds_american.abs() >= 100);
            }
        }
    }
}

#[test]
fn traced_and_plain_generation_agree() {
    let registry = registry();
    let player = player_in(&registry, Cohort::HighRisk, 3);
    let plain = wagers(&registry, &player);
    let from_trace: Vec<Wager> = traced(&registry, &player).into_iter().map(|t| t.wager).collect();
    assert_eq!(plain, from_trace);
}

#[test]
fn chasing_player_who_wins_is_normal_on_the_next_bet() {
    let registry = registry();
    let mut chasing_wins = 0;
    for i in 0..10 {
        let player = player_in(&registry, Cohort::Critical, i);
        let trace = traced(&registry, &player);
        assert_eq!(trace[0].state, BehavioralState::Normal, "initial state must be NORMAL");
        for pair in trace.windows(2) {
            if pair[0].wager.outcome == Outcome::Win {
                if pair[0].state != BehavioralState::Normal {
                    chasing_wins += 1;
                }
                assert_eq!(pair[1].state, BehavioralState::Normal);
                assert_eq!(pair[1].consecutive_losses, 0);
            }
        }
    }
    assert!(chasing_wins > 0, "no chasing player ever won; test saw nothing");
}

#[test]
fn losses_while_chasing_escalate() {
    let registry = registry();
    for i in 0..10 {
        let player = player_in(&registry, Cohort::HighRisk, i);
        for pair in traced(&registry, &player).windows(2) {
            if pair[0].wager.outcome == Outcome::Loss {
                assert_eq!(pair[1].consecutive_losses, pair[0].consecutive_losses + 1);
                match pair[0].state {
                    BehavioralState::Chasing | BehavioralState::Escalating => {
                        assert_eq!(pair[1].state, BehavioralState::Escalating)
                    }
                    BehavioralState::Normal => assert_ne!(pair[1].state, BehavioralState::Escalating),
                }
            }
        }
    }
}

#[test]
fn stakes_follow_state_and_respect_the_cap() {
    let registry = registry();
    let stakes = &registry.config().stakes;
    let cap = stakes.max_escalation_multiplier;
    for cohort in [Cohort::MediumRisk, Cohort::Critical] {
        for i in 0..8 {
            let player = player_in(&registry, cohort, i);
            let base = player.profile.base_stake;
            for t in traced(&registry, &player) {
                let stake = t.wager.stake;
                assert!(stake <= base * cap + 0.01, "{stake} exceeds cap over base {base}");
                if t.state == BehavioralState::Normal {
                    let lo = base * (1.0 - stakes.normal_variance) - 0.01;
                    let hi = base * (1.0 + stakes.normal_variance) + 0.01;
                    assert!((lo..=hi).contains(&stake), "NORMAL stake {stake} outside ±20% of {base}");
                }
            }
        }
    }
}

#[test]
fn bet_count_never_exceeds_target() {
    let registry = registry();
    for cohort in Cohort::ALL {
        let player = player_in(&registry, cohort, 17);
        let target = (player.profile.bets_per_week * registry.weeks_in_window()).round() as usize;
        assert!(wagers(&registry, &player).len() <= target.max(1));
    }
}

#[test]
fn low_risk_players_only_bet_in_primetime_hours() {
    use chrono::Timelike;
    let registry = registry();
    let min_hour = registry.config().hours.primetime.min_hour;
    for i in 0..40 {
        let player = player_in(&registry, Cohort::LowRisk, i);
        for b in wagers(&registry, &player) {
            assert!(b.timestamp.hour() >= min_hour);
        }
    }
}

fn niche_share(bets: &[&Wager], registry: &Registry) -> f64 {
    let niche = bets
        .iter()
        .filter(|b| b.sport.map_or(false, |s| registry.sport(s).liquidity_tier <= 0.5))
        .count();
    niche as f64 / bets.len().max(1) as f64
}

fn early_and_late(registry: &Registry, cohort: Cohort, players: usize) -> (f64, f64) {
    let start = registry.window_start();
    let total = (registry.window_end() - start).num_seconds() as f64;
    let mut all = Vec::new();
    for i in 0..players {
        all.extend(wagers(registry, &player_in(registry, cohort, i)));
    }
    let position = |w: &Wager| (w.timestamp - start).num_seconds() as f64 / total;
    let early: Vec<&Wager> = all.iter().filter(|w| position(w) < 0.2).collect();
    let late: Vec<&Wager> = all.iter().filter(|w| position(w) > 0.8).collect();
    (niche_share(&early, registry), niche_share(&late, registry))
}

#[test]
fn high_risk_sport_mix_drifts_toward_niche_markets() {
    let registry = registry();
    let (early, late) = early_and_late(&registry, Cohort::HighRisk, 30);
    assert!(late > early + 0.10, "high-risk niche share early {early:.3}, late {late:.3}");
}

#[test]
fn every_cohort_keeps_betting_to_the_end_of_the_window() {
    let registry = registry();
    let start = registry.window_start();
    let total = (registry.window_end() - start).num_seconds() as f64;
    let position = |w: &Wager| (w.timestamp - start).num_seconds() as f64 / total;

    for cohort in Cohort::ALL {
        let players = 40;
        let mut last_positions = Vec::with_capacity(players);
        let (mut late, mut count) = (0usize, 0usize);
        for i in 0..players {
            let bets = wagers(&registry, &player_in(&registry, cohort, i));
            late += bets.iter().filter(|w| position(w) > 0.9).count();
            count += bets.len();
            last_positions.push(bets.last().map(position).unwrap_or(0.0));
        }
        let mean_last = last_positions.iter().sum::<f64>() / players as f64;
        let reaching = last_positions.iter().filter(|p| **p > 0.9).count();
        let late_share = late as f64 / count as f64;
        assert!(mean_last > 0.85, "{} mean last bet position {mean_last:.3}", cohort.label());
        assert!(reaching * 2 >= players, "{}: {reaching}/{players} players bet after 90%", cohort.label());
        assert!(late_share > 0.03, "{} share of bets after 90% {late_share:.3}", cohort.label());
    }
}

#[test]
fn low_risk_sport_mix_does_not_drift() {
    let registry = registry();
    let (early, late) = early_and_late(&registry, Cohort::LowRisk, 300);
    assert!((late - early).abs() < 0.03, "low-risk niche share early {early:.3}, late {late:.3}");
}

#[test]
fn selector_weights_shift_only_for_drifting_cohorts() {
    let registry = registry();
    let low = player_in(&registry, Cohort::LowRisk, 0);
    let crit = player_in(&registry, Cohort::Critical, 0);

    let fixed = SportSelector::for_player(&registry, low.cohort, &low.profile);
    assert_eq!(fixed.weights_at(0.0), fixed.weights_at(1.0));

    let drifting = SportSelector::for_player(&registry, crit.cohort, &crit.profile);
    let (start, end) = (drifting.weights_at(0.0), drifting.weights_at(1.0));
    let tt = Sport::TableTennis.index();
    let nfl = Sport::Nfl.index();
    assert!(end[tt] > start[tt]);
    assert!(end[nfl] < start[nfl]);
    assert!((end.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}
