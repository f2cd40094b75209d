//! Distribution Registry — every tunable parameter of the generator.
//!
//! `GeneratorConfig` is the raw, serde-loadable shape (`data/registry.json`).
//! `Registry` is the validated, immutable form shared by reference with every
//! player task. Nothing mutates a Registry after construction.

use crate::{
    correlation_engine::{normal_cdf, CorrelationEngine},
    error::{GenError, GenResult},
    rng::StreamRng,
    types::{Cohort, Jurisdiction, LatentDim, Sport, LATENT_DIMS},
    validation::BehaviorMetric,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

const SHARE_EPSILON: f64 = 1e-6;

/// Closed numeric interval `[min, max]`, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span(pub f64, pub f64);

impl Span {
    pub fn min(&self) -> f64 {
        self.0
    }

    pub fn max(&self) -> f64 {
        self.1
    }

    pub fn midpoint(&self) -> f64 {
        (self.0 + self.1) / 2.0
    }

    /// Linear position inside the span; `t` is clamped to [0, 1].
    pub fn lerp(&self, t: f64) -> f64 {
        self.0 + (self.1 - self.0) * t.clamp(0.0, 1.0)
    }

    pub fn sample(&self, rng: &mut StreamRng) -> f64 {
        rng.uniform(self.0, self.1)
    }

    fn is_ordered(&self) -> bool {
        self.0.is_finite() && self.1.is_finite() && self.0 <= self.1
    }

    fn within(&self, lo: f64, hi: f64) -> bool {
        self.is_ordered() && self.0 >= lo && self.1 <= hi
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start: NaiveDate,
    pub days: u32,
    pub assessment_lookback_days: u32,
}

/// Late-window market drift for one cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Share of baseline major-sport mass moved to niche markets by window end.
    pub niche_boost: f64,
    /// Probability of a uniformly random sport once past `exploration_after`.
    pub late_exploration: f64,
    /// Window position after which exploration starts.
    pub exploration_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortConfig {
    pub cohort: Cohort,
    pub population_share: f64,
    pub win_rate: f64,
    pub latent_means: [f64; LATENT_DIMS],
    pub bets_per_week: Span,
    pub base_stake: Span,
    pub escalation_ratio: Span,
    pub chase_probability: Span,
    pub late_night_share: Span,
    #[serde(default)]
    pub drift: Option<DriftConfig>,
    pub bimodal_hours: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionShare {
    pub jurisdiction: Jurisdiction,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportConfig {
    pub sport: Sport,
    pub baseline_share: f64,
    /// 1.0 = major, high-liquidity market; lower = niche.
    pub liquidity_tier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentConfig {
    pub correlation: Vec<Vec<f64>>,
    pub stds: [f64; LATENT_DIMS],
}

/// `score = intercept + Σ weights[d] * latent[d] + N(0, noise_std)`, clamped to [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerTransform {
    pub intercept: f64,
    pub weights: [f64; LATENT_DIMS],
    pub noise_std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    pub sensitivity_to_loss: MarkerTransform,
    pub sensitivity_to_reward: MarkerTransform,
    pub risk_tolerance: MarkerTransform,
    pub decision_consistency: MarkerTransform,
    /// Fraction of generated players with no assessment at all.
    pub missing_rate: f64,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourMode {
    pub mean: f64,
    pub std: f64,
    pub min_hour: u32,
    pub max_hour: u32,
}

impl HourMode {
    /// `floor(N(mean, std))` clamped to `[min_hour, max_hour]`.
    pub fn sample(&self, rng: &mut StreamRng) -> u32 {
        let raw = rng.normal(self.mean, self.std).floor();
        raw.clamp(self.min_hour as f64, self.max_hour as f64) as u32
    }

    /// Exact hour-of-day distribution produced by `sample`.
    pub fn probabilities(&self) -> [f64; 24] {
        let cdf = |h: f64| normal_cdf((h - self.mean) / self.std);
        let mut p = [0.0; 24];
        if self.min_hour == self.max_hour {
            p[self.min_hour as usize] = 1.0;
            return p;
        }
        for h in self.min_hour..=self.max_hour {
            let lower = if h == self.min_hour { 0.0 } else { cdf(h as f64) };
            let upper = if h == self.max_hour { 1.0 } else { cdf(h as f64 + 1.0) };
            p[h as usize] = upper - lower;
        }
        p
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourConfig {
    pub primetime: HourMode,
    pub late_night: HourMode,
    /// Upper bound on the late-night share while escalating.
    pub late_night_cap: f64,
    /// Relative late-night increase per consecutive loss.
    pub late_night_step: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeConfig {
    pub max_escalation_multiplier: f64,
    pub min_stake: f64,
    /// NORMAL stakes vary ±this fraction around the base stake.
    pub normal_variance: f64,
    /// CHASING stakes vary ±this fraction around base × ratio.
    pub chase_variance: f64,
    /// Multiplier on the mean inter-bet gap while chasing or escalating.
    pub chase_gap_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    pub bet_count_tolerance: f64,
    pub cohort_tolerance: f64,
    pub jurisdiction_tolerance: f64,
    pub sport_tolerance: f64,
    pub hour_tolerance: f64,
    pub win_rate_tolerance: f64,
    pub correlation_tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationTarget {
    pub trait_dim: LatentDim,
    pub metric: BehaviorMetric,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub window: WindowConfig,
    pub cohorts: Vec<CohortConfig>,
    pub jurisdictions: Vec<JurisdictionShare>,
    pub sports: Vec<SportConfig>,
    pub latent: LatentConfig,
    pub markers: MarkerConfig,
    pub hours: HourConfig,
    pub stakes: StakeConfig,
    pub age_range: (u32, u32),
    pub validation: ValidationThresholds,
    pub correlation_targets: Vec<CorrelationTarget>,
}

impl GeneratorConfig {
    /// Load a registry from a JSON file with the same shape as `data/registry.json`.
    pub fn load(path: &str) -> GenResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GeneratorConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn check(&self) -> GenResult<()> {
        if self.window.days == 0 {
            return Err(GenError::config("window.days must be > 0"));
        }

        // ── Cohorts ────────────────────────────────────────
        if self.cohorts.len() != Cohort::ALL.len() {
            return Err(GenError::config(format!(
                "expected {} cohorts, got {}",
                Cohort::ALL.len(),
                self.cohorts.len()
            )));
        }
        for (row, expected) in self.cohorts.iter().zip(Cohort::ALL) {
            if row.cohort != expected {
                return Err(GenError::config(format!(
                    "cohort rows must be in canonical order: expected {}, got {}",
                    expected.label(),
                    row.cohort.label()
                )));
            }
            check_cohort(row)?;
        }
        check_shares(
            "cohort population_share",
            self.cohorts.iter().map(|c| c.population_share),
        )?;

        // ── Jurisdictions ──────────────────────────────────
        for j in Jurisdiction::ALL {
            let n = self.jurisdictions.iter().filter(|s| s.jurisdiction == j).count();
            if n != 1 {
                return Err(GenError::config(format!(
                    "jurisdiction {} must appear exactly once (found {n})",
                    j.code()
                )));
            }
        }
        check_shares("jurisdiction share", self.jurisdictions.iter().map(|j| j.share))?;

        // ── Sports ─────────────────────────────────────────
        if self.sports.len() != Sport::ALL.len()
            || self.sports.iter().zip(Sport::ALL).any(|(row, s)| row.sport != s)
        {
            return Err(GenError::config("sport rows must list every sport in canonical order"));
        }
        for row in &self.sports {
            if !(row.liquidity_tier > 0.0 && row.liquidity_tier <= 1.0) {
                return Err(GenError::config(format!(
                    "{} liquidity_tier must be in (0, 1]",
                    row.sport.code()
                )));
            }
        }
        check_shares("sport baseline_share", self.sports.iter().map(|s| s.baseline_share))?;

        // ── Latent traits ──────────────────────────────────
        if self.latent.stds.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(GenError::config("latent stds must be positive"));
        }

        // ── Markers ────────────────────────────────────────
        for (name, m) in [
            ("sensitivity_to_loss", &self.markers.sensitivity_to_loss),
            ("sensitivity_to_reward", &self.markers.sensitivity_to_reward),
            ("risk_tolerance", &self.markers.risk_tolerance),
            ("decision_consistency", &self.markers.decision_consistency),
        ] {
            if !(m.noise_std.is_finite() && m.noise_std >= 0.0) {
                return Err(GenError::config(format!("{name} noise_std must be >= 0")));
            }
        }
        check_probability("markers.missing_rate", self.markers.missing_rate)?;

        // ── Hours ──────────────────────────────────────────
        for (name, mode) in [
            ("primetime", &self.hours.primetime),
            ("late_night", &self.hours.late_night),
        ] {
            if mode.min_hour > mode.max_hour || mode.max_hour > 23 || !(mode.std > 0.0) {
                return Err(GenError::config(format!(
                    "{name} hour mode must satisfy min <= max <= 23 and std > 0"
                )));
            }
        }
        check_probability("hours.late_night_cap", self.hours.late_night_cap)?;
        if self.hours.late_night_step < 0.0 {
            return Err(GenError::config("hours.late_night_step must be >= 0"));
        }

        // ── Stakes ─────────────────────────────────────────
        if !(self.stakes.max_escalation_multiplier > 1.0) {
            return Err(GenError::config(format!(
                "max_escalation_multiplier must be > 1 (got {})",
                self.stakes.max_escalation_multiplier
            )));
        }
        if !(self.stakes.min_stake > 0.0) {
            return Err(GenError::config("min_stake must be > 0"));
        }
        for (name, v) in [
            ("normal_variance", self.stakes.normal_variance),
            ("chase_variance", self.stakes.chase_variance),
        ] {
            if !(0.0..1.0).contains(&v) {
                return Err(GenError::config(format!("{name} must be in [0, 1)")));
            }
        }
        if !(self.stakes.chase_gap_factor > 0.0 && self.stakes.chase_gap_factor <= 1.0) {
            return Err(GenError::config("chase_gap_factor must be in (0, 1]"));
        }

        let (age_lo, age_hi) = self.age_range;
        if age_lo < 21 || age_lo > age_hi {
            return Err(GenError::config("age_range must start at >= 21 and be ordered"));
        }

        let v = &self.validation;
        if [
            v.bet_count_tolerance,
            v.cohort_tolerance,
            v.jurisdiction_tolerance,
            v.sport_tolerance,
            v.hour_tolerance,
            v.win_rate_tolerance,
            v.correlation_tolerance,
        ]
        .iter()
        .any(|t| !(t.is_finite() && *t >= 0.0))
        {
            return Err(GenError::config("validation tolerances must be >= 0"));
        }
        Ok(())
    }
}

fn check_cohort(row: &CohortConfig) -> GenResult<()> {
    let name = row.cohort.label();
    check_probability(&format!("{name} win_rate"), row.win_rate)?;
    check_probability(&format!("{name} population_share"), row.population_share)?;
    if !(row.bets_per_week.is_ordered() && row.bets_per_week.min() > 0.0) {
        return Err(GenError::config(format!("{name} bets_per_week must be positive and ordered")));
    }
    if !(row.base_stake.is_ordered() && row.base_stake.min() > 0.0) {
        return Err(GenError::config(format!("{name} base_stake must be positive and ordered")));
    }
    if !(row.escalation_ratio.is_ordered() && row.escalation_ratio.min() > 0.0) {
        return Err(GenError::config(format!(
            "{name} escalation_ratio must be positive and ordered"
        )));
    }
    if !row.chase_probability.within(0.0, 1.0) {
        return Err(GenError::config(format!("{name} chase_probability must lie in [0, 1]")));
    }
    if !row.late_night_share.within(0.0, 1.0) {
        return Err(GenError::config(format!("{name} late_night_share must lie in [0, 1]")));
    }
    if row.latent_means.iter().any(|m| !m.is_finite()) {
        return Err(GenError::config(format!("{name} latent_means must be finite")));
    }
    if let Some(drift) = &row.drift {
        check_probability(&format!("{name} niche_boost"), drift.niche_boost)?;
        check_probability(&format!("{name} late_exploration"), drift.late_exploration)?;
        check_probability(&format!("{name} exploration_after"), drift.exploration_after)?;
    }
    Ok(())
}

fn check_probability(name: &str, p: f64) -> GenResult<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(GenError::config(format!("{name} must be in [0, 1] (got {p})")))
    }
}

fn check_shares(name: &str, shares: impl Iterator<Item = f64>) -> GenResult<()> {
    let mut total = 0.0;
    for s in shares {
        if !(s.is_finite() && s >= 0.0) {
            return Err(GenError::config(format!("{name} entries must be >= 0")));
        }
        total += s;
    }
    if (total - 1.0).abs() > SHARE_EPSILON {
        return Err(GenError::config(format!("{name} must sum to 1.0 (got {total:.6})")));
    }
    Ok(())
}

/// Validated, read-only registry. Construct once per run.
#[derive(Debug, Clone)]
pub struct Registry {
    config: GeneratorConfig,
    correlation: CorrelationEngine,
}

impl Registry {
    /// Validate the configuration and factor its correlation matrix.
    /// Fails before any generation work begins.
    pub fn new(config: GeneratorConfig) -> GenResult<Self> {
        config.check()?;
        let correlation = CorrelationEngine::new(&config.latent.correlation)?;
        if correlation.dims() != LATENT_DIMS {
            return Err(GenError::config(format!(
                "latent correlation matrix must be {LATENT_DIMS}x{LATENT_DIMS}"
            )));
        }
        Ok(Self { config, correlation })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn correlation(&self) -> &CorrelationEngine {
        &self.correlation
    }

    pub fn cohort(&self, cohort: Cohort) -> &CohortConfig {
        &self.config.cohorts[cohort.index()]
    }

    pub fn sport(&self, sport: Sport) -> &SportConfig {
        &self.config.sports[sport.index()]
    }

    pub fn window_start(&self) -> NaiveDateTime {
        self.config.window.start.and_hms_opt(0, 0, 0).unwrap_or_default()
    }

    /// Last representable second of the window (inclusive).
    pub fn window_end(&self) -> NaiveDateTime {
        self.window_start() + Duration::days(self.config.window.days as i64)
            - Duration::seconds(1)
    }

    pub fn window_days(&self) -> f64 {
        self.config.window.days as f64
    }

    pub fn weeks_in_window(&self) -> f64 {
        self.window_days() / 7.0
    }

    /// Expected per-player bet count: midpoint weekly rate × window weeks.
    pub fn expected_bets_per_player(&self, cohort: Cohort) -> f64 {
        self.cohort(cohort).bets_per_week.midpoint() * self.weeks_in_window()
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let no_drift = None;
        let cohorts = vec![
            CohortConfig {
                cohort: Cohort::LowRisk,
                population_share: 0.90,
                win_rate: 0.47,
                latent_means: [30.0, 35.0, 35.0, 70.0, 1.0, 20.0],
                bets_per_week: Span(2.0, 5.0),
                base_stake: Span(10.0, 50.0),
                escalation_ratio: Span(0.9, 1.1),
                chase_probability: Span(0.15, 0.35),
                late_night_share: Span(0.02, 0.08),
                drift: no_drift,
                bimodal_hours: false,
            },
            CohortConfig {
                cohort: Cohort::MediumRisk,
                population_share: 0.08,
                win_rate: 0.45,
                latent_means: [50.0, 50.0, 55.0, 50.0, 1.55, 40.0],
                bets_per_week: Span(10.0, 20.0),
                base_stake: Span(25.0, 100.0),
                escalation_ratio: Span(1.3, 1.8),
                chase_probability: Span(0.45, 0.65),
                late_night_share: Span(0.15, 0.30),
                drift: Some(DriftConfig {
                    niche_boost: 0.12,
                    late_exploration: 0.0,
                    exploration_after: 0.7,
                }),
                bimodal_hours: true,
            },
            CohortConfig {
                cohort: Cohort::HighRisk,
                population_share: 0.015,
                win_rate: 0.35,
                latent_means: [70.0, 65.0, 75.0, 35.0, 3.25, 65.0],
                bets_per_week: Span(35.0, 60.0),
                base_stake: Span(50.0, 250.0),
                escalation_ratio: Span(2.5, 4.0),
                chase_probability: Span(0.85, 0.95),
                late_night_share: Span(0.45, 0.60),
                drift: Some(DriftConfig {
                    niche_boost: 0.35,
                    late_exploration: 0.20,
                    exploration_after: 0.7,
                }),
                bimodal_hours: true,
            },
            CohortConfig {
                cohort: Cohort::Critical,
                population_share: 0.005,
                win_rate: 0.30,
                latent_means: [85.0, 80.0, 90.0, 20.0, 5.5, 80.0],
                bets_per_week: Span(60.0, 90.0),
                base_stake: Span(100.0, 500.0),
                escalation_ratio: Span(4.0, 7.0),
                chase_probability: Span(0.95, 0.99),
                late_night_share: Span(0.60, 0.75),
                drift: Some(DriftConfig {
                    niche_boost: 0.50,
                    late_exploration: 0.35,
                    exploration_after: 0.7,
                }),
                bimodal_hours: true,
            },
        ];

        let sports = [
            (Sport::Nfl, 0.40, 1.0),
            (Sport::Nba, 0.25, 1.0),
            (Sport::Mlb, 0.15, 1.0),
            (Sport::Nhl, 0.08, 1.0),
            (Sport::Soccer, 0.06, 0.7),
            (Sport::Mma, 0.03, 0.5),
            (Sport::Tennis, 0.02, 0.5),
            (Sport::TableTennis, 0.01, 0.2),
        ]
        .into_iter()
        .map(|(sport, baseline_share, liquidity_tier)| SportConfig {
            sport,
            baseline_share,
            liquidity_tier,
        })
        .collect();

        // Order: loss, reward, risk, consistency, escalation, drift.
        let correlation = vec![
            vec![1.00, 0.35, 0.30, -0.20, 0.72, 0.40],
            vec![0.35, 1.00, 0.60, -0.15, 0.40, 0.35],
            vec![0.30, 0.60, 1.00, -0.15, 0.58, 0.58],
            vec![-0.20, -0.15, -0.15, 1.00, -0.45, -0.30],
            vec![0.72, 0.40, 0.58, -0.45, 1.00, 0.45],
            vec![0.40, 0.35, 0.58, -0.30, 0.45, 1.00],
        ];

        let marker = |weights: [f64; LATENT_DIMS]| MarkerTransform {
            intercept: 0.0,
            weights,
            noise_std: 2.0,
        };

        Self {
            window: WindowConfig {
                start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
                days: 90,
                assessment_lookback_days: 90,
            },
            cohorts,
            jurisdictions: vec![
                JurisdictionShare { jurisdiction: Jurisdiction::Ma, share: 0.40 },
                JurisdictionShare { jurisdiction: Jurisdiction::Nj, share: 0.35 },
                JurisdictionShare { jurisdiction: Jurisdiction::Pa, share: 0.25 },
            ],
            sports,
            latent: LatentConfig {
                correlation,
                stds: [15.0, 12.0, 12.0, 10.0, 0.5, 12.0],
            },
            markers: MarkerConfig {
                sensitivity_to_loss: marker([1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
                sensitivity_to_reward: marker([0.0, 0.7, 0.3, 0.0, 0.0, 0.0]),
                risk_tolerance: marker([0.0, 0.0, 1.0, 0.0, 0.0, 0.0]),
                decision_consistency: marker([0.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
                missing_rate: 0.0,
                version: "v3.2.1".into(),
            },
            hours: HourConfig {
                primetime: HourMode { mean: 20.0, std: 3.0, min_hour: 6, max_hour: 23 },
                late_night: HourMode { mean: 3.5, std: 1.2, min_hour: 2, max_hour: 5 },
                late_night_cap: 0.70,
                late_night_step: 0.5,
            },
            stakes: StakeConfig {
                max_escalation_multiplier: 5.0,
                min_stake: 0.01,
                normal_variance: 0.20,
                chase_variance: 0.10,
                chase_gap_factor: 0.5,
            },
            age_range: (21, 75),
            validation: ValidationThresholds {
                bet_count_tolerance: 0.20,
                cohort_tolerance: 0.01,
                jurisdiction_tolerance: 0.02,
                sport_tolerance: 0.03,
                hour_tolerance: 0.06,
                win_rate_tolerance: 0.05,
                correlation_tolerance: 0.05,
            },
            correlation_targets: vec![
                CorrelationTarget {
                    trait_dim: LatentDim::LossSensitivity,
                    metric: BehaviorMetric::BetEscalationRatio,
                    target: 0.72,
                },
                CorrelationTarget {
                    trait_dim: LatentDim::RiskTolerance,
                    metric: BehaviorMetric::MarketTierDrift,
                    target: 0.58,
                },
                CorrelationTarget {
                    trait_dim: LatentDim::DecisionConsistency,
                    metric: BehaviorMetric::TemporalRisk,
                    target: -0.45,
                },
            ],
        }
    }
}
