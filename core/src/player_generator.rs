//! Player Generator.
//!
//! One player per index: cohort by weighted draw, correlated latent traits
//! centred on the cohort's means, then jurisdiction and demographics.
//! Identifiers come from the index, never from a random draw.

use crate::{
    config::Registry,
    correlation_engine::normal_cdf,
    name_generator::NameGenerator,
    rng::StreamRng,
    types::{player_id, Cohort, Jurisdiction, LatentDim, PlayerId, PlayerIndex, LATENT_DIMS},
};

/// The player's unobserved trait vector, on each dimension's raw scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatentTraits {
    pub values: [f64; LATENT_DIMS],
}

impl LatentTraits {
    pub fn get(&self, dim: LatentDim) -> f64 {
        self.values[dim.index()]
    }

    /// Within-cohort percentile of one dimension, in (0, 1).
    pub fn percentile(&self, registry: &Registry, cohort: Cohort, dim: LatentDim) -> f64 {
        let mean = registry.cohort(cohort).latent_means[dim.index()];
        let std = registry.config().latent.stds[dim.index()];
        normal_cdf((self.get(dim) - mean) / std)
    }
}

/// Per-player behavioural parameters, derived once from cohort and traits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorProfile {
    pub bets_per_week:     f64,
    pub base_stake:        f64,
    pub escalation_ratio:  f64,
    pub chase_probability: f64,
    pub late_night_share:  f64,
    /// Scales the cohort's niche drift; 0.5 at the bottom of the cohort, 1.5 at the top.
    pub drift_multiplier:  f64,
}

impl BehaviorProfile {
    pub fn derive(
        registry: &Registry,
        cohort: Cohort,
        latent: &LatentTraits,
        rng: &mut StreamRng,
    ) -> Self {
        let row = registry.cohort(cohort);
        let pct = |dim| latent.percentile(registry, cohort, dim);
        Self {
            bets_per_week:     row.bets_per_week.lerp(pct(LatentDim::RewardSensitivity)),
            base_stake:        row.base_stake.sample(rng),
            escalation_ratio:  row.escalation_ratio.lerp(pct(LatentDim::EscalationPropensity)),
            chase_probability: row.chase_probability.lerp(pct(LatentDim::LossSensitivity)),
            late_night_share:  row.late_night_share.lerp(1.0 - pct(LatentDim::DecisionConsistency)),
            drift_multiplier:  0.5 + pct(LatentDim::DriftPropensity),
        }
    }

    /// Profile pinned to the cohort midpoints. Used for deterministic overrides.
    pub fn cohort_midpoint(registry: &Registry, cohort: Cohort) -> Self {
        let row = registry.cohort(cohort);
        Self {
            bets_per_week:     row.bets_per_week.midpoint(),
            base_stake:        row.base_stake.midpoint(),
            escalation_ratio:  row.escalation_ratio.midpoint(),
            chase_probability: row.chase_probability.midpoint(),
            late_night_share:  row.late_night_share.midpoint(),
            drift_multiplier:  1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub player_id:     PlayerId,
    pub index:         PlayerIndex,
    pub cohort:        Cohort,
    pub jurisdiction:  Jurisdiction,
    pub first_name:    String,
    pub last_name:     String,
    pub email:         String,
    pub age:           u32,
    pub latent:        LatentTraits,
    pub profile:       BehaviorProfile,
    pub self_excluded: bool,
    /// Label of the deterministic override applied to this player, if any.
    pub edge_case:     Option<&'static str>,
}

pub struct PlayerGenerator;

impl PlayerGenerator {
    /// Build player `index` from its own stream. Pure in (registry, index, stream).
    pub fn generate(registry: &Registry, index: PlayerIndex, rng: &mut StreamRng) -> PlayerRecord {
        let config = registry.config();

        let shares: Vec<f64> = config.cohorts.iter().map(|c| c.population_share).collect();
        let cohort = Cohort::ALL[rng.weighted_index(&shares)];

        let latent = Self::draw_latent(registry, cohort, rng);

        let shares: Vec<f64> = config.jurisdictions.iter().map(|j| j.share).collect();
        let jurisdiction = config.jurisdictions[rng.weighted_index(&shares)].jurisdiction;

        let first_name = NameGenerator::first_name(rng);
        let last_name = NameGenerator::last_name(rng);
        let email = NameGenerator::email(rng, first_name, last_name, index + 1);
        let (age_lo, age_hi) = config.age_range;
        let age = rng.int_in(age_lo as i64, age_hi as i64) as u32;

        let profile = BehaviorProfile::derive(registry, cohort, &latent, rng);

        PlayerRecord {
            player_id: player_id(index, jurisdiction.code()),
            index,
            cohort,
            jurisdiction,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email,
            age,
            latent,
            profile,
            self_excluded: false,
            edge_case: None,
        }
    }

    /// Cohort mean shifted by one correlated standard-normal draw per dimension.
    pub fn draw_latent(registry: &Registry, cohort: Cohort, rng: &mut StreamRng) -> LatentTraits {
        let means = registry.cohort(cohort).latent_means;
        let stds = registry.config().latent.stds;
        let z = registry.correlation().draw(rng);
        let mut values = [0.0; LATENT_DIMS];
        for d in 0..LATENT_DIMS {
            values[d] = means[d] + stds[d] * z[d];
        }
        LatentTraits { values }
    }
}
