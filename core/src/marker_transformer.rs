//! Neuro-Marker Transformer.
//!
//! Each of the four scores is an affine combination of latent dimensions plus
//! independent Gaussian noise, clamped to [0, 100] and rounded to 2 decimals.
//!
//! POLARITY: decision_consistency follows the consistency trait, so a LOW
//! score means HIGH risk. The other three scores rise with risk.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    config::{MarkerTransform, Registry},
    player_generator::{LatentTraits, PlayerRecord},
    rng::StreamRng,
    types::{assessment_id, PlayerId},
};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuroAssessment {
    pub assessment_id:         String,
    pub player_id:             PlayerId,
    pub assessment_date:       NaiveDate,
    pub sensitivity_to_loss:   f64,
    pub sensitivity_to_reward: f64,
    pub risk_tolerance:        f64,
    pub decision_consistency:  f64,
    pub version:               String,
}

impl NeuroAssessment {
    pub fn scores(&self) -> [f64; 4] {
        [
            self.sensitivity_to_loss,
            self.sensitivity_to_reward,
            self.risk_tolerance,
            self.decision_consistency,
        ]
    }
}

pub struct MarkerTransformer;

impl MarkerTransformer {
    /// Assess one player. `None` is an explicit missing assessment.
    pub fn assess(
        registry: &Registry,
        player: &PlayerRecord,
        rng: &mut StreamRng,
    ) -> Option<NeuroAssessment> {
        let config = registry.config();
        if rng.chance(config.markers.missing_rate) {
            return None;
        }
        let lookback = config.window.assessment_lookback_days as i64;
        let days_back = rng.int_in(0, lookback);
        let date = config.window.start - Duration::days(days_back);

        let m = &config.markers;
        let mut score = |t: &MarkerTransform| {
            let noise = if t.noise_std > 0.0 { rng.normal(0.0, t.noise_std) } else { 0.0 };
            finish(affine(t, &player.latent) + noise)
        };
        Some(NeuroAssessment {
            assessment_id:         assessment_id(&player.player_id),
            player_id:             player.player_id.clone(),
            assessment_date:       date,
            sensitivity_to_loss:   score(&m.sensitivity_to_loss),
            sensitivity_to_reward: score(&m.sensitivity_to_reward),
            risk_tolerance:        score(&m.risk_tolerance),
            decision_consistency:  score(&m.decision_consistency),
            version:               m.version.clone(),
        })
    }

    /// Noise-free assessment at a fixed date.
    pub fn assess_exact(registry: &Registry, player: &PlayerRecord, date: NaiveDate) -> NeuroAssessment {
        let m = &registry.config().markers;
        let score = |t: &MarkerTransform| finish(affine(t, &player.latent));
        NeuroAssessment {
            assessment_id:         assessment_id(&player.player_id),
            player_id:             player.player_id.clone(),
            assessment_date:       date,
            sensitivity_to_loss:   score(&m.sensitivity_to_loss),
            sensitivity_to_reward: score(&m.sensitivity_to_reward),
            risk_tolerance:        score(&m.risk_tolerance),
            decision_consistency:  score(&m.decision_consistency),
            version:               m.version.clone(),
        }
    }
}

fn affine(t: &MarkerTransform, latent: &LatentTraits) -> f64 {
    t.intercept + t.weights.iter().zip(latent.values).map(|(w, x)| w * x).sum::<f64>()
}

fn finish(raw: f64) -> f64 {
    let clamped = raw.clamp(SCORE_MIN, SCORE_MAX);
    (clamped * 100.0).round() / 100.0
}
