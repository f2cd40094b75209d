//! Shared primitive types used across the generator.

use serde::{Deserialize, Serialize};

/// Player identifier, `PLR_{seq:04}_{STATE}`.
pub type PlayerId = String;

/// Bet identifier, `BET_{seq:08}`.
pub type BetId = String;

/// Zero-based position of a player in the population.
pub type PlayerIndex = usize;

pub fn player_id(index: PlayerIndex, state: &str) -> PlayerId {
    format!("PLR_{:04}_{state}", index + 1)
}

pub fn bet_id(seq: usize) -> BetId {
    format!("BET_{:08}", seq + 1)
}

pub fn assessment_id(player_id: &str) -> String {
    format!("ASSESS_{player_id}")
}

/// Discrete risk-propensity category assigned at player creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    LowRisk,
    MediumRisk,
    HighRisk,
    Critical,
}

impl Cohort {
    /// Canonical order; the registry stores cohort rows in this order.
    pub const ALL: [Cohort; 4] = [
        Cohort::LowRisk,
        Cohort::MediumRisk,
        Cohort::HighRisk,
        Cohort::Critical,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LowRisk => "low_risk",
            Self::MediumRisk => "medium_risk",
            Self::HighRisk => "high_risk",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Jurisdiction {
    Ma,
    Nj,
    Pa,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 3] = [Jurisdiction::Ma, Jurisdiction::Nj, Jurisdiction::Pa];

    pub fn code(self) -> &'static str {
        match self {
            Self::Ma => "MA",
            Self::Nj => "NJ",
            Self::Pa => "PA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sport {
    Nfl,
    Nba,
    Mlb,
    Nhl,
    Soccer,
    Mma,
    Tennis,
    TableTennis,
}

impl Sport {
    pub const ALL: [Sport; 8] = [
        Sport::Nfl,
        Sport::Nba,
        Sport::Mlb,
        Sport::Nhl,
        Sport::Soccer,
        Sport::Mma,
        Sport::Tennis,
        Sport::TableTennis,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Nfl => "NFL",
            Self::Nba => "NBA",
            Self::Mlb => "MLB",
            Self::Nhl => "NHL",
            Self::Soccer => "SOCCER",
            Self::Mma => "MMA",
            Self::Tennis => "TENNIS",
            Self::TableTennis => "TABLE_TENNIS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
        }
    }
}

/// Dimensions of the latent trait vector, in matrix order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatentDim {
    LossSensitivity = 0,
    RewardSensitivity = 1,
    RiskTolerance = 2,
    DecisionConsistency = 3,
    EscalationPropensity = 4,
    DriftPropensity = 5,
}

pub const LATENT_DIMS: usize = 6;

impl LatentDim {
    pub const ALL: [LatentDim; LATENT_DIMS] = [
        LatentDim::LossSensitivity,
        LatentDim::RewardSensitivity,
        LatentDim::RiskTolerance,
        LatentDim::DecisionConsistency,
        LatentDim::EscalationPropensity,
        LatentDim::DriftPropensity,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LossSensitivity => "loss_sensitivity",
            Self::RewardSensitivity => "reward_sensitivity",
            Self::RiskTolerance => "risk_tolerance",
            Self::DecisionConsistency => "decision_consistency",
            Self::EscalationPropensity => "escalation_propensity",
            Self::DriftPropensity => "drift_propensity",
        }
    }
}
