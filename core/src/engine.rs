//! The generation pipeline.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Registry validation        (fail fast, before any player work)
//!   2. Per-player fan-out         (rayon; player → markers → bets)
//!   3. Edge-case injection        (deterministic overrides)
//!   4. Merge barrier              (bet IDs assigned, artifacts assembled)
//!   5. Validation suite           (optional)
//!
//! RULES:
//!   - Each player task owns its streams; no task reads another's output.
//!   - Results are collected in index order, so thread count never
//!     changes the output.
//!   - The Registry is shared by reference and never mutated.

use log::info;
use rayon::prelude::*;

use crate::{
    bet_sequence::{BetEvent, BetSequenceGenerator, Wager},
    config::{GeneratorConfig, Registry},
    edge_cases::{EdgeCaseInjector, EdgeCaseTable},
    error::{GenError, GenResult},
    marker_transformer::{MarkerTransformer, NeuroAssessment},
    player_generator::{PlayerGenerator, PlayerRecord},
    rng::{RngBank, StreamSlot},
    types::{bet_id, PlayerIndex},
    validation::{ValidationReport, ValidationSuite},
};

/// External parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub seed:              u64,
    pub population:        usize,
    pub validate:          bool,
    pub inject_edge_cases: bool,
    /// Worker threads; `None` uses rayon's global pool.
    pub threads:           Option<usize>,
}

impl RunRequest {
    pub fn new(seed: u64, population: usize) -> Self {
        Self {
            seed,
            population,
            validate: true,
            inject_edge_cases: true,
            threads: None,
        }
    }
}

/// Everything generated for one player before the merge barrier.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOutput {
    pub player:     PlayerRecord,
    pub assessment: Option<NeuroAssessment>,
    pub wagers:     Vec<Wager>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Population {
    pub players: Vec<PlayerOutput>,
}

impl Population {
    /// Fan out over player indices on the current rayon pool.
    pub fn generate(registry: &Registry, bank: RngBank, size: usize) -> Self {
        let players = (0..size)
            .into_par_iter()
            .map(|index| generate_player(registry, bank, index))
            .collect();
        Self { players }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// One player's full output. Depends only on (registry, seed, index).
pub fn generate_player(registry: &Registry, bank: RngBank, index: PlayerIndex) -> PlayerOutput {
    let mut rng = bank.for_player(StreamSlot::Player, index);
    let player = PlayerGenerator::generate(registry, index, &mut rng);

    let mut rng = bank.for_player(StreamSlot::Markers, index);
    let assessment = MarkerTransformer::assess(registry, &player, &mut rng);

    let mut rng = bank.for_player(StreamSlot::Bets, index);
    let wagers = BetSequenceGenerator::generate(registry, &player, &mut rng);

    PlayerOutput { player, assessment, wagers }
}

/// The three published artifacts, post merge barrier.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub seed:        u64,
    pub players:     Vec<PlayerRecord>,
    pub assessments: Vec<NeuroAssessment>,
    /// Ordered by player index, then timestamp.
    pub bets:        Vec<BetEvent>,
}

impl Dataset {
    /// Assign bet identifiers and flatten the population.
    pub fn assemble(registry: &Registry, seed: u64, population: Population) -> Self {
        let mut players = Vec::with_capacity(population.len());
        let mut assessments = Vec::with_capacity(population.len());
        let mut bets = Vec::new();

        for output in population.players {
            let PlayerOutput { player, assessment, mut wagers } = output;
            wagers.sort_by_key(|w| w.timestamp);
            for wager in wagers {
                let seq = bets.len();
                bets.push(BetEvent {
                    bet_id:        bet_id(seq),
                    player_id:     player.player_id.clone(),
                    timestamp:     wager.timestamp,
                    sport:         wager.sport,
                    stake:         wager.stake,
                    odds_american: wager.odds_american,
                    outcome:       wager.outcome,
                    market_tier:   wager.sport.map(|s| registry.sport(s).liquidity_tier),
                });
            }
            if let Some(a) = assessment {
                assessments.push(a);
            }
            players.push(player);
        }

        Self { seed, players, assessments, bets }
    }

    /// Bets of one player, in timestamp order.
    pub fn bets_for<'a>(&'a self, player_id: &str) -> impl Iterator<Item = &'a BetEvent> + 'a {
        let player_id = player_id.to_owned();
        self.bets.iter().filter(move |b| b.player_id == player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn assessment(&self, player_id: &str) -> Option<&NeuroAssessment> {
        self.assessments.iter().find(|a| a.player_id == player_id)
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: Dataset,
    pub report:  Option<ValidationReport>,
}

pub struct Generator {
    registry: Registry,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> GenResult<Self> {
        Ok(Self { registry: Registry::new(config)? })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Stages 2–3: generated population with edge cases applied.
    pub fn population(&self, request: &RunRequest) -> GenResult<Population> {
        if request.population == 0 {
            return Err(GenError::config("population must be at least 1"));
        }
        let bank = RngBank::new(request.seed);
        let size = request.population;

        let mut population = match request.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| GenError::config(format!("worker pool: {e}")))?;
                pool.install(|| Population::generate(&self.registry, bank, size))
            }
            None => Population::generate(&self.registry, bank, size),
        };
        info!(
            "Generated {} player(s) with seed {}",
            population.len(),
            request.seed
        );

        if request.inject_edge_cases {
            let skipped = EdgeCaseTable::unreachable_labels(size);
            if !skipped.is_empty() {
                info!(
                    "Skipped {} edge case(s) beyond population {}: {}",
                    skipped.len(),
                    size,
                    skipped.join(", ")
                );
            }
            let table = EdgeCaseTable::for_population(size);
            let injector = EdgeCaseInjector::new(&self.registry, table, size)?;
            injector.apply(&mut population);
        }
        Ok(population)
    }

    pub fn run(&self, request: &RunRequest) -> GenResult<RunOutput> {
        let population = self.population(request)?;
        let dataset = Dataset::assemble(&self.registry, request.seed, population);
        info!(
            "Assembled {} players, {} bets, {} assessments",
            dataset.players.len(),
            dataset.bets.len(),
            dataset.assessments.len()
        );

        let report = request
            .validate
            .then(|| ValidationSuite::new(&self.registry).run(&dataset, request.population));
        Ok(RunOutput { dataset, report })
    }
}
