//! Behavioural synthetic-data generator for sports bettors.
//!
//! Pipeline: Registry → players → neuro-markers → bet sequences →
//! edge cases → merge → validation. See `engine` for the fixed order.

pub mod bet_sequence;
pub mod config;
pub mod correlation_engine;
pub mod edge_cases;
pub mod engine;
pub mod error;
pub mod export;
pub mod marker_transformer;
pub mod name_generator;
pub mod player_generator;
pub mod rng;
pub mod store;
pub mod types;
pub mod validation;
