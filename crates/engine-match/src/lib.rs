//! Engine Match - plays chess games between opening books and external
//! engines.
//!
//! Engines are separate executables that read one position per line and
//! answer with one line of scored candidate moves. This crate spawns them,
//! decodes their answers, picks a move, validates it against the rules and
//! drives the game to its end, one game or a whole batch at a time.
//!
//! # Modules
//!
//! - [`types`] - Position, move and side value types
//! - [`candidates`] - Decoder for engine response lines
//! - [`engine_session`] - Engine subprocess lifecycle and exchange
//! - [`policy`] - Book lookup, engine selection and move choice
//! - [`board`] - Chess rules behind the [`board::BoardRules`] trait
//! - [`game_runner`] - Single-game state machine
//! - [`batch`] - Batches of games and their tallies
//! - [`config`] - TOML configuration
//! - [`pgn`] - PGN file generation
//! - [`json_output`] - JSON batch summaries
//! - [`error`] - Error taxonomy

pub mod batch;
pub mod board;
pub mod candidates;
pub mod config;
pub mod engine_session;
pub mod error;
pub mod game_runner;
pub mod json_output;
pub mod pgn;
pub mod policy;
pub mod types;

pub use error::{FailureKind, MatchError};
