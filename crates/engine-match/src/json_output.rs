//! JSON export of batch summaries.
//!
//! One file per batch, holding the tallies plus an entry per game with its
//! moves, their sources and scores, and the final position.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::batch::{BatchSummary, EngineTally};
use crate::error::FailureKind;
use crate::game_runner::{GameState, MoveRecord};

#[derive(Serialize)]
struct GameJson<'a> {
    index: u32,
    id: String,
    white: &'a str,
    black: &'a str,
    /// "1-0", "0-1", "1/2-1/2" or "*".
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a GameState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    moves: &'a [MoveRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    final_fen: Option<&'a str>,
}

#[derive(Serialize)]
struct SummaryJson<'a> {
    games: usize,
    white_wins: u32,
    black_wins: u32,
    draws: u32,
    unknown: u32,
    failed: u32,
    cancelled: u32,
    failures: BTreeMap<String, u32>,
    engines: &'a BTreeMap<String, EngineTally>,
    results: Vec<GameJson<'a>>,
    /// ISO 8601 timestamp when the file was created.
    created_at: String,
}

/// Renders a batch summary as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn summary_json(summary: &BatchSummary) -> serde_json::Result<String> {
    let results = summary
        .reports
        .iter()
        .map(|report| GameJson {
            index: report.index,
            id: report.id.to_string(),
            white: &report.white,
            black: &report.black,
            result: report.result().pgn_token(),
            state: report.record.as_ref().map(|r| &r.state),
            failure: report.failure,
            error: report.error.as_deref(),
            moves: report
                .record
                .as_ref()
                .map(|r| r.moves.as_slice())
                .unwrap_or_default(),
            final_fen: report.record.as_ref().map(|r| r.final_position.as_str()),
        })
        .collect();

    let json = SummaryJson {
        games: summary.games(),
        white_wins: summary.white_wins,
        black_wins: summary.black_wins,
        draws: summary.draws,
        unknown: summary.unknown,
        failed: summary.failed,
        cancelled: summary.cancelled,
        failures: summary.failures_by_kind(),
        engines: &summary.engines,
        results,
        created_at: Utc::now().to_rfc3339(),
    };
    serde_json::to_string_pretty(&json)
}

/// Writes a batch summary to a JSON file.
///
/// # Errors
///
/// Returns an `std::io::Error` if the file cannot be created or written.
pub fn write_summary<P: AsRef<Path>>(path: P, summary: &BatchSummary) -> std::io::Result<()> {
    let text = summary_json(summary)?;
    std::fs::write(path, text)
}
