//! PGN (Portable Game Notation) export of finished games.
//!
//! Move text is rendered in SAN by replaying the game through the board
//! rules, so a record whose moves do not replay cannot be exported.

use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::board::BoardRules;
use crate::error::MatchError;
use crate::game_runner::{GameRecord, GameState};
use crate::types::{Position, Side};

/// Maximum line length of the move text.
const LINE_WIDTH: usize = 80;

/// Errors that can occur when exporting a game.
#[derive(Error, Debug)]
pub enum PgnError {
    /// The PGN file could not be written.
    #[error("Failed to write PGN: {0}")]
    Io(#[from] std::io::Error),
    /// The recorded moves could not be replayed.
    #[error("Failed to replay game: {0}")]
    Replay(#[from] MatchError),
}

fn termination(state: &GameState) -> &'static str {
    match state {
        GameState::TerminalNormal { .. } => "normal",
        GameState::TerminalIllegalMove { .. } => "rules infraction",
        GameState::TerminalEngineFailure { .. } => "abandoned",
        GameState::TerminalMoveLimit
        | GameState::TerminalCancelled
        | GameState::InProgress => "unterminated",
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders a game as PGN text.
///
/// The Seven Tag Roster is always present. Games that do not start from
/// the standard position also carry `SetUp` and `FEN` tags, and every game
/// has a `Termination` tag. An illegal move or engine failure is noted in a
/// comment after the last move.
///
/// # Errors
///
/// Returns an error if the record's moves cannot be replayed from its start
/// position.
pub fn render_pgn<R: BoardRules + ?Sized>(record: &GameRecord, rules: &R) -> Result<String, MatchError> {
    let replay = rules.replay(&record.start, &record.move_list())?;
    let result = record.result().pgn_token();

    let mut out = String::new();
    let mut tag = |name: &str, value: &str| {
        out.push_str(&format!("[{} \"{}\"]\n", name, escape(value)));
    };
    tag("Event", "Engine Match");
    tag("Site", "local");
    tag("Date", &record.started_at.format("%Y.%m.%d").to_string());
    tag("Round", "-");
    tag("White", &record.white);
    tag("Black", &record.black);
    tag("Result", result);
    let start = replay.positions.first().unwrap_or(&record.start);
    if start.as_str() != Position::STARTING_FEN {
        tag("SetUp", "1");
        tag("FEN", start.as_str());
    }
    tag("Termination", termination(&record.state));
    tag("PlyCount", &record.moves.len().to_string());
    out.push('\n');

    let mut tokens: Vec<String> = Vec::with_capacity(replay.san.len() * 3 / 2 + 2);
    let mut number = record.start.fullmove_number();
    let mut side = record.start.side_to_move();
    for (i, san) in replay.san.iter().enumerate() {
        match side {
            Side::White => tokens.push(format!("{number}.")),
            Side::Black if i == 0 => tokens.push(format!("{number}...")),
            Side::Black => {}
        }
        tokens.push(san.clone());
        if side == Side::Black {
            number += 1;
        }
        side = side.opposite();
    }

    match &record.state {
        GameState::TerminalIllegalMove { mv, .. } => {
            tokens.push(format!("{{Illegal move {mv}}}"));
        }
        GameState::TerminalEngineFailure { kind, .. } => {
            tokens.push(format!("{{Engine failure: {kind}}}"));
        }
        _ => {}
    }
    tokens.push(result.to_string());

    let mut line = String::new();
    for token in tokens {
        if !line.is_empty() && line.len() + 1 + token.len() > LINE_WIDTH {
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&token);
    }
    out.push_str(&line);
    out.push('\n');

    Ok(out)
}

/// Writes a game to a PGN file.
///
/// # Errors
///
/// Returns [`PgnError::Replay`] if the moves cannot be replayed and
/// [`PgnError::Io`] if the file cannot be written.
pub fn write_pgn<P, R>(path: P, record: &GameRecord, rules: &R) -> Result<(), PgnError>
where
    P: AsRef<Path>,
    R: BoardRules + ?Sized,
{
    let text = render_pgn(record, rules)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}
