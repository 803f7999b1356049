//! Error taxonomy for a single game.
//!
//! Every variant is local to the game in which it happens: the batch runner
//! records the failure and moves on to the next game. Nothing here is
//! retried automatically.

use crate::types::{Move, Position};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while selecting, validating or applying a move.
#[derive(Error, Debug)]
pub enum MatchError {
    /// The engine's response line does not follow the candidate grammar.
    #[error("Malformed candidate line {line:?}: {reason}")]
    MalformedCandidate {
        /// The offending response line.
        line: String,
        /// Which rule of the grammar was violated.
        reason: String,
    },
    /// The engine process could not be started.
    #[error("Failed to spawn engine {}: {source}", path.display())]
    EngineSpawn {
        /// Path of the executable that failed to start.
        path: PathBuf,
        /// The underlying OS error.
        source: std::io::Error,
    },
    /// The engine closed its output, broke the pipe or timed out before
    /// answering with a line.
    #[error("Engine protocol error from {}: {reason}", path.display())]
    EngineProtocol {
        /// Path of the misbehaving engine.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// The engine answered, but no usable candidate remained.
    #[error("No candidate moves")]
    NoCandidate,
    /// The selected move is not legal in the current position.
    #[error("Illegal move {mv} selected in position {position}")]
    IllegalMoveSelected {
        /// The rejected move.
        mv: Move,
        /// The position it was played in.
        position: Position,
    },
    /// The board rules rejected a position.
    #[error("Rules error: {0}")]
    Rules(String),
}

/// A stable, serializable label for the kind of failure that ended a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    MalformedCandidate,
    EngineSpawn,
    EngineProtocol,
    NoCandidate,
    IllegalMoveSelected,
    Rules,
}

impl MatchError {
    /// Returns the failure kind used in batch summaries.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            MatchError::MalformedCandidate { .. } => FailureKind::MalformedCandidate,
            MatchError::EngineSpawn { .. } => FailureKind::EngineSpawn,
            MatchError::EngineProtocol { .. } => FailureKind::EngineProtocol,
            MatchError::NoCandidate => FailureKind::NoCandidate,
            MatchError::IllegalMoveSelected { .. } => FailureKind::IllegalMoveSelected,
            MatchError::Rules(_) => FailureKind::Rules,
        }
    }

    pub(crate) fn protocol(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        MatchError::EngineProtocol {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        MatchError::MalformedCandidate {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::MalformedCandidate => "malformed-candidate",
            FailureKind::EngineSpawn => "engine-spawn",
            FailureKind::EngineProtocol => "engine-protocol",
            FailureKind::NoCandidate => "no-candidate",
            FailureKind::IllegalMoveSelected => "illegal-move-selected",
            FailureKind::Rules => "rules",
        };
        f.write_str(label)
    }
}
