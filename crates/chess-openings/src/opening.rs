//! Core opening types.

use serde::{Deserialize, Serialize};

/// A named opening line, as found in an opening book file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    /// The ECO code for this opening (e.g., "B20", "C44").
    pub eco: String,
    /// The name of the opening.
    pub name: String,
    /// The sequence of moves in UCI notation, starting from the initial position.
    pub moves: Vec<String>,
    /// Relative popularity of the line. Every position along the line
    /// receives this weight for its book move.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// A single candidate move stored in the book for some position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMove {
    /// The move in UCI notation (e.g., "e2e4").
    pub uci: String,
    /// Accumulated weight of all lines that play this move here.
    pub weight: u32,
    /// Zero-based ply at which the move is played in its shortest line.
    pub ply: u32,
}

impl Opening {
    /// Creates a new opening with weight 1.
    #[must_use]
    pub fn new(eco: impl Into<String>, name: impl Into<String>, moves: &[&str]) -> Self {
        Self {
            eco: eco.into(),
            name: name.into(),
            moves: moves.iter().map(|m| (*m).to_string()).collect(),
            weight: default_weight(),
        }
    }

    /// Sets the weight of this line.
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }
}

impl BookMove {
    /// Creates a new book move.
    #[must_use]
    pub fn new(uci: impl Into<String>, weight: u32, ply: u32) -> Self {
        Self {
            uci: uci.into(),
            weight,
            ply,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_new() {
        let opening = Opening::new("C44", "King's Pawn Game", &["e2e4", "e7e5"]);
        assert_eq!(opening.eco, "C44");
        assert_eq!(opening.name, "King's Pawn Game");
        assert_eq!(opening.moves, vec!["e2e4", "e7e5"]);
        assert_eq!(opening.weight, 1);
    }

    #[test]
    fn test_opening_weight_defaults_when_missing_from_json() {
        let json = r#"{"eco":"A00","name":"Test","moves":["g1f3"]}"#;
        let opening: Opening = serde_json::from_str(json).unwrap();
        assert_eq!(opening.weight, 1);

        let weighted = opening.with_weight(30);
        assert_eq!(weighted.weight, 30);
    }

    #[test]
    fn test_book_move_new() {
        let mv = BookMove::new("e2e4", 100, 0);
        assert_eq!(mv.uci, "e2e4");
        assert_eq!(mv.weight, 100);
        assert_eq!(mv.ply, 0);
    }
}
