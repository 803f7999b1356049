//! Built-in opening book data.
//!
//! This module provides the opening lines compiled into the library and
//! the book built from them.

use crate::book::OpeningBook;
use crate::opening::Opening;

/// Returns the built-in opening lines, weighted roughly by how often they
/// are played at master level.
#[must_use]
pub fn builtin_openings() -> Vec<Opening> {
    vec![
        // Open games
        Opening::new(
            "C60",
            "Ruy Lopez",
            &["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6", "b5a4", "g8f6"],
        )
        .with_weight(50),
        Opening::new(
            "C50",
            "Italian Game",
            &["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5"],
        )
        .with_weight(40),
        Opening::new(
            "C45",
            "Scotch Game",
            &["e2e4", "e7e5", "g1f3", "b8c6", "d2d4", "e5d4", "f3d4"],
        )
        .with_weight(15),
        Opening::new(
            "C42",
            "Petrov Defense",
            &["e2e4", "e7e5", "g1f3", "g8f6", "f3e5", "d7d6", "e5f3", "f6e4"],
        )
        .with_weight(15),
        // Semi-open games
        Opening::new(
            "B90",
            "Sicilian Defense: Najdorf",
            &[
                "e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4", "f3d4", "g8f6", "b1c3", "a7a6",
            ],
        )
        .with_weight(45),
        Opening::new(
            "B40",
            "Sicilian Defense: Open",
            &["e2e4", "c7c5", "g1f3", "e7e6", "d2d4", "c5d4", "f3d4"],
        )
        .with_weight(20),
        Opening::new(
            "C11",
            "French Defense: Classical",
            &["e2e4", "e7e6", "d2d4", "d7d5", "b1c3", "g8f6"],
        )
        .with_weight(25),
        Opening::new(
            "B12",
            "Caro-Kann Defense: Advance",
            &["e2e4", "c7c6", "d2d4", "d7d5", "e4e5", "c8f5"],
        )
        .with_weight(20),
        Opening::new(
            "B01",
            "Scandinavian Defense",
            &["e2e4", "d7d5", "e4d5", "d8d5", "b1c3", "d5a5"],
        )
        .with_weight(10),
        // Closed games
        Opening::new(
            "D30",
            "Queen's Gambit Declined",
            &["d2d4", "d7d5", "c2c4", "e7e6", "b1c3", "g8f6"],
        )
        .with_weight(35),
        Opening::new(
            "D10",
            "Slav Defense",
            &["d2d4", "d7d5", "c2c4", "c7c6", "g1f3", "g8f6"],
        )
        .with_weight(25),
        Opening::new(
            "D20",
            "Queen's Gambit Accepted",
            &["d2d4", "d7d5", "c2c4", "d5c4", "g1f3", "g8f6"],
        )
        .with_weight(10),
        Opening::new(
            "D02",
            "London System",
            &["d2d4", "d7d5", "g1f3", "g8f6", "c1f4"],
        )
        .with_weight(20),
        // Indian defenses
        Opening::new(
            "E60",
            "King's Indian Defense",
            &["d2d4", "g8f6", "c2c4", "g7g6", "b1c3", "f8g7", "e2e4", "d7d6"],
        )
        .with_weight(30),
        Opening::new(
            "E20",
            "Nimzo-Indian Defense",
            &["d2d4", "g8f6", "c2c4", "e7e6", "b1c3", "f8b4"],
        )
        .with_weight(30),
        Opening::new(
            "E12",
            "Queen's Indian Defense",
            &["d2d4", "g8f6", "c2c4", "e7e6", "g1f3", "b7b6"],
        )
        .with_weight(15),
        Opening::new(
            "D80",
            "Grunfeld Defense",
            &["d2d4", "g8f6", "c2c4", "g7g6", "b1c3", "d7d5"],
        )
        .with_weight(15),
        Opening::new("A80", "Dutch Defense", &["d2d4", "f7f5", "g2g3", "g8f6", "f1g2"])
            .with_weight(8),
        // Flank openings
        Opening::new("A20", "English Opening", &["c2c4", "e7e5", "b1c3", "g8f6", "g2g3"])
            .with_weight(20),
        Opening::new(
            "A30",
            "English Opening: Symmetrical",
            &["c2c4", "c7c5", "g1f3", "b8c6"],
        )
        .with_weight(10),
        Opening::new("A09", "Reti Opening", &["g1f3", "d7d5", "c2c4"]).with_weight(15),
    ]
}

/// Creates the built-in opening book.
///
/// # Panics
///
/// Panics if a built-in line is illegal, which the test suite rules out.
#[must_use]
pub fn builtin_book() -> OpeningBook {
    OpeningBook::from_openings(&builtin_openings()).expect("built-in opening lines are legal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::book_key;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_builtin_lines_are_legal() {
        let openings = builtin_openings();
        assert!(OpeningBook::from_openings(&openings).is_ok());
    }

    #[test]
    fn test_builtin_book_covers_first_moves() {
        let book = builtin_book();
        let first: Vec<&str> = book
            .lookup(&book_key(START_FEN), 1)
            .iter()
            .map(|m| m.uci.as_str())
            .collect();

        for expected in ["e2e4", "d2d4", "c2c4", "g1f3"] {
            assert!(first.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_builtin_openings_have_eco_codes() {
        for opening in builtin_openings() {
            assert_eq!(opening.eco.len(), 3, "bad ECO for {}", opening.name);
            assert!(!opening.moves.is_empty());
        }
    }
}
