//! Decoding of engine response lines into scored candidate moves.
//!
//! An engine answers a position with a single line of the form
//!
//! ```text
//! e2e4|35,d2d4|30,g1f3 |12,a1a1|0,
//! ```
//!
//! Pairs are separated by `,`, move and score by `|`. A trailing separator
//! is allowed. Null moves (same origin and destination square) are padding
//! and never reach the caller.

use crate::error::MatchError;
use crate::types::Move;
use std::fmt;

/// Scored candidate moves from a single engine response.
///
/// Moves are unique. Iteration follows the order in which moves first
/// appeared in the response, which makes tie-breaking deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    entries: Vec<(Move, i64)>,
}

impl CandidateSet {
    /// Returns the number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the score of a move, if it is a candidate.
    #[must_use]
    pub fn get(&self, mv: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(m, _)| m.as_str() == mv)
            .map(|(_, score)| *score)
    }

    /// Iterates over `(move, score)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&Move, i64)> {
        self.entries.iter().map(|(m, s)| (m, *s))
    }
}

impl FromIterator<(Move, i64)> for CandidateSet {
    /// Collects pairs, dropping null moves. A repeated move keeps its first
    /// position and takes the later score.
    fn from_iter<I: IntoIterator<Item = (Move, i64)>>(iter: I) -> Self {
        let mut entries: Vec<(Move, i64)> = Vec::new();
        for (mv, score) in iter {
            if mv.is_null() {
                continue;
            }
            match entries.iter_mut().find(|(m, _)| *m == mv) {
                Some(existing) => existing.1 = score,
                None => entries.push((mv, score)),
            }
        }
        Self { entries }
    }
}

impl fmt::Display for CandidateSet {
    /// Writes the set back in wire form, e.g. `e2e4|35,g1f3|12,`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (mv, score) in &self.entries {
            write!(f, "{}|{},", mv, score)?;
        }
        Ok(())
    }
}

/// Decodes one raw response line into a [`CandidateSet`].
///
/// A trailing line terminator is ignored, and so is any segment that is
/// empty after trimming.
///
/// # Errors
///
/// Returns [`MatchError::MalformedCandidate`] when a segment is not exactly
/// one `move|score` pair, the score is not an integer, or the move is not a
/// valid coordinate move after normalization.
///
/// # Example
///
/// ```
/// use engine_match::candidates::decode;
///
/// let set = decode("e7e8Q|50,a1a1|0,g1f3 |10").unwrap();
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.get("e7e8q"), Some(50));
/// assert_eq!(set.get("g1f3"), Some(10));
/// ```
pub fn decode(line: &str) -> Result<CandidateSet, MatchError> {
    let body = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    let mut pairs = Vec::new();

    for segment in body.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let (raw_move, raw_score) = segment
            .split_once('|')
            .ok_or_else(|| MatchError::malformed(line, format!("missing '|' in {segment:?}")))?;
        if raw_score.contains('|') {
            return Err(MatchError::malformed(
                line,
                format!("more than one '|' in {segment:?}"),
            ));
        }

        let score: i64 = raw_score.trim().parse().map_err(|_| {
            MatchError::malformed(line, format!("score {raw_score:?} is not an integer"))
        })?;
        let mv = normalize_move(raw_move)
            .ok_or_else(|| MatchError::malformed(line, format!("invalid move {raw_move:?}")))?;

        pairs.push((mv, score));
    }

    Ok(pairs.into_iter().collect())
}

/// Normalizes an engine move token.
///
/// A fifth character that is a space is an annotation placeholder and is
/// cut off; any other fifth character is a promotion letter and is
/// lowercased.
fn normalize_move(raw: &str) -> Option<Move> {
    let chars: Vec<char> = raw.chars().collect();
    let text: String = match chars.len() {
        4 => chars.iter().collect(),
        5 if chars[4] == ' ' => chars[..4].iter().collect(),
        5 => chars[..4]
            .iter()
            .copied()
            .chain(chars[4].to_lowercase())
            .collect(),
        _ => return None,
    };
    Move::parse(&text).ok()
}
