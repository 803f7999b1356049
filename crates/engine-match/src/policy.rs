//! Move selection: opening book first, then the best engine candidate.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use chess_openings::OpeningBook;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::candidates::{self, CandidateSet};
use crate::engine_session::{EngineSession, QueryOptions};
use crate::error::MatchError;
use crate::types::{Move, Position, Side};

/// A boxed, sendable future, used where traits return async results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How engine scores are oriented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreConvention {
    /// Scores are from the point of view of the side to move; the highest
    /// score is always best.
    #[default]
    SideToMove,
    /// Scores are from White's point of view; Black picks the lowest.
    White,
}

/// Picks the highest-scoring candidate.
///
/// Ties go to the candidate that appeared first in the engine's response.
///
/// # Errors
///
/// Returns [`MatchError::NoCandidate`] when the set is empty.
pub fn select_move(position: &Position, candidates: &CandidateSet) -> Result<Move, MatchError> {
    select_move_with(position, candidates, ScoreConvention::SideToMove)
}

/// Picks the best candidate for the side to move under `convention`.
///
/// # Errors
///
/// Returns [`MatchError::NoCandidate`] when the set is empty.
pub fn select_move_with(
    position: &Position,
    candidates: &CandidateSet,
    convention: ScoreConvention,
) -> Result<Move, MatchError> {
    best_candidate(position, candidates, convention)
        .map(|(mv, _)| mv)
        .ok_or(MatchError::NoCandidate)
}

fn best_candidate(
    position: &Position,
    candidates: &CandidateSet,
    convention: ScoreConvention,
) -> Option<(Move, i64)> {
    let minimize =
        convention == ScoreConvention::White && position.side_to_move() == Side::Black;

    let mut best: Option<(&Move, i64)> = None;
    for (mv, score) in candidates.iter() {
        let better = match best {
            None => true,
            Some((_, best_score)) if minimize => score < best_score,
            Some((_, best_score)) => score > best_score,
        };
        if better {
            best = Some((mv, score));
        }
    }
    best.map(|(mv, score)| (mv.clone(), score))
}

/// A source of opening-book moves.
pub trait BookProvider: Send + Sync {
    /// Returns a book move for `position`, considering only entries played
    /// before `max_ply` in their opening line.
    fn lookup<'a>(&'a self, position: &'a Position, max_ply: u32) -> BoxFuture<'a, Option<Move>>;
}

/// A provider that never knows a move.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBook;

impl BookProvider for NoBook {
    fn lookup<'a>(&'a self, _position: &'a Position, _max_ply: u32) -> BoxFuture<'a, Option<Move>> {
        Box::pin(std::future::ready(None))
    }
}

/// Serves moves from an [`OpeningBook`], choosing among weighted entries
/// with its own random generator.
#[derive(Debug)]
pub struct BookAdapter {
    book: OpeningBook,
    rng: Mutex<StdRng>,
}

impl BookAdapter {
    /// Wraps a book. A seed makes the choice sequence reproducible.
    #[must_use]
    pub fn new(book: OpeningBook, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            book,
            rng: Mutex::new(rng),
        }
    }

    fn choose(&self, position: &Position, max_ply: u32) -> Option<Move> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = self
            .book
            .select_move(&position.book_key(), max_ply, &mut *rng)?;
        match Move::parse(&entry.uci) {
            Ok(mv) => Some(mv),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unparsable book move");
                None
            }
        }
    }
}

impl BookProvider for BookAdapter {
    fn lookup<'a>(&'a self, position: &'a Position, max_ply: u32) -> BoxFuture<'a, Option<Move>> {
        Box::pin(std::future::ready(self.choose(position, max_ply)))
    }
}

/// An engine that takes over once few pieces remain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndgameEngine {
    /// Path to the endgame engine executable.
    pub path: PathBuf,
    /// Used when the board holds at most this many pieces, kings included.
    pub max_pieces: u32,
}

/// Chooses which engine executable answers a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSelector {
    pub white: PathBuf,
    pub black: PathBuf,
    pub endgame: Option<EndgameEngine>,
}

impl EngineSelector {
    /// Creates a selector without an endgame override.
    #[must_use]
    pub fn new(white: impl Into<PathBuf>, black: impl Into<PathBuf>) -> Self {
        Self {
            white: white.into(),
            black: black.into(),
            endgame: None,
        }
    }

    /// Adds an endgame override.
    #[must_use]
    pub fn with_endgame(mut self, endgame: Option<EndgameEngine>) -> Self {
        self.endgame = endgame;
        self
    }

    /// Returns the engine for `side`, ignoring the endgame override.
    #[must_use]
    pub fn engine_for(&self, side: Side) -> &Path {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    /// Returns the engine that should answer `position`.
    #[must_use]
    pub fn select(&self, position: &Position) -> &Path {
        match &self.endgame {
            Some(endgame) if position.piece_count() <= endgame.max_pieces => &endgame.path,
            _ => self.engine_for(position.side_to_move()),
        }
    }
}

/// Where a move came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveSource {
    Book,
    Engine,
}

/// A move together with how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedMove {
    pub mv: Move,
    pub source: MoveSource,
    /// The engine's score for the move; `None` for book moves.
    pub score: Option<i64>,
    /// The engine that proposed the move; `None` for book moves.
    pub engine: Option<PathBuf>,
}

impl PickedMove {
    /// A move taken from the opening book.
    #[must_use]
    pub fn book(mv: Move) -> Self {
        Self {
            mv,
            source: MoveSource::Book,
            score: None,
            engine: None,
        }
    }
}

/// Produces the next move of a game.
pub trait MoveProvider: Send {
    /// Picks a move for `position`, the position reached after `ply`
    /// half-moves of the game.
    fn next_move<'a>(
        &'a mut self,
        position: &'a Position,
        ply: u32,
    ) -> BoxFuture<'a, Result<PickedMove, MatchError>>;

    /// A display name for the player of `side`.
    fn player_name(&self, side: Side) -> String;
}

/// The standard move provider: book moves while the book applies, then one
/// engine query per ply.
pub struct EnginePicker {
    book: Arc<dyn BookProvider>,
    book_depth: u32,
    selector: EngineSelector,
    options: QueryOptions,
    convention: ScoreConvention,
}

impl EnginePicker {
    #[must_use]
    pub fn new(selector: EngineSelector, options: QueryOptions) -> Self {
        Self {
            book: Arc::new(NoBook),
            book_depth: 0,
            selector,
            options,
            convention: ScoreConvention::default(),
        }
    }

    /// Consults `book` for the first `depth` plies of each game.
    #[must_use]
    pub fn with_book(mut self, book: Arc<dyn BookProvider>, depth: u32) -> Self {
        self.book = book;
        self.book_depth = depth;
        self
    }

    #[must_use]
    pub fn with_convention(mut self, convention: ScoreConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Returns the engine selector.
    #[must_use]
    pub fn selector(&self) -> &EngineSelector {
        &self.selector
    }

    async fn pick(&self, position: &Position, ply: u32) -> Result<PickedMove, MatchError> {
        if ply < self.book_depth {
            if let Some(mv) = self.book.lookup(position, self.book_depth).await {
                tracing::debug!(ply, mv = %mv, "book move");
                return Ok(PickedMove::book(mv));
            }
        }

        let engine = self.selector.select(position);
        let line = EngineSession::query(engine, position, &self.options).await?;
        let candidates = candidates::decode(&line)?;
        let (mv, score) = best_candidate(position, &candidates, self.convention)
            .ok_or(MatchError::NoCandidate)?;
        tracing::debug!(ply, mv = %mv, score, candidates = candidates.len(), "engine move");

        Ok(PickedMove {
            mv,
            source: MoveSource::Engine,
            score: Some(score),
            engine: Some(engine.to_path_buf()),
        })
    }
}

impl MoveProvider for EnginePicker {
    fn next_move<'a>(
        &'a mut self,
        position: &'a Position,
        ply: u32,
    ) -> BoxFuture<'a, Result<PickedMove, MatchError>> {
        Box::pin(self.pick(position, ply))
    }

    fn player_name(&self, side: Side) -> String {
        self.selector.engine_for(side).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_openings::{builtin_book, Opening};
    use proptest::prelude::*;

    fn set(pairs: &[(&str, i64)]) -> CandidateSet {
        pairs
            .iter()
            .map(|(m, s)| (Move::parse(m).unwrap(), *s))
            .collect()
    }

    fn black_to_move() -> Position {
        Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap()
    }

    #[test]
    fn test_select_highest_score() {
        let candidates = set(&[("e2e4", 35), ("d2d4", 40), ("g1f3", 12)]);
        let mv = select_move(&Position::startpos(), &candidates).unwrap();
        assert_eq!(mv.as_str(), "d2d4");
    }

    #[test]
    fn test_select_tie_goes_to_first_seen() {
        let candidates = set(&[("e2e4", 30), ("d2d4", 30), ("c2c4", 30)]);
        let mv = select_move(&Position::startpos(), &candidates).unwrap();
        assert_eq!(mv.as_str(), "e2e4");
    }

    #[test]
    fn test_select_empty_set_is_no_candidate() {
        let err = select_move(&Position::startpos(), &CandidateSet::default()).unwrap_err();
        assert!(matches!(err, MatchError::NoCandidate));
    }

    #[test]
    fn test_side_to_move_convention_maximizes_for_black() {
        let candidates = set(&[("e7e5", -10), ("c7c5", 25)]);
        let mv = select_move(&black_to_move(), &candidates).unwrap();
        assert_eq!(mv.as_str(), "c7c5");
    }

    #[test]
    fn test_white_convention_minimizes_for_black() {
        let candidates = set(&[("e7e5", -10), ("c7c5", 25), ("d7d5", -10)]);
        let black = select_move_with(&black_to_move(), &candidates, ScoreConvention::White).unwrap();
        assert_eq!(black.as_str(), "e7e5");

        let white_candidates = set(&[("e2e4", -10), ("d2d4", 25)]);
        let white =
            select_move_with(&Position::startpos(), &white_candidates, ScoreConvention::White)
                .unwrap();
        assert_eq!(white.as_str(), "d2d4");
    }

    #[test]
    fn test_score_convention_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            convention: ScoreConvention,
        }
        let parsed: Wrapper = toml::from_str("convention = \"side-to-move\"").unwrap();
        assert_eq!(parsed.convention, ScoreConvention::SideToMove);
        let parsed: Wrapper = toml::from_str("convention = \"white\"").unwrap();
        assert_eq!(parsed.convention, ScoreConvention::White);
    }

    #[test]
    fn test_selector_by_side() {
        let selector = EngineSelector::new("./white", "./black");
        assert_eq!(selector.select(&Position::startpos()), Path::new("./white"));
        assert_eq!(selector.select(&black_to_move()), Path::new("./black"));
    }

    #[test]
    fn test_selector_endgame_override() {
        let selector = EngineSelector::new("./white", "./black").with_endgame(Some(EndgameEngine {
            path: PathBuf::from("./tablebase"),
            max_pieces: 5,
        }));

        assert_eq!(selector.select(&Position::startpos()), Path::new("./white"));
        let endgame = Position::from_fen("8/8/8/4k3/8/8/4P3/4K3 b - - 0 1").unwrap();
        assert_eq!(selector.select(&endgame), Path::new("./tablebase"));
        assert_eq!(selector.engine_for(Side::Black), Path::new("./black"));
    }

    #[tokio::test]
    async fn test_no_book_is_empty() {
        assert!(NoBook.lookup(&Position::startpos(), 10).await.is_none());
    }

    #[tokio::test]
    async fn test_book_adapter_returns_book_move() {
        let adapter = BookAdapter::new(builtin_book(), Some(7));
        let mv = adapter.lookup(&Position::startpos(), 4).await.unwrap();
        assert!(["e2e4", "d2d4", "c2c4", "g1f3"].contains(&mv.as_str()));
    }

    #[tokio::test]
    async fn test_book_adapter_respects_max_ply() {
        let book = OpeningBook::from_openings([&Opening::new("C20", "King's Pawn", &["e2e4", "e7e5"])])
            .unwrap();
        let adapter = BookAdapter::new(book, Some(1));
        assert!(adapter.lookup(&Position::startpos(), 0).await.is_none());
        assert!(adapter.lookup(&black_to_move(), 1).await.is_none());
        let reply = adapter.lookup(&black_to_move(), 2).await.unwrap();
        assert_eq!(reply.as_str(), "e7e5");
    }

    #[tokio::test]
    async fn test_seeded_adapters_agree() {
        let a = BookAdapter::new(builtin_book(), Some(42));
        let b = BookAdapter::new(builtin_book(), Some(42));
        for _ in 0..10 {
            assert_eq!(
                a.lookup(&Position::startpos(), 4).await,
                b.lookup(&Position::startpos(), 4).await
            );
        }
    }

    #[tokio::test]
    async fn test_picker_uses_book_within_depth() {
        let book: Arc<dyn BookProvider> = Arc::new(BookAdapter::new(builtin_book(), Some(3)));
        let mut picker = EnginePicker::new(
            EngineSelector::new("/nonexistent/white", "/nonexistent/black"),
            QueryOptions::default(),
        )
        .with_book(book, 4);

        let picked = picker.next_move(&Position::startpos(), 0).await.unwrap();
        assert_eq!(picked.source, MoveSource::Book);
        assert!(picked.score.is_none());
    }

    #[tokio::test]
    async fn test_picker_queries_engine_past_depth() {
        let book: Arc<dyn BookProvider> = Arc::new(BookAdapter::new(builtin_book(), Some(3)));
        let mut picker = EnginePicker::new(
            EngineSelector::new("/nonexistent/white", "/nonexistent/black"),
            QueryOptions::default(),
        )
        .with_book(book, 4);

        let err = picker.next_move(&Position::startpos(), 4).await.unwrap_err();
        assert!(matches!(err, MatchError::EngineSpawn { .. }));
        assert_eq!(picker.player_name(Side::White), "/nonexistent/white");
    }

    proptest! {
        #[test]
        fn prop_selected_move_has_maximal_score(
            scores in prop::collection::vec(-1000i64..1000, 1..20),
        ) {
            let legal = [
                "a2a3", "b2b3", "c2c3", "d2d3", "e2e3", "f2f3", "g2g3", "h2h3",
                "a2a4", "b2b4", "c2c4", "d2d4", "e2e4", "f2f4", "g2g4", "h2h4",
                "b1a3", "b1c3", "g1f3", "g1h3",
            ];
            let candidates: CandidateSet = legal
                .iter()
                .zip(&scores)
                .map(|(m, s)| (Move::parse(m).unwrap(), *s))
                .collect();

            let mv = select_move(&Position::startpos(), &candidates).unwrap();
            let chosen = candidates.get(mv.as_str()).unwrap();
            prop_assert!(candidates.iter().all(|(_, s)| chosen >= s));

            let first_best = candidates.iter().find(|(_, s)| *s == chosen).unwrap().0;
            prop_assert_eq!(&mv, first_best);
        }
    }
}
