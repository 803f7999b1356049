//! Chess opening book and lookup.
//!
//! This crate turns named opening lines into a table keyed by board position,
//! so that a game in progress can ask "which book moves are known here?"
//! without tracking the move history that led to the position.

pub mod book;
pub mod builtin;
pub mod opening;

pub use book::{book_key, BookError, OpeningBook};
pub use builtin::builtin_book;
pub use opening::{BookMove, Opening};
