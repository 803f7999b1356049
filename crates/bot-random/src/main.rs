//! Random move bot - scores every legal move with noise.
//!
//! Reads one FEN position per line on stdin and answers each with a single
//! line of `move|score,` pairs, padded with the `a1a1|0,` null move. Captures
//! get a bonus for the captured piece, so a higher skill level (less noise,
//! set through `ENGINE_SKILL_LEVEL`) plays greedier.
//!
//! This is the simplest possible engine, useful as a template for more
//! sophisticated ones.

use std::io::{self, BufRead, Write};

use rand::Rng;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Position, Role};

const SENTINEL: &str = "a1a1|0,";

fn piece_value(role: Role) -> i64 {
    match role {
        Role::Pawn => 100,
        Role::Knight | Role::Bishop => 300,
        Role::Rook => 500,
        Role::Queen => 900,
        Role::King => 0,
    }
}

/// Noise amplitude for a skill level; no level means pure noise.
fn noise_for(skill: Option<u32>) -> i64 {
    match skill {
        Some(level) => 1000 / (i64::from(level.min(20)) + 1),
        None => 1000,
    }
}

fn respond<R: Rng>(line: &str, noise: i64, rng: &mut R) -> String {
    let pos: Chess = match line
        .trim()
        .parse::<Fen>()
        .ok()
        .and_then(|fen| fen.into_position(CastlingMode::Standard).ok())
    {
        Some(pos) => pos,
        None => {
            eprintln!("Invalid position: {}", line.trim());
            return SENTINEL.to_string();
        }
    };

    let mut out = String::new();
    for m in pos.legal_moves() {
        let bonus = m.capture().map_or(0, piece_value);
        let score = bonus + rng.gen_range(-noise..=noise);
        out.push_str(&format!("{}|{},", m.to_uci(CastlingMode::Standard), score));
    }
    out.push_str(SENTINEL);
    out
}

fn main() {
    let skill = std::env::var("ENGINE_SKILL_LEVEL")
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok());
    let noise = noise_for(skill);
    let mut rng = rand::thread_rng();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error reading position: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = respond(&line, noise, &mut rng);
        if writeln!(stdout, "{}", response)
            .and_then(|()| stdout.flush())
            .is_err()
        {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pairs(response: &str) -> Vec<(&str, i64)> {
        response
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                let (mv, score) = s.split_once('|').unwrap();
                (mv, score.parse().unwrap())
            })
            .collect()
    }

    #[test]
    fn test_startpos_lists_every_legal_move() {
        let mut rng = StdRng::seed_from_u64(1);
        let response = respond(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            noise_for(None),
            &mut rng,
        );
        let pairs = pairs(&response);
        assert_eq!(pairs.len(), 21);
        assert_eq!(pairs.last(), Some(&("a1a1", 0)));
        assert!(pairs.iter().any(|(m, _)| *m == "e2e4"));
        assert!(pairs.iter().all(|(_, s)| s.abs() <= 1000));
    }

    #[test]
    fn test_checkmated_position_answers_sentinel_only() {
        let mut rng = StdRng::seed_from_u64(1);
        let response = respond(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
            noise_for(None),
            &mut rng,
        );
        assert_eq!(response, SENTINEL);
    }

    #[test]
    fn test_invalid_position_answers_sentinel() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(respond("not a position", 10, &mut rng), SENTINEL);
    }

    #[test]
    fn test_high_skill_prefers_captures() {
        let mut rng = StdRng::seed_from_u64(9);
        // White queen can take an undefended black queen.
        let response = respond("3qk3/8/8/8/8/8/8/3QK3 w - - 0 1", noise_for(Some(20)), &mut rng);
        let best = pairs(&response)
            .into_iter()
            .max_by_key(|(_, s)| *s)
            .unwrap();
        assert_eq!(best.0, "d1d8");
    }

    #[test]
    fn test_noise_shrinks_with_skill() {
        assert_eq!(noise_for(None), 1000);
        assert_eq!(noise_for(Some(0)), 1000);
        assert_eq!(noise_for(Some(9)), 100);
        assert!(noise_for(Some(20)) < 50);
    }
}
