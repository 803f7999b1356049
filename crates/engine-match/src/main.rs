use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chess_openings::{builtin_book, OpeningBook};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use engine_match::batch::{BatchRunner, BatchSummary};
use engine_match::board::{BoardRules, StandardRules};
use engine_match::candidates;
use engine_match::config::MatchConfig;
use engine_match::engine_session::{EngineSession, QueryOptions};
use engine_match::json_output::write_summary;
use engine_match::pgn::write_pgn;
use engine_match::policy::{self, BookAdapter, BookProvider, NoBook, ScoreConvention};
use engine_match::types::{Move, Position, Side};

#[derive(Parser)]
#[command(name = "engine-match")]
#[command(about = "Plays chess games between candidate-line engines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of games
    Run {
        /// Configuration file (defaults to match.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Engine playing white
        #[arg(long)]
        white: Option<PathBuf>,
        /// Engine playing black
        #[arg(long)]
        black: Option<PathBuf>,
        /// Number of games to play
        #[arg(short, long)]
        games: Option<u32>,
        /// Plies during which the opening book is used (0 disables it)
        #[arg(long)]
        book_depth: Option<u32>,
        /// Per-move time limit in milliseconds
        #[arg(long)]
        movetime_ms: Option<u64>,
        /// Skill level passed to the engines
        #[arg(long)]
        skill_level: Option<u32>,
        /// Directory for PGN files and the summary
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Swap colors every other game
        #[arg(long)]
        alternate_colors: bool,
    },
    /// Send one position to an engine and show its candidates
    Query {
        /// Engine executable
        engine: PathBuf,
        /// Position to send (defaults to the starting position)
        #[arg(long)]
        fen: Option<String>,
        /// Per-move time limit in milliseconds
        #[arg(long)]
        movetime_ms: Option<u64>,
        /// Skill level passed to the engine
        #[arg(long)]
        skill_level: Option<u32>,
        /// Treat scores as White's point of view
        #[arg(long)]
        white_scores: bool,
    },
    /// Print the SAN transcript of a move sequence
    Replay {
        /// Space-separated moves in coordinate notation
        #[arg(long)]
        moves: String,
        /// Start position (defaults to the starting position)
        #[arg(long)]
        fen: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            white,
            black,
            games,
            book_depth,
            movetime_ms,
            skill_level,
            output_dir,
            alternate_colors,
        } => {
            let path = config.unwrap_or_else(MatchConfig::config_path);
            let mut config = MatchConfig::load_from(&path)
                .with_context(|| format!("loading {}", path.display()))?;

            if let Some(white) = white {
                config.engine_white_path = white;
            }
            if let Some(black) = black {
                config.engine_black_path = black;
            }
            if let Some(games) = games {
                config.game_count = games;
            }
            if let Some(depth) = book_depth {
                config.opening_book_depth = depth;
            }
            if movetime_ms.is_some() {
                config.movetime_ms = movetime_ms;
            }
            if skill_level.is_some() {
                config.skill_level = skill_level;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            config.alternate_colors |= alternate_colors;

            run(config).await
        }
        Commands::Query {
            engine,
            fen,
            movetime_ms,
            skill_level,
            white_scores,
        } => {
            let position = parse_position(fen.as_deref())?;
            let options = QueryOptions {
                time_limit: movetime_ms.map(Duration::from_millis),
                skill_level,
            };
            let convention = if white_scores {
                ScoreConvention::White
            } else {
                ScoreConvention::SideToMove
            };
            query(engine, &position, &options, convention).await
        }
        Commands::Replay { moves, fen } => {
            let position = parse_position(fen.as_deref())?;
            replay(&position, &moves)
        }
    }
}

fn parse_position(fen: Option<&str>) -> anyhow::Result<Position> {
    match fen {
        Some(fen) => Position::from_fen(fen).context("invalid --fen"),
        None => Ok(Position::startpos()),
    }
}

fn load_book(config: &MatchConfig) -> anyhow::Result<Arc<dyn BookProvider>> {
    if config.opening_book_depth == 0 {
        return Ok(Arc::new(NoBook));
    }
    let book = match &config.book_path {
        Some(path) => OpeningBook::from_json_file(path)
            .with_context(|| format!("loading opening book {}", path.display()))?,
        None => builtin_book(),
    };
    tracing::info!(positions = book.len(), depth = config.opening_book_depth, "opening book loaded");
    Ok(Arc::new(BookAdapter::new(book, config.book_seed)))
}

async fn run(config: MatchConfig) -> anyhow::Result<()> {
    let book = load_book(&config)?;
    let output_dir = config.output_dir.clone();

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Stop requested, finishing at the next ply");
            stop_clone.store(true, Ordering::SeqCst);
        }
    });

    let runner = BatchRunner::new(config, book)
        .context("invalid configuration")?
        .with_stop_flag(stop);

    println!(
        "Running {} games: {} vs {}",
        runner.config().game_count,
        runner.config().engine_white_path.display(),
        runner.config().engine_black_path.display()
    );

    let summary = runner.run().await;

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    for report in &summary.reports {
        if let Some(record) = &report.record {
            let path = output_dir.join(format!("{}.pgn", report.id));
            if let Err(e) = write_pgn(&path, record, &StandardRules) {
                tracing::warn!(game = report.index + 1, error = %e, "failed to write PGN");
            }
        }
    }
    let summary_path = output_dir.join(format!(
        "summary-{}.json",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    write_summary(&summary_path, &summary)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    print_summary(&summary);
    println!("Summary written to {}", summary_path.display());
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    for report in &summary.reports {
        let outcome = match (&report.failure, &report.record) {
            (Some(kind), _) => format!("failed ({kind})"),
            (None, Some(record)) => record.result().to_string(),
            (None, None) => "not played".to_string(),
        };
        println!(
            "Game {}: {} vs {} - {}",
            report.index + 1,
            report.white,
            report.black,
            outcome
        );
    }

    println!("\nResults:");
    println!("  White wins: {}", summary.white_wins);
    println!("  Black wins: {}", summary.black_wins);
    println!("  Draws: {}", summary.draws);
    if summary.unknown > 0 {
        println!("  Undecided: {}", summary.unknown);
    }
    if summary.failed > 0 {
        println!("  Failed: {}", summary.failed);
        for (kind, count) in summary.failures_by_kind() {
            println!("    {kind}: {count}");
        }
    }
    if summary.cancelled > 0 {
        println!("  Cancelled: {}", summary.cancelled);
    }

    if !summary.engines.is_empty() {
        println!("\nEngines (W/D/L):");
        for (engine, tally) in &summary.engines {
            println!("  {engine}: {}/{}/{}", tally.wins, tally.draws, tally.losses);
        }
    }
}

async fn query(
    engine: PathBuf,
    position: &Position,
    options: &QueryOptions,
    convention: ScoreConvention,
) -> anyhow::Result<()> {
    let line = EngineSession::query(&engine, position, options).await?;
    println!("Response: {line}");

    let candidates = candidates::decode(&line)?;
    for (mv, score) in candidates.iter() {
        println!("  {mv} {score:>8}");
    }

    let mv = policy::select_move_with(position, &candidates, convention)?;
    let legal = StandardRules.is_legal(position, &mv)?;
    println!(
        "Selected: {mv}{}",
        if legal { "" } else { " (illegal in this position)" }
    );
    Ok(())
}

fn replay(start: &Position, moves: &str) -> anyhow::Result<()> {
    let moves = moves
        .split_whitespace()
        .map(|m| Move::parse(m).with_context(|| format!("invalid move {m:?}")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let replay = StandardRules.replay(start, &moves)?;

    let mut number = start.fullmove_number();
    let mut side = start.side_to_move();
    let mut text = String::new();
    for (i, san) in replay.san.iter().enumerate() {
        match side {
            Side::White => text.push_str(&format!("{number}. ")),
            Side::Black if i == 0 => text.push_str(&format!("{number}... ")),
            Side::Black => {}
        }
        text.push_str(san);
        text.push(' ');
        if side == Side::Black {
            number += 1;
        }
        side = side.opposite();
    }

    println!("{}", text.trim_end());
    if let Some((last, history)) = replay.positions.split_last() {
        println!("Final position: {last}");
        if let Some(result) = StandardRules.status(last, history)? {
            println!("Game over: {result}");
        }
    }
    Ok(())
}
