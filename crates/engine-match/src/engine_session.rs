//! Subprocess client for candidate-line engines.
//!
//! The wire protocol has no handshake: the engine reads one line holding a
//! FEN position and answers with one line of scored candidates (see
//! [`crate::candidates`]). A session owns the process and both of its pipes
//! and releases them on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use engine_match::engine_session::{EngineSession, QueryOptions};
//! use engine_match::types::Position;
//!
//! # async fn run() -> Result<(), engine_match::MatchError> {
//! let line = EngineSession::query("./engine", &Position::startpos(), &QueryOptions::default())
//!     .await?;
//! println!("engine says: {line}");
//! # Ok(())
//! # }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::MatchError;
use crate::types::Position;

/// Environment variable through which a configured skill level reaches the
/// engine. It is set once at spawn time and is not part of the per-ply
/// protocol.
pub const SKILL_LEVEL_ENV: &str = "ENGINE_SKILL_LEVEL";

/// How long a process may take to exit after its stdin is closed.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Per-query settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Maximum wait for the response line. `None` waits indefinitely.
    pub time_limit: Option<Duration>,
    /// Skill level forwarded through [`SKILL_LEVEL_ENV`].
    pub skill_level: Option<u32>,
}

/// A live engine process with its input and output streams.
///
/// # Lifecycle
///
/// 1. Start the engine with [`EngineSession::spawn`]
/// 2. Exchange a position for a response with [`EngineSession::exchange`]
/// 3. Release the process with [`EngineSession::close`]
///
/// [`EngineSession::query`] runs all three steps. If a session is dropped
/// without being closed, the process is killed.
pub struct EngineSession {
    /// Path of the engine executable.
    path: PathBuf,
    /// The child process handle.
    process: Child,
    /// Engine stdin. `None` once closed.
    stdin: Option<ChildStdin>,
    /// Buffered reader for the engine's stdout.
    stdout: BufReader<ChildStdout>,
}

impl EngineSession {
    /// Starts the engine at `path` with piped stdin and stdout.
    ///
    /// Stderr is discarded. When `skill_level` is set it is passed in the
    /// [`SKILL_LEVEL_ENV`] environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::EngineSpawn`] if the executable does not exist
    /// or cannot be executed.
    pub fn spawn<P: AsRef<Path>>(path: P, skill_level: Option<u32>) -> Result<Self, MatchError> {
        let path = path.as_ref().to_path_buf();

        let mut command = Command::new(&path);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(level) = skill_level {
            command.env(SKILL_LEVEL_ENV, level.to_string());
        }

        let mut process = command.spawn().map_err(|source| MatchError::EngineSpawn {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(engine = %path.display(), pid = ?process.id(), "spawned engine");

        let stdin = process.stdin.take();
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| MatchError::protocol(&path, "stdout was not captured"))?;

        Ok(Self {
            path,
            process,
            stdin,
            stdout,
        })
    }

    /// Returns the engine path this session was spawned from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sends a position and reads the single response line.
    ///
    /// The returned line has its line terminator removed and is otherwise
    /// untouched. A session may be used for several exchanges as long as
    /// each one completes before the next starts.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::EngineProtocol`] if the engine's stdin is
    /// already closed, the output ends before a line is produced, or
    /// `time_limit` elapses first.
    pub async fn exchange(
        &mut self,
        position: &Position,
        time_limit: Option<Duration>,
    ) -> Result<String, MatchError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MatchError::protocol(&self.path, "input stream already closed"))?;

        let request = format!("{}\n", position);
        let written = async {
            stdin.write_all(request.as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        match written {
            Ok(()) => {}
            // The engine may have answered and exited without reading; any
            // line it wrote is still in the pipe.
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!(engine = %self.path.display(), "engine closed its input early");
            }
            Err(e) => {
                return Err(MatchError::protocol(
                    &self.path,
                    format!("failed to write position: {e}"),
                ))
            }
        }

        let mut line = String::new();
        let read = self.stdout.read_line(&mut line);
        let read = match time_limit {
            Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| {
                MatchError::protocol(
                    &self.path,
                    format!("no response within {} ms", limit.as_millis()),
                )
            })?,
            None => read.await,
        };

        let n = read
            .map_err(|e| MatchError::protocol(&self.path, format!("failed to read response: {e}")))?;
        if n == 0 {
            return Err(MatchError::protocol(
                &self.path,
                "end of stream before a response line",
            ));
        }

        let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string();
        tracing::debug!(engine = %self.path.display(), position = %position, response = %line, "exchange");
        Ok(line)
    }

    /// Closes the engine's stdin and waits for it to exit.
    ///
    /// An engine that is still running after a short grace period is killed.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::EngineProtocol`] if waiting for or killing the
    /// process fails at the OS level.
    pub async fn close(mut self) -> Result<(), MatchError> {
        drop(self.stdin.take());

        match tokio::time::timeout(EXIT_GRACE, self.process.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(engine = %self.path.display(), %status, "engine exited");
                Ok(())
            }
            Ok(Err(e)) => Err(MatchError::protocol(
                &self.path,
                format!("failed to wait for exit: {e}"),
            )),
            Err(_) => {
                tracing::warn!(engine = %self.path.display(), "engine did not exit, killing it");
                self.process
                    .kill()
                    .await
                    .map_err(|e| MatchError::protocol(&self.path, format!("failed to kill: {e}")))
            }
        }
    }

    /// Kills the process and reaps it, ignoring errors.
    async fn abort(mut self) {
        drop(self.stdin.take());
        if let Err(e) = self.process.kill().await {
            tracing::warn!(engine = %self.path.display(), error = %e, "failed to kill engine");
        }
    }

    /// Runs one complete query: spawn, exchange, close.
    ///
    /// The process is released whether or not the exchange succeeds.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::spawn`], [`Self::exchange`] or [`Self::close`].
    pub async fn query<P: AsRef<Path>>(
        path: P,
        position: &Position,
        options: &QueryOptions,
    ) -> Result<String, MatchError> {
        let mut session = Self::spawn(path, options.skill_level)?;
        match session.exchange(position, options.time_limit).await {
            Ok(line) => {
                session.close().await?;
                Ok(line)
            }
            Err(e) => {
                tracing::warn!(engine = %session.path.display(), error = %e, "engine query failed");
                session.abort().await;
                Err(e)
            }
        }
    }
}
