//! @ai:module:intent Exclusive, sequential conversation with one external UCI engine process
//! @ai:module:layer infrastructure
//! @ai:module:public_api EngineSession, EngineCommand, EngineTimeouts, Evaluation, SessionState
//! @ai:module:stateless false

use crate::engine::protocol::{self, commands};
use crate::error::EngineError;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const QUIT_GRACE: Duration = Duration::from_millis(500);

/// @ai:intent Program and arguments used to start the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// @ai:intent Hard limits on each protocol wait; expiry is fatal to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimeouts {
    pub handshake: Duration,
    pub ready: Duration,
    pub search: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(5),
            ready: Duration::from_secs(2),
            search: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initializing,
    Ready,
    Busy,
    Closed,
}

/// @ai:intent Engine verdict on a position from the side to move's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub score: i32,
    pub best_move: Option<String>,
}

/// @ai:intent Owned engine process with its output reader
/// @ai:invariant one outstanding request at a time (enforced by &mut self)
/// @ai:invariant any protocol failure kills the process and leaves the session Closed
pub struct EngineSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    output: Vec<String>,
    state: SessionState,
    timeouts: EngineTimeouts,
}

impl EngineSession {
    /// @ai:intent Start the engine and complete the uci/isready handshake
    /// @ai:post Ok => state Ready; Err => the process has been killed
    /// @ai:effects process:spawn
    pub async fn open(command: &EngineCommand, timeouts: EngineTimeouts) -> Result<Self, EngineError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => EngineError::BinaryNotFound(command.program.clone()),
                _ => EngineError::Spawn {
                    path: command.program.clone(),
                    source,
                },
            })?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            output: Vec::new(),
            state: SessionState::Created,
            timeouts,
        };

        session.state = SessionState::Initializing;
        let handshake = session.handshake().await;
        session.settle(handshake)?;

        tracing::debug!(program = %command.program.display(), "engine ready");
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// @ai:intent Configure playing strength (clamped to 0..=20) and confirm readiness
    /// @ai:effects process:io
    pub async fn set_skill_level(&mut self, level: i32) -> Result<(), EngineError> {
        self.begin()?;
        let result = self.configure_skill(protocol::clamp_skill_level(level)).await;
        self.settle(result)
    }

    /// @ai:intent Search for a fixed time and return the chosen move in UCI notation
    /// @ai:effects process:io
    pub async fn best_move(&mut self, fen: &str, movetime: Duration) -> Result<String, EngineError> {
        self.begin()?;
        let result = self.search(fen, &commands::go_movetime(movetime)).await;
        let result = result.and_then(|_| {
            self.output
                .last()
                .and_then(|line| protocol::parse_best_move(line))
                .ok_or(EngineError::MissingBestMove)
        });
        self.settle(result)
    }

    /// @ai:intent Search to a fixed depth and report the score and best move
    /// @ai:post score is from the side to move's point of view; 0 when no score line was seen
    /// @ai:effects process:io
    pub async fn evaluate(&mut self, fen: &str, depth: u32) -> Result<Evaluation, EngineError> {
        self.begin()?;
        let result = self.search(fen, &commands::go_depth(depth)).await;
        let result = result.map(|_| Evaluation {
            score: protocol::last_score(&self.output)
                .map(|score| score.normalized())
                .unwrap_or(0),
            best_move: self
                .output
                .last()
                .and_then(|line| protocol::parse_best_move(line)),
        });
        self.settle(result)
    }

    /// @ai:intent Send quit, then make sure the process is gone
    /// @ai:post state Closed; calling again is a no-op
    /// @ai:effects process:kill
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        let _ = self.send(commands::QUIT).await;
        if tokio::time::timeout(QUIT_GRACE, self.child.wait()).await.is_err() {
            let _ = self.child.kill().await;
        }
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send(commands::UCI).await?;
        self.wait_for(commands::UCI_OK, self.timeouts.handshake).await?;
        self.send(commands::IS_READY).await?;
        self.wait_for(commands::READY_OK, self.timeouts.handshake).await
    }

    async fn configure_skill(&mut self, level: i32) -> Result<(), EngineError> {
        self.send(&commands::skill_level(level)).await?;
        self.send(commands::IS_READY).await?;
        self.wait_for(commands::READY_OK, self.timeouts.ready).await
    }

    async fn search(&mut self, fen: &str, go: &str) -> Result<(), EngineError> {
        self.output.clear();
        self.send(&commands::position(fen)).await?;
        self.send(go).await?;
        self.wait_for(commands::BEST_MOVE, self.timeouts.search).await
    }

    fn begin(&mut self) -> Result<(), EngineError> {
        match self.state {
            SessionState::Ready => {
                self.state = SessionState::Busy;
                Ok(())
            }
            _ => Err(EngineError::Closed),
        }
    }

    /// Marks the session Ready on success; kills the process on any failure.
    fn settle<T>(&mut self, result: Result<T, EngineError>) -> Result<T, EngineError> {
        match result {
            Ok(value) => {
                self.state = SessionState::Ready;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, "engine session failed, killing process");
                self.state = SessionState::Closed;
                let _ = self.child.start_kill();
                Err(err)
            }
        }
    }

    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn wait_for(&mut self, marker: &'static str, after: Duration) -> Result<(), EngineError> {
        match tokio::time::timeout(after, self.read_until(marker)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout { marker, after }),
        }
    }

    async fn read_until(&mut self, marker: &'static str) -> Result<(), EngineError> {
        while let Some(line) = self.stdout.next_line().await? {
            let found = protocol::is_marker(&line, marker);
            self.output.push(line);
            if found {
                return Ok(());
            }
        }
        Err(EngineError::ProcessExited(marker))
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            let _ = self.child.start_kill();
        }
    }
}

fn missing_pipe(name: &str) -> EngineError {
    EngineError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("engine {name} unavailable"),
    ))
}
