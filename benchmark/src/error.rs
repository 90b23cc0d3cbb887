//! @ai:module:intent Error taxonomy for the chess benchmark engine
//! @ai:module:layer domain
//! @ai:module:public_api BenchError, InvokeError, ExtractionError, EngineError, RulesError, StoreError, CorpusError, ConfigError
//! @ai:module:stateless true

use crate::runner::retry::{RetryClassify, RetryError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// @ai:intent Failure of a single model invocation
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("{provider} API error ({status}): {body}")]
    Status {
        provider: String,
        status: u16,
        retry_after: Option<String>,
        body: String,
    },

    #[error("Cannot connect to API ({provider}): {message}")]
    Connect { provider: String, message: String },

    #[error("request to {provider} failed: {message}")]
    Transport { provider: String, message: String },

    #[error("request to {provider} exceeded its {budget:?} budget")]
    BudgetExceeded { provider: String, budget: Duration },

    #[error("missing API key: {0} not set")]
    MissingApiKey(&'static str),

    #[error("malformed response from {provider}: {message}")]
    Malformed { provider: String, message: String },
}

impl RetryClassify for InvokeError {
    fn status_code(&self) -> Option<u16> {
        match self {
            InvokeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn retry_after(&self) -> Option<&str> {
        match self {
            InvokeError::Status { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

/// @ai:intent Model answered but the answer could not be turned into the expected shape
/// @ai:effects pure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no move found in response")]
    NoMoveFound,

    #[error("no move list found in response")]
    NoMoveListFound,

    #[error("empty response")]
    EmptyResponse,
}

/// @ai:intent Failure of the external engine process; always fatal to the owning session
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine binary not found at {0}")]
    BinaryNotFound(PathBuf),

    #[error("engine binary path not configured (set STOCKFISH_BIN_PATH or engine.binary_path)")]
    BinaryNotConfigured,

    #[error("failed to start engine {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout waiting for: {marker} (after {after:?})")]
    Timeout { marker: &'static str, after: Duration },

    #[error("engine exited while waiting for: {0}")]
    ProcessExited(&'static str),

    #[error("could not parse best move")]
    MissingBestMove,

    #[error("engine session is closed")]
    Closed,
}

/// @ai:intent Failure reported by the external chess rules engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("illegal move {mv} in position {fen}")]
    IllegalMove { fen: String, mv: String },

    #[error("invalid position: {0}")]
    InvalidPosition(String),
}

/// @ai:intent Failure of the persistent record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {group}/{id}: {source}")]
    Json {
        group: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

/// @ai:intent Failure to read positions or puzzles
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("corpus path not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("not enough {kind}: wanted {wanted}, found {found}")]
    Insufficient {
        kind: &'static str,
        wanted: usize,
        found: usize,
    },
}

/// @ai:intent Invalid or missing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("{0}")]
    Invalid(String),
}

/// @ai:intent Crate-level error for operations that span several components
#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("timed out before request could start")]
    DeadlineBeforeStart,

    #[error("request aborted after {0:?} deadline")]
    DeadlineExceeded(Duration),

    #[error("background run {id} did not finish: {message}")]
    Background { id: String, message: String },
}

impl From<RetryError<InvokeError>> for BenchError {
    fn from(err: RetryError<InvokeError>) -> Self {
        match err {
            RetryError::DeadlineBeforeStart => BenchError::DeadlineBeforeStart,
            RetryError::DeadlineExceeded(after) => BenchError::DeadlineExceeded(after),
            RetryError::Operation(e) => BenchError::Invoke(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
