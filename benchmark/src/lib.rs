//! @ai:module:intent Chess benchmark library: run language models through chess benchmarks and rank them
//! @ai:module:layer application
//! @ai:module:public_api benchmarks, config, corpus, engine, error, metrics, orchestrator, report, rules, runner, scoring, store

pub mod benchmarks;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod rules;
pub mod runner;
pub mod scoring;
pub mod store;

pub use benchmarks::{BenchmarkContext, BenchmarkKind, EngineMatchRunner, LegalMoveRunner, PuzzleRunner};
pub use config::BenchmarkConfig;
pub use corpus::{CorpusSource, FileCorpus, Puzzle, PuzzleSet, PuzzleTheme, TestPosition};
pub use engine::{EngineCommand, EngineSession, EngineTimeouts};
pub use error::{BenchError, Result};
pub use metrics::{EngineMatchRun, LegalMoveRun, PuzzleRun, RunStatus};
pub use orchestrator::{BackgroundRun, MatrixJob, MatrixOptions, MatrixOrchestrator, MatrixReport};
pub use report::{Leaderboard, ReportGenerator};
pub use rules::{RulesEngine, Side};
pub use runner::{HttpModelInvoker, ModelInvoker, Provider};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
