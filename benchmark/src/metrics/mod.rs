//! @ai:module:intent Run records, run aggregates and per-model summaries
//! @ai:module:layer application
//! @ai:module:public_api RunHeader, RunStatus, LegalMoveRun, PuzzleRun, EngineMatchRun, MetricSummary, LegalMoveSummary, PuzzleSummary, EngineMatchSummary

pub mod aggregator;
pub mod summary;
pub mod types;

pub use aggregator::{aggregate_legal_moves, tally_games, tally_puzzles, MatchTally, PuzzleTally};
pub use summary::{
    merge_metric, summary_id, Direction, EngineMatchSummary, LegalMoveSummary, MetricSummary,
    ModelSummary, PuzzleSummary,
};
pub use types::{
    EngineMatchRun, GameMove, GameOutcome, GameRecord, LegalMoveAggregates, LegalMoveResult,
    LegalMoveRun, PuzzleResult, PuzzleRun, RunHeader, RunStatus,
};
