//! @ai:module:intent Run and per-item result records for the three benchmarks
//! @ai:module:layer domain
//! @ai:module:public_api RunStatus, LegalMoveResult, LegalMoveRun, PuzzleResult, PuzzleRun, GameMove, GameRecord, GameOutcome, EngineMatchRun
//! @ai:module:stateless true

use crate::corpus::PuzzleTheme;
use crate::rules::{Side, Termination};
use crate::runner::Provider;
use crate::scoring::{ExtractionStep, LegalMoveScore, LossTally, MoveClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// @ai:intent Shared header of every run record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunHeader {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub provider: Provider,
    pub model: String,
}

impl RunHeader {
    /// @ai:intent Start a run with a fresh id
    /// @ai:effects pure
    pub fn start(provider: Provider, model: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Running,
            provider,
            model: model.to_string(),
        }
    }

    /// @ai:intent Completed when at least one item succeeded, failed otherwise
    /// @ai:effects pure
    pub fn finish(&mut self, succeeded: usize) {
        self.completed_at = Some(Utc::now());
        self.status = if succeeded > 0 {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
    }
}

/// @ai:intent Outcome for one legal-move position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMoveResult {
    pub position_id: String,
    pub model_moves: Vec<String>,
    pub score: LegalMoveScore,
    pub response_time_ms: u64,
    pub raw_response: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMoveAggregates {
    pub scored_positions: usize,
    pub average_accuracy: f64,
    pub average_penalty: f64,
    pub average_final_score: f64,
    pub total_correct_moves: usize,
    pub total_illegal_moves: usize,
    pub total_missed_moves: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMoveRun {
    #[serde(flatten)]
    pub header: RunHeader,
    pub position_count: usize,
    pub results: Vec<LegalMoveResult>,
    pub aggregates: Option<LegalMoveAggregates>,
}

/// @ai:intent Outcome for one puzzle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleResult {
    pub puzzle_id: String,
    pub model_move: Option<String>,
    pub extracted_by: Option<ExtractionStep>,
    pub correct_move: String,
    pub is_correct: bool,
    pub response_time_ms: u64,
    pub raw_response: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleRun {
    #[serde(flatten)]
    pub header: RunHeader,
    pub puzzle_set_id: String,
    pub theme: PuzzleTheme,
    pub total_puzzles: usize,
    pub results: Vec<PuzzleResult>,
    pub correct_count: Option<usize>,
    pub answered_count: Option<usize>,
    /// Correct answers over all puzzles, as a percentage.
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    AiWin,
    EngineWin,
    Draw,
    AiIllegalMove,
}

/// @ai:intent One half-move of an engine match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMove {
    pub ply: u32,
    pub side: Side,
    pub by_ai: bool,
    pub san: String,
    pub fen_before: String,
    pub fen_after: String,
    /// AI-perspective evaluations around an AI move.
    pub eval_before: Option<i32>,
    pub eval_after: Option<i32>,
    pub centipawn_loss: Option<i32>,
    pub classification: Option<MoveClass>,
    pub response_time_ms: Option<u64>,
    pub raw_response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: String,
    pub ai_color: Side,
    pub skill_level: i32,
    pub status: RunStatus,
    pub outcome: Option<GameOutcome>,
    pub termination: Option<Termination>,
    pub reason: Option<String>,
    pub moves: Vec<GameMove>,
    pub losses: LossTally,
}

impl GameRecord {
    pub fn acpl(&self) -> Option<f64> {
        self.losses.acpl()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMatchRun {
    #[serde(flatten)]
    pub header: RunHeader,
    pub skill_level: i32,
    pub games: Vec<GameRecord>,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub totals: LossTally,
    /// Total loss over total scored AI moves across all games.
    pub acpl: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_fails_only_without_successes() {
        let mut header = RunHeader::start(Provider::Openai, "gpt-4o");
        assert_eq!(header.status, RunStatus::Running);

        header.finish(0);
        assert_eq!(header.status, RunStatus::Failed);
        assert!(header.completed_at.is_some());

        header.finish(1);
        assert_eq!(header.status, RunStatus::Completed);
    }

    #[test]
    fn test_run_header_flattens_into_record() {
        let run = PuzzleRun {
            header: RunHeader::start(Provider::Claude, "claude-sonnet"),
            puzzle_set_id: "set".to_string(),
            theme: PuzzleTheme::MateIn1,
            total_puzzles: 0,
            results: vec![],
            correct_count: None,
            answered_count: None,
            accuracy: None,
        };

        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["provider"], "claude");
        assert_eq!(json["status"], "running");
        assert_eq!(json["theme"], "mateIn1");

        let back: PuzzleRun = serde_json::from_value(json).unwrap();
        assert_eq!(back, run);
    }
}
