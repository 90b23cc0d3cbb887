//! @ai:module:intent Run-level aggregates computed once after every item has finished
//! @ai:module:layer application
//! @ai:module:public_api aggregate_legal_moves, PuzzleTally, tally_puzzles, MatchTally, tally_games
//! @ai:module:stateless true

use crate::metrics::types::{GameOutcome, GameRecord, LegalMoveAggregates, LegalMoveResult, PuzzleResult};
use crate::scoring::LossTally;

/// @ai:intent Calculate average of an iterator of f64
/// @ai:effects pure
pub fn average<I: Iterator<Item = f64>>(iter: I) -> f64 {
    let (sum, count) = iter.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// @ai:intent Averages and totals over the non-error results of a legal-move run
/// @ai:post None when every result carries an error
/// @ai:effects pure
pub fn aggregate_legal_moves(results: &[LegalMoveResult]) -> Option<LegalMoveAggregates> {
    let scored: Vec<&LegalMoveResult> = results.iter().filter(|r| r.error.is_none()).collect();
    if scored.is_empty() {
        return None;
    }

    Some(LegalMoveAggregates {
        scored_positions: scored.len(),
        average_accuracy: average(scored.iter().map(|r| r.score.accuracy())),
        average_penalty: average(scored.iter().map(|r| r.score.penalty())),
        average_final_score: average(scored.iter().map(|r| r.score.final_score())),
        total_correct_moves: scored.iter().map(|r| r.score.correct.len()).sum(),
        total_illegal_moves: scored.iter().map(|r| r.score.illegal.len()).sum(),
        total_missed_moves: scored.iter().map(|r| r.score.missed.len()).sum(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PuzzleTally {
    pub correct: usize,
    pub answered: usize,
    /// Correct over all puzzles, as a percentage.
    pub accuracy: f64,
}

/// @ai:effects pure
pub fn tally_puzzles(results: &[PuzzleResult], total_puzzles: usize) -> PuzzleTally {
    let correct = results.iter().filter(|r| r.is_correct).count();
    let answered = results.iter().filter(|r| r.error.is_none()).count();
    let accuracy = if total_puzzles == 0 {
        0.0
    } else {
        correct as f64 / total_puzzles as f64 * 100.0
    };

    PuzzleTally {
        correct,
        answered,
        accuracy,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchTally {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// Games that produced an outcome (not failed by a process error).
    pub finished: usize,
    pub losses_cp: LossTally,
}

impl MatchTally {
    pub fn acpl(&self) -> Option<f64> {
        self.losses_cp.acpl()
    }
}

/// @ai:intent W/L/D from the AI's side plus pooled centipawn loss
/// @ai:post an illegal-move forfeit counts as a loss
/// @ai:effects pure
pub fn tally_games(games: &[GameRecord]) -> MatchTally {
    let mut tally = MatchTally::default();

    for game in games {
        tally.losses_cp.merge(&game.losses);
        match game.outcome {
            Some(GameOutcome::AiWin) => tally.wins += 1,
            Some(GameOutcome::EngineWin) | Some(GameOutcome::AiIllegalMove) => tally.losses += 1,
            Some(GameOutcome::Draw) => tally.draws += 1,
            None => continue,
        }
        tally.finished += 1;
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::RunStatus;
    use crate::rules::Side;
    use crate::scoring::score_legal_moves;

    fn legal_result(predicted: &[&str], error: Option<&str>) -> LegalMoveResult {
        LegalMoveResult {
            position_id: "p".to_string(),
            model_moves: predicted.iter().map(|m| m.to_string()).collect(),
            score: score_legal_moves(&["a", "b", "c"], predicted),
            response_time_ms: 10,
            raw_response: String::new(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_average() {
        assert_eq!(average([1.0, 2.0, 3.0].into_iter()), 2.0);
        assert_eq!(average(std::iter::empty()), 0.0);
    }

    #[test]
    fn test_legal_move_aggregates_skip_errors() {
        let results = vec![
            legal_result(&["a", "b", "c"], None),
            legal_result(&["a", "b", "d"], None),
            legal_result(&[], Some("timeout")),
        ];

        let aggregates = aggregate_legal_moves(&results).unwrap();
        assert_eq!(aggregates.scored_positions, 2);
        assert!((aggregates.average_final_score - (100.0 + 200.0 / 3.0) / 2.0).abs() < 1e-9);
        assert_eq!(aggregates.total_correct_moves, 5);
        assert_eq!(aggregates.total_illegal_moves, 1);
        assert_eq!(aggregates.total_missed_moves, 1);

        assert_eq!(aggregate_legal_moves(&results[2..]), None);
    }

    #[test]
    fn test_puzzle_accuracy_is_over_all_puzzles() {
        let result = |correct: bool, error: Option<&str>| PuzzleResult {
            puzzle_id: "x".to_string(),
            model_move: None,
            extracted_by: None,
            correct_move: "Qh5#".to_string(),
            is_correct: correct,
            response_time_ms: 1,
            raw_response: String::new(),
            error: error.map(str::to_string),
        };

        let results = vec![result(true, None), result(false, None), result(false, Some("boom")), result(true, None)];
        let tally = tally_puzzles(&results, 4);
        assert_eq!(tally.correct, 2);
        assert_eq!(tally.answered, 3);
        assert_eq!(tally.accuracy, 50.0);
        assert_eq!(tally_puzzles(&[], 0).accuracy, 0.0);
    }

    #[test]
    fn test_match_tally() {
        let game = |outcome: Option<GameOutcome>, losses: &[i32]| {
            let mut tally = LossTally::default();
            for loss in losses {
                tally.record(*loss);
            }
            GameRecord {
                id: "g".to_string(),
                ai_color: Side::White,
                skill_level: 1,
                status: RunStatus::Completed,
                outcome,
                termination: None,
                reason: None,
                moves: vec![],
                losses: tally,
            }
        };

        let games = vec![
            game(Some(GameOutcome::AiIllegalMove), &[150, 60]),
            game(Some(GameOutcome::Draw), &[30, 10]),
            game(None, &[]),
        ];
        let tally = tally_games(&games);
        assert_eq!((tally.wins, tally.losses, tally.draws), (0, 1, 1));
        assert_eq!(tally.finished, 2);
        assert_eq!(tally.acpl(), Some(62.5));
    }
}
