//! @ai:module:intent Ranked view of stored summaries for one benchmark
//! @ai:module:layer application
//! @ai:module:public_api Leaderboard, LeaderboardEntry
//! @ai:module:stateless true

use crate::benchmarks::BenchmarkKind;
use crate::error::StoreError;
use crate::metrics::{EngineMatchSummary, LegalMoveSummary, ModelSummary, PuzzleSummary};
use crate::runner::Provider;
use crate::store::{groups, RecordStore, RecordStoreExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub provider: Provider,
    pub model: String,
    /// Headline metric; None for models with completed runs but no value yet (e.g. every game forfeited).
    pub score: Option<f64>,
    pub best: Option<f64>,
    pub worst: Option<f64>,
    pub runs_completed: u32,
    /// Extra columns, e.g. per-theme accuracy or W/L/D.
    pub details: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub benchmark: BenchmarkKind,
    /// Label of the ranking metric.
    pub metric: String,
    pub lower_is_better: bool,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// @ai:intent Read every summary of a benchmark from the store and rank it
    /// @ai:effects store:read
    pub fn load(store: &dyn RecordStore, benchmark: BenchmarkKind) -> Result<Self, StoreError> {
        Ok(match benchmark {
            BenchmarkKind::LegalMoves => Self::legal_moves(&store.list(groups::LEGAL_MOVE_SUMMARIES)?),
            BenchmarkKind::Puzzles => Self::puzzles(&store.list(groups::PUZZLE_SUMMARIES)?),
            BenchmarkKind::EngineMatch => Self::engine_match(&store.list(groups::ENGINE_MATCH_SUMMARIES)?),
        })
    }

    /// @ai:effects pure
    pub fn legal_moves(summaries: &[LegalMoveSummary]) -> Self {
        let entries = summaries
            .iter()
            .filter_map(|s| {
                entry(s, |e| {
                    e.best = Some(s.score.best);
                    e.worst = Some(s.score.worst);
                })
            })
            .collect();
        Self::ranked(BenchmarkKind::LegalMoves, "Final score", false, entries)
    }

    /// @ai:effects pure
    pub fn puzzles(summaries: &[PuzzleSummary]) -> Self {
        let entries = summaries
            .iter()
            .filter_map(|s| {
                entry(s, |e| {
                    for (theme, metric) in &s.themes {
                        e.details.insert(theme.as_str().to_string(), metric.average);
                    }
                })
            })
            .collect();
        Self::ranked(BenchmarkKind::Puzzles, "Accuracy (%)", false, entries)
    }

    /// @ai:effects pure
    pub fn engine_match(summaries: &[EngineMatchSummary]) -> Self {
        let entries = summaries
            .iter()
            .filter_map(|s| {
                entry(s, |e| {
                    e.best = s.acpl.as_ref().map(|m| m.best);
                    e.worst = s.acpl.as_ref().map(|m| m.worst);
                    e.details.insert("wins".to_string(), s.wins as f64);
                    e.details.insert("losses".to_string(), s.losses as f64);
                    e.details.insert("draws".to_string(), s.draws as f64);
                })
            })
            .collect();
        Self::ranked(BenchmarkKind::EngineMatch, "ACPL", true, entries)
    }

    /// @ai:intent Sort by score in the metric's direction and assign 1-based ranks
    /// @ai:post entries without a score rank after every scored entry
    fn ranked(benchmark: BenchmarkKind, metric: &str, lower_is_better: bool, mut entries: Vec<LeaderboardEntry>) -> Self {
        entries.sort_by(|a, b| {
            let order = match (a.score, b.score) {
                (Some(x), Some(y)) if lower_is_better => x.total_cmp(&y),
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            order
                .then_with(|| b.runs_completed.cmp(&a.runs_completed))
                .then_with(|| a.model.cmp(&b.model))
        });
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.rank = index + 1;
        }

        Self {
            benchmark,
            metric: metric.to_string(),
            lower_is_better,
            generated_at: Utc::now(),
            entries,
        }
    }

    /// Detail column names across all entries, sorted.
    pub fn detail_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .entries
            .iter()
            .flat_map(|e| e.details.keys().cloned())
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }
}

/// Entry for a summary with at least one completed run; empty summaries are left off the board.
fn entry<S: ModelSummary>(summary: &S, fill: impl FnOnce(&mut LeaderboardEntry)) -> Option<LeaderboardEntry> {
    if summary.runs_completed() == 0 {
        return None;
    }
    let mut entry = LeaderboardEntry {
        rank: 0,
        provider: summary.provider(),
        model: summary.model().to_string(),
        score: summary.headline(),
        best: None,
        worst: None,
        runs_completed: summary.runs_completed(),
        details: BTreeMap::new(),
    };
    fill(&mut entry);
    Some(entry)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::corpus::PuzzleTheme;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    pub(crate) fn sample() -> Leaderboard {
        let a = LegalMoveSummary::merged(None, Provider::Openai, "gpt-4o", 72.5);
        let b = LegalMoveSummary::merged(None, Provider::Claude, "claude-sonnet", 81.0);
        let b = LegalMoveSummary::merged(Some(b), Provider::Claude, "claude-sonnet", 79.0);
        Leaderboard::legal_moves(&[a, b])
    }

    #[test]
    fn test_scores_rank_descending() {
        let board = sample();
        let ranked: Vec<(usize, &str)> = board.entries.iter().map(|e| (e.rank, e.model.as_str())).collect();
        assert_eq!(ranked, vec![(1, "claude-sonnet"), (2, "gpt-4o")]);
        assert_eq!(board.entries[0].best, Some(81.0));
        assert_eq!(board.entries[0].runs_completed, 2);
    }

    #[test]
    fn test_acpl_ranks_ascending_with_record_details() {
        let strong = EngineMatchSummary::merged(None, Provider::Gemini, "gemini-2.5-pro", Some(45.0), (1, 1, 0));
        let weak = EngineMatchSummary::merged(None, Provider::Grok, "grok-4", Some(130.0), (0, 2, 0));

        let board = Leaderboard::engine_match(&[weak, strong]);

        assert!(board.lower_is_better);
        assert_eq!(board.entries[0].model, "gemini-2.5-pro");
        assert_eq!(board.entries[0].details["wins"], 1.0);
        assert_eq!(board.detail_columns(), vec!["draws", "losses", "wins"]);
    }

    #[test]
    fn test_forfeited_model_is_listed_after_scored_ones() {
        let scored = EngineMatchSummary::merged(None, Provider::Grok, "grok-4", Some(130.0), (0, 2, 0));
        let forfeited = EngineMatchSummary::merged(None, Provider::Grok, "grok-3-mini", None, (0, 2, 0));

        let board = Leaderboard::engine_match(&[forfeited, scored]);

        assert_eq!(board.entries.len(), 2);
        assert_eq!(board.entries[0].model, "grok-4");
        let last = &board.entries[1];
        assert_eq!((last.rank, last.model.as_str()), (2, "grok-3-mini"));
        assert_eq!(last.score, None);
        assert_eq!(last.best, None);
        assert_eq!(last.runs_completed, 1);
        assert_eq!(last.details["losses"], 2.0);
    }

    #[test]
    fn test_puzzle_board_has_theme_columns() {
        let s = PuzzleSummary::merged(None, Provider::Openai, "gpt-4o", PuzzleTheme::MateIn1, 60.0);
        let s = PuzzleSummary::merged(Some(s), Provider::Openai, "gpt-4o", PuzzleTheme::OneMove, 20.0);

        let board = Leaderboard::puzzles(&[s]);

        assert_eq!(board.entries[0].score, Some(40.0));
        assert_eq!(board.entries[0].details["mateIn1"], 60.0);
        assert_eq!(board.entries[0].details["oneMove"], 20.0);
    }

    #[test]
    fn test_load_reads_summaries_from_store() {
        let store = MemoryStore::new();
        let summary = LegalMoveSummary::merged(None, Provider::Openai, "gpt-4o", 50.0);
        store.set(groups::LEGAL_MOVE_SUMMARIES, &summary.id, &summary).unwrap();

        let board = Leaderboard::load(&store, BenchmarkKind::LegalMoves).unwrap();
        assert_eq!(board.entries.len(), 1);
        assert!(Leaderboard::load(&store, BenchmarkKind::Puzzles).unwrap().entries.is_empty());
    }
}
