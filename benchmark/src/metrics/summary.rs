//! @ai:module:intent Long-lived per-model summaries merged incrementally from completed runs
//! @ai:module:layer domain
//! @ai:module:public_api Direction, MetricSummary, LegalMoveSummary, PuzzleSummary, EngineMatchSummary, summary_id
//! @ai:module:stateless true

use crate::corpus::PuzzleTheme;
use crate::runner::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// @ai:intent Whether larger metric values are better
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// @ai:intent Store id of the summary for one (provider, model)
/// @ai:effects pure
pub fn summary_id(provider: Provider, model: &str) -> String {
    format!("{provider}:{model}")
}

/// @ai:intent Running average / best / worst of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub runs_completed: u32,
    pub average: f64,
    pub best: f64,
    pub worst: f64,
    pub last_run_at: DateTime<Utc>,
}

impl MetricSummary {
    /// @ai:effects pure
    pub fn first(value: f64, now: DateTime<Utc>) -> Self {
        Self {
            runs_completed: 1,
            average: value,
            best: value,
            worst: value,
            last_run_at: now,
        }
    }

    /// @ai:intent Fold one run's value into the running statistics
    /// @ai:effects state:write
    pub fn merge(&mut self, value: f64, direction: Direction, now: DateTime<Utc>) {
        let count = self.runs_completed as f64;
        self.average = (self.average * count + value) / (count + 1.0);
        match direction {
            Direction::HigherIsBetter => {
                self.best = self.best.max(value);
                self.worst = self.worst.min(value);
            }
            Direction::LowerIsBetter => {
                self.best = self.best.min(value);
                self.worst = self.worst.max(value);
            }
        }
        self.runs_completed += 1;
        self.last_run_at = now;
    }
}

/// @ai:intent Merge into an optional existing summary; the first run initializes it
/// @ai:effects pure
pub fn merge_metric(
    existing: Option<MetricSummary>,
    value: f64,
    direction: Direction,
    now: DateTime<Utc>,
) -> MetricSummary {
    match existing {
        Some(mut summary) => {
            summary.merge(value, direction, now);
            summary
        }
        None => MetricSummary::first(value, now),
    }
}

/// @ai:intent Identity fields shared by every summary
pub trait ModelSummary {
    fn provider(&self) -> Provider;
    fn model(&self) -> &str;
    /// Value the leaderboard sorts by.
    fn headline(&self) -> Option<f64>;
    fn runs_completed(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMoveSummary {
    pub id: String,
    pub provider: Provider,
    pub model: String,
    /// Per-run average final score (F1), higher is better.
    pub score: MetricSummary,
}

impl LegalMoveSummary {
    /// @ai:effects pure
    pub fn merged(existing: Option<Self>, provider: Provider, model: &str, run_score: f64) -> Self {
        Self {
            id: summary_id(provider, model),
            provider,
            model: model.to_string(),
            score: merge_metric(
                existing.map(|s| s.score),
                run_score,
                Direction::HigherIsBetter,
                Utc::now(),
            ),
        }
    }
}

impl ModelSummary for LegalMoveSummary {
    fn provider(&self) -> Provider {
        self.provider
    }
    fn model(&self) -> &str {
        &self.model
    }
    fn headline(&self) -> Option<f64> {
        Some(self.score.average)
    }
    fn runs_completed(&self) -> u32 {
        self.score.runs_completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleSummary {
    pub id: String,
    pub provider: Provider,
    pub model: String,
    pub themes: BTreeMap<PuzzleTheme, MetricSummary>,
    /// Mean of the per-theme average accuracies present.
    pub overall_accuracy: Option<f64>,
    pub runs_completed: u32,
    pub last_run_at: DateTime<Utc>,
}

impl PuzzleSummary {
    /// @ai:effects pure
    pub fn merged(
        existing: Option<Self>,
        provider: Provider,
        model: &str,
        theme: PuzzleTheme,
        run_accuracy: f64,
    ) -> Self {
        let now = Utc::now();
        let (mut themes, runs) = existing
            .map(|s| (s.themes, s.runs_completed))
            .unwrap_or_default();

        let updated = merge_metric(themes.remove(&theme), run_accuracy, Direction::HigherIsBetter, now);
        themes.insert(theme, updated);

        let overall_accuracy = if themes.is_empty() {
            None
        } else {
            Some(themes.values().map(|m| m.average).sum::<f64>() / themes.len() as f64)
        };

        Self {
            id: summary_id(provider, model),
            provider,
            model: model.to_string(),
            themes,
            overall_accuracy,
            runs_completed: runs + 1,
            last_run_at: now,
        }
    }

    pub fn theme_accuracy(&self, theme: PuzzleTheme) -> Option<f64> {
        self.themes.get(&theme).map(|m| m.average)
    }
}

impl ModelSummary for PuzzleSummary {
    fn provider(&self) -> Provider {
        self.provider
    }
    fn model(&self) -> &str {
        &self.model
    }
    fn headline(&self) -> Option<f64> {
        self.overall_accuracy
    }
    fn runs_completed(&self) -> u32 {
        self.runs_completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMatchSummary {
    pub id: String,
    pub provider: Provider,
    pub model: String,
    /// Completed runs, including those without a scored AI move.
    pub runs_completed: u32,
    /// Per-run ACPL over runs that scored at least one AI move; best is the lowest.
    pub acpl: Option<MetricSummary>,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub last_run_at: DateTime<Utc>,
}

impl EngineMatchSummary {
    /// @ai:intent Fold one completed run in; the record always counts, ACPL only when the run has one
    /// @ai:effects pure
    pub fn merged(
        existing: Option<Self>,
        provider: Provider,
        model: &str,
        run_acpl: Option<f64>,
        record: (u32, u32, u32),
    ) -> Self {
        let (wins, losses, draws) = record;
        let (runs, previous, totals) = match existing {
            Some(s) => (s.runs_completed, s.acpl, (s.wins, s.losses, s.draws)),
            None => (0, None, (0, 0, 0)),
        };
        let now = Utc::now();
        let acpl = match run_acpl {
            Some(value) => Some(merge_metric(previous, value, Direction::LowerIsBetter, now)),
            None => previous,
        };

        Self {
            id: summary_id(provider, model),
            provider,
            model: model.to_string(),
            runs_completed: runs + 1,
            acpl,
            wins: totals.0 + wins,
            losses: totals.1 + losses,
            draws: totals.2 + draws,
            last_run_at: now,
        }
    }
}

impl ModelSummary for EngineMatchSummary {
    fn provider(&self) -> Provider {
        self.provider
    }
    fn model(&self) -> &str {
        &self.model
    }
    fn headline(&self) -> Option<f64> {
        self.acpl.as_ref().map(|m| m.average)
    }
    fn runs_completed(&self) -> u32 {
        self.runs_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merging_two_runs_into_empty_summary() {
        let now = Utc::now();
        let summary = merge_metric(None, 80.0, Direction::HigherIsBetter, now);
        let summary = merge_metric(Some(summary), 90.0, Direction::HigherIsBetter, now);

        assert_eq!(summary.runs_completed, 2);
        assert_eq!(summary.average, 85.0);
        assert_eq!(summary.best, 90.0);
        assert_eq!(summary.worst, 80.0);
    }

    #[test]
    fn test_lower_is_better_reverses_best_and_worst() {
        let now = Utc::now();
        let mut summary = MetricSummary::first(40.0, now);
        summary.merge(25.0, Direction::LowerIsBetter, now);
        summary.merge(60.0, Direction::LowerIsBetter, now);

        assert_eq!(summary.best, 25.0);
        assert_eq!(summary.worst, 60.0);
        assert!((summary.average - 125.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_puzzle_summary_tracks_themes_and_overall() {
        let s = PuzzleSummary::merged(None, Provider::Gemini, "gemini-2.5-pro", PuzzleTheme::MateIn1, 80.0);
        let s = PuzzleSummary::merged(Some(s), Provider::Gemini, "gemini-2.5-pro", PuzzleTheme::OneMove, 40.0);
        let s = PuzzleSummary::merged(Some(s), Provider::Gemini, "gemini-2.5-pro", PuzzleTheme::MateIn1, 100.0);

        assert_eq!(s.runs_completed, 3);
        assert_eq!(s.theme_accuracy(PuzzleTheme::MateIn1), Some(90.0));
        assert_eq!(s.theme_accuracy(PuzzleTheme::OneMove), Some(40.0));
        assert_eq!(s.overall_accuracy, Some(65.0));
        assert_eq!(s.id, "gemini:gemini-2.5-pro");
    }

    #[test]
    fn test_engine_summary_accumulates_record() {
        let s = EngineMatchSummary::merged(None, Provider::Grok, "grok-4", Some(120.0), (0, 2, 0));
        let s = EngineMatchSummary::merged(Some(s), Provider::Grok, "grok-4", Some(80.0), (1, 0, 1));

        assert_eq!((s.wins, s.losses, s.draws), (1, 2, 1));
        let acpl = s.acpl.as_ref().unwrap();
        assert_eq!(acpl.best, 80.0);
        assert_eq!(acpl.worst, 120.0);
        assert_eq!(s.headline(), Some(100.0));
        assert_eq!(s.runs_completed, 2);
    }

    #[test]
    fn test_engine_run_without_scored_moves_still_counts() {
        let s = EngineMatchSummary::merged(None, Provider::Grok, "grok-3-mini", None, (0, 2, 0));
        assert_eq!(s.runs_completed, 1);
        assert_eq!(s.losses, 2);
        assert_eq!(s.acpl, None);
        assert_eq!(s.headline(), None);

        let s = EngineMatchSummary::merged(Some(s), Provider::Grok, "grok-3-mini", Some(90.0), (0, 1, 1));
        assert_eq!(s.runs_completed, 2);
        assert_eq!((s.wins, s.losses, s.draws), (0, 3, 1));
        let acpl = s.acpl.as_ref().unwrap();
        assert_eq!(acpl.runs_completed, 1);
        assert_eq!(acpl.average, 90.0);

        let s = EngineMatchSummary::merged(Some(s), Provider::Grok, "grok-3-mini", None, (0, 2, 0));
        assert_eq!(s.runs_completed, 3);
        assert_eq!(s.acpl.as_ref().unwrap().average, 90.0);
    }

    #[test]
    fn test_puzzle_summary_serializes_theme_keys() {
        let s = PuzzleSummary::merged(None, Provider::Claude, "m", PuzzleTheme::MateIn1, 50.0);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["themes"]["mateIn1"]["average"], 50.0);
        let back: PuzzleSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
