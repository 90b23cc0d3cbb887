//! @ai:module:intent Markdown leaderboard tables
//! @ai:module:layer infrastructure
//! @ai:module:public_api MarkdownReporter
//! @ai:module:stateless true

use crate::report::{Leaderboard, LeaderboardEntry};
use anyhow::Result;
use std::fmt::Write as FmtWrite;
use std::path::Path;

/// @ai:intent Trait for Markdown report generation
pub trait MarkdownReporterTrait: Send + Sync {
    /// @ai:intent Write the leaderboard as a Markdown document
    fn generate(&self, leaderboard: &Leaderboard, output_path: &Path) -> Result<()>;
}

pub struct MarkdownReporter;

impl MarkdownReporter {
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    fn format_value(value: Option<f64>) -> String {
        value.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string())
    }

    /// @ai:intent Title, generation time and ranking direction
    /// @ai:effects pure
    fn generate_header(leaderboard: &Leaderboard) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "# {} Leaderboard", leaderboard.benchmark.title());
        let _ = writeln!(output);
        let _ = writeln!(output, "**Generated:** {}", leaderboard.generated_at.to_rfc3339());
        let _ = writeln!(
            output,
            "**Ranked by:** {} ({} is better)",
            leaderboard.metric,
            if leaderboard.lower_is_better { "lower" } else { "higher" }
        );
        let _ = writeln!(output);

        output
    }

    /// @ai:intent One row per model, detail columns appended after the fixed ones
    /// @ai:effects pure
    fn generate_table(leaderboard: &Leaderboard) -> String {
        let mut output = String::new();

        if leaderboard.entries.is_empty() {
            let _ = writeln!(output, "_No completed runs yet._");
            return output;
        }

        let details = leaderboard.detail_columns();
        let mut header = format!("| Rank | Provider | Model | {} | Best | Worst | Runs |", leaderboard.metric);
        let mut rule = "|------|----------|-------|------|------|-------|------|".to_string();
        for column in &details {
            header.push_str(&format!(" {column} |"));
            rule.push_str("------|");
        }
        let _ = writeln!(output, "{header}");
        let _ = writeln!(output, "{rule}");

        for entry in &leaderboard.entries {
            let _ = writeln!(output, "{}", Self::row(entry, &details));
        }

        let _ = writeln!(output);
        output
    }

    fn row(entry: &LeaderboardEntry, details: &[String]) -> String {
        let mut row = format!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            entry.rank,
            entry.provider,
            entry.model,
            Self::format_value(entry.score),
            Self::format_value(entry.best),
            Self::format_value(entry.worst),
            entry.runs_completed
        );
        for column in details {
            row.push_str(&format!(" {} |", Self::format_value(entry.details.get(column).copied())));
        }
        row
    }
}

impl Default for MarkdownReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownReporterTrait for MarkdownReporter {
    /// @ai:effects fs:write
    fn generate(&self, leaderboard: &Leaderboard, output_path: &Path) -> Result<()> {
        let mut content = String::new();

        content.push_str(&Self::generate_header(leaderboard));
        content.push_str(&Self::generate_table(leaderboard));

        std::fs::write(output_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmarks::BenchmarkKind;
    use crate::metrics::EngineMatchSummary;
    use crate::report::leaderboard::tests::sample;
    use crate::runner::Provider;
    use tempfile::TempDir;

    #[test]
    fn test_format_value() {
        assert_eq!(MarkdownReporter::format_value(Some(12.345)), "12.3");
        assert_eq!(MarkdownReporter::format_value(None), "-");
    }

    #[test]
    fn test_generate_markdown_report() {
        let reporter = MarkdownReporter::new();
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("legal-moves.md");

        reporter.generate(&sample(), &output).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("# Legal Moves Leaderboard"));
        assert!(content.contains("higher is better"));
        assert!(content.contains("| 1 | claude | claude-sonnet | 80.0 | 81.0 | 79.0 | 2 |"));
    }

    #[test]
    fn test_detail_columns_are_rendered() {
        let summary = EngineMatchSummary::merged(None, Provider::Grok, "grok-4", Some(88.0), (1, 0, 1));
        let board = Leaderboard::engine_match(&[summary]);
        assert_eq!(board.benchmark, BenchmarkKind::EngineMatch);

        let table = MarkdownReporter::generate_table(&board);
        assert!(table.contains("| ACPL | Best | Worst | Runs | draws | losses | wins |"));
        assert!(table.contains("| 88.0 | 88.0 | 88.0 | 1 | 1.0 | 0.0 | 1.0 |"));
    }

    #[test]
    fn test_unscored_entry_renders_dashes() {
        let summary = EngineMatchSummary::merged(None, Provider::Grok, "grok-3-mini", None, (0, 2, 0));
        let table = MarkdownReporter::generate_table(&Leaderboard::engine_match(&[summary]));
        assert!(table.contains("| 1 | grok | grok-3-mini | - | - | - | 1 | 0.0 | 2.0 | 0.0 |"));
    }

    #[test]
    fn test_empty_board() {
        let board = Leaderboard::puzzles(&[]);
        assert!(MarkdownReporter::generate_table(&board).contains("No completed runs"));
    }
}
