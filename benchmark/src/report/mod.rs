//! @ai:module:intent Leaderboard reports: JSON, Markdown and PNG chart
//! @ai:module:layer infrastructure
//! @ai:module:public_api ReportGenerator, Leaderboard, JsonReporter, MarkdownReporter, ChartGenerator

pub mod charts;
pub mod json_report;
pub mod leaderboard;
pub mod markdown_report;

pub use charts::{ChartGenerator, ChartGeneratorTrait};
pub use json_report::{JsonReporter, JsonReporterTrait};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use markdown_report::{MarkdownReporter, MarkdownReporterTrait};

use anyhow::Result;
use std::path::{Path, PathBuf};

/// @ai:intent Combined report generator
pub struct ReportGenerator {
    json: JsonReporter,
    markdown: MarkdownReporter,
    charts: ChartGenerator,
}

impl ReportGenerator {
    /// @ai:effects pure
    pub fn new() -> Self {
        Self {
            json: JsonReporter::new(),
            markdown: MarkdownReporter::new(),
            charts: ChartGenerator::new(),
        }
    }

    /// @ai:intent Write `<benchmark>.json`, `<benchmark>.md` and, when there are entries, `<benchmark>.png`
    /// @ai:post returns the paths written
    /// @ai:effects fs:write
    pub fn generate_all(&self, leaderboard: &Leaderboard, output_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;
        let stem = leaderboard.benchmark.as_str();

        let json_path = output_dir.join(format!("{stem}.json"));
        self.json.generate(leaderboard, &json_path)?;

        let markdown_path = output_dir.join(format!("{stem}.md"));
        self.markdown.generate(leaderboard, &markdown_path)?;

        let mut written = vec![json_path, markdown_path];

        let chart_path = output_dir.join(format!("{stem}.png"));
        if self.charts.generate(leaderboard, &chart_path)? {
            written.push(chart_path);
        }

        tracing::info!("Reports generated in {}", output_dir.display());
        Ok(written)
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}
