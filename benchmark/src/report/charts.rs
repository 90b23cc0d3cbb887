//! @ai:module:intent Bar chart of a leaderboard
//! @ai:module:layer infrastructure
//! @ai:module:public_api ChartGenerator
//! @ai:module:stateless true

use crate::report::Leaderboard;
use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;

/// @ai:intent Trait for chart generation
pub trait ChartGeneratorTrait: Send + Sync {
    /// @ai:intent Render the leaderboard chart; false when there was nothing to plot
    fn generate(&self, leaderboard: &Leaderboard, output_path: &Path) -> Result<bool>;
}

pub struct ChartGenerator;

impl ChartGenerator {
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    /// Upper bound of the y axis: percentages stop at 100, ACPL grows with the data.
    fn y_max(leaderboard: &Leaderboard) -> f64 {
        if leaderboard.lower_is_better {
            let max = leaderboard.entries.iter().filter_map(|e| e.score).fold(0.0, f64::max);
            (max * 1.1).max(10.0)
        } else {
            100.0
        }
    }

    /// @ai:intent One bar per model in rank order
    /// @ai:effects fs:write
    fn draw(leaderboard: &Leaderboard, output_path: &Path) -> Result<()> {
        let width = (160 * leaderboard.entries.len() as u32).clamp(800, 2400);
        let root = BitMapBackend::new(output_path, (width, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let labels: Vec<String> = leaderboard
            .entries
            .iter()
            .map(|e| format!("{}/{}", e.provider, e.model))
            .collect();

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{} Leaderboard", leaderboard.benchmark.title()), ("sans-serif", 30))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d(0..labels.len() as i32, 0f64..Self::y_max(leaderboard))?;

        chart
            .configure_mesh()
            .x_labels(labels.len())
            .y_desc(leaderboard.metric.as_str())
            .x_desc("Model")
            .x_label_formatter(&|x| labels.get(*x as usize).cloned().unwrap_or_default())
            .draw()?;

        let color = if leaderboard.lower_is_better { RED } else { BLUE };
        // Unscored entries keep their slot on the axis without a bar.
        chart.draw_series(leaderboard.entries.iter().enumerate().filter_map(|(i, entry)| {
            let score = entry.score?;
            Some(Rectangle::new([(i as i32, 0.0), (i as i32 + 1, score)], color.mix(0.7).filled()))
        }))?;

        root.present()?;
        Ok(())
    }
}

impl Default for ChartGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartGeneratorTrait for ChartGenerator {
    /// @ai:effects fs:write
    fn generate(&self, leaderboard: &Leaderboard, output_path: &Path) -> Result<bool> {
        if leaderboard.entries.is_empty() {
            tracing::debug!("Leaderboard is empty, skipping chart");
            return Ok(false);
        }
        Self::draw(leaderboard, output_path)?;
        Ok(true)
    }
}
