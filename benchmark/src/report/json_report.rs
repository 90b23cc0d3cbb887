//! @ai:module:intent JSON leaderboard output
//! @ai:module:layer infrastructure
//! @ai:module:public_api JsonReporter
//! @ai:module:stateless true

use crate::report::Leaderboard;
use anyhow::Result;
use std::path::Path;

/// @ai:intent Trait for JSON report generation
pub trait JsonReporterTrait: Send + Sync {
    /// @ai:intent Write the leaderboard as pretty-printed JSON
    fn generate(&self, leaderboard: &Leaderboard, output_path: &Path) -> Result<()>;
}

pub struct JsonReporter;

impl JsonReporter {
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReporterTrait for JsonReporter {
    /// @ai:effects fs:write
    fn generate(&self, leaderboard: &Leaderboard, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(leaderboard)?;
        std::fs::write(output_path, json)?;
        Ok(())
    }
}
