//! @ai:module:intent Benchmark inputs: legal-move test positions and tactical puzzles
//! @ai:module:layer domain
//! @ai:module:public_api TestPosition, Puzzle, PuzzleTheme, PuzzleSet, Identified
//! @ai:module:stateless true

use crate::rules::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// @ai:intent Anything deduplicated by id when collected from batches
pub trait Identified {
    fn id(&self) -> &str;
}

/// @ai:intent Position whose full legal-move list the model must enumerate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPosition {
    pub id: String,
    pub fen: String,
    #[serde(default)]
    pub pgn: String,
    pub turn: Side,
    /// Sorted SAN moves.
    pub legal_moves: Vec<String>,
    pub legal_move_count: usize,
    #[serde(default)]
    pub move_number: u32,
}

impl Identified for TestPosition {
    fn id(&self) -> &str {
        &self.id
    }
}

/// @ai:intent Puzzle category a run is scored under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PuzzleTheme {
    #[serde(rename = "mateIn1")]
    MateIn1,
    #[serde(rename = "oneMove")]
    OneMove,
}

impl PuzzleTheme {
    pub const ALL: [PuzzleTheme; 2] = [PuzzleTheme::MateIn1, PuzzleTheme::OneMove];

    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            PuzzleTheme::MateIn1 => "mateIn1",
            PuzzleTheme::OneMove => "oneMove",
        }
    }

    /// @ai:intent Human label used in prompts
    /// @ai:effects pure
    pub fn description(&self) -> &'static str {
        match self {
            PuzzleTheme::MateIn1 => "Mate in 1",
            PuzzleTheme::OneMove => "One Move",
        }
    }
}

impl fmt::Display for PuzzleTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PuzzleTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PuzzleTheme::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || t.as_str().to_lowercase() == s.replace(['-', '_'], ""))
            .ok_or_else(|| format!("unknown puzzle theme: {s} (expected mateIn1 or oneMove)"))
    }
}

/// @ai:intent Externally sourced puzzle with its first solution move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: String,
    #[serde(default)]
    pub rating: u32,
    #[serde(default)]
    pub themes: Vec<String>,
    /// Solution line in UCI notation.
    #[serde(default)]
    pub solution: Vec<String>,
    #[serde(default)]
    pub initial_ply: u32,
    #[serde(default)]
    pub pgn: String,
    pub fen: String,
    /// Legal moves in SAN.
    pub legal_moves: Vec<String>,
    pub solution_san: String,
}

impl Puzzle {
    /// @ai:effects pure
    pub fn has_theme(&self, theme: PuzzleTheme) -> bool {
        self.themes.iter().any(|t| t == theme.as_str())
    }
}

impl Identified for Puzzle {
    fn id(&self) -> &str {
        &self.id
    }
}

/// @ai:intent Fixed list of puzzles a run is executed against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleSet {
    pub id: String,
    pub theme: PuzzleTheme,
    pub created_at: DateTime<Utc>,
    pub puzzles: Vec<Puzzle>,
    pub count: usize,
}

impl PuzzleSet {
    /// @ai:intent Wrap puzzles in a new set with a fresh id
    /// @ai:effects pure
    pub fn new(theme: PuzzleTheme, puzzles: Vec<Puzzle>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            theme,
            created_at: Utc::now(),
            count: puzzles.len(),
            puzzles,
        }
    }
}
