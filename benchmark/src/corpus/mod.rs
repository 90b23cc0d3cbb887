//! @ai:module:intent Benchmark inputs and where they come from
//! @ai:module:layer domain
//! @ai:module:public_api TestPosition, Puzzle, PuzzleTheme, PuzzleSet, CorpusSource, FileCorpus

pub mod loader;
pub mod position;

pub use loader::{collect_unique, CorpusSource, FileCorpus};
pub use position::{Identified, Puzzle, PuzzleSet, PuzzleTheme, TestPosition};
