//! @ai:module:intent File-backed source of test positions and puzzles
//! @ai:module:layer infrastructure
//! @ai:module:public_api CorpusSource, FileCorpus, collect_unique
//! @ai:module:stateless true

use crate::corpus::position::{Identified, Puzzle, PuzzleTheme, TestPosition};
use crate::error::CorpusError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// @ai:intent Trait for supplying benchmark inputs
pub trait CorpusSource: Send + Sync {
    /// @ai:intent First `count` unique test positions
    fn positions(&self, count: usize) -> Result<Vec<TestPosition>, CorpusError>;

    /// @ai:intent First `count` unique puzzles carrying `theme`
    fn puzzles(&self, theme: PuzzleTheme, count: usize) -> Result<Vec<Puzzle>, CorpusError>;
}

/// @ai:intent Keep the first occurrence of each id across batches, stopping at `count`
/// @ai:effects pure
pub fn collect_unique<T: Identified>(batches: impl IntoIterator<Item = Vec<T>>, count: usize) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(count);

    for batch in batches {
        for item in batch {
            if unique.len() >= count {
                return unique;
            }
            if seen.insert(item.id().to_string()) {
                unique.push(item);
            }
        }
    }
    unique
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Batch<T> {
    List(Vec<T>),
    Positions { positions: Vec<T> },
    Puzzles { puzzles: Vec<T> },
}

impl<T> Batch<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Batch::List(items) => items,
            Batch::Positions { positions } => positions,
            Batch::Puzzles { puzzles } => puzzles,
        }
    }
}

/// @ai:intent Reads JSON or TOML batches from a file or a directory tree
pub struct FileCorpus {
    positions_path: PathBuf,
    puzzles_path: PathBuf,
}

impl FileCorpus {
    /// @ai:effects pure
    pub fn new(positions_path: impl Into<PathBuf>, puzzles_path: impl Into<PathBuf>) -> Self {
        Self {
            positions_path: positions_path.into(),
            puzzles_path: puzzles_path.into(),
        }
    }

    /// @ai:intent Every .json/.toml file under `root`, sorted by path; each file is one batch
    /// @ai:effects fs:read
    fn find_batch_files(root: &Path) -> Result<Vec<PathBuf>, CorpusError> {
        if !root.exists() {
            return Err(CorpusError::NotFound(root.to_path_buf()));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "json" || ext == "toml")
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        Ok(files)
    }

    /// @ai:effects fs:read
    fn parse_batch<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CorpusError> {
        let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let batch: Batch<T> = if path.extension().map(|ext| ext == "toml").unwrap_or(false) {
            toml::from_str(&content).map_err(|e| CorpusError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| CorpusError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };
        Ok(batch.into_items())
    }

    /// @ai:intent Parse every batch under `root`, skipping unreadable files
    /// @ai:effects fs:read
    fn load_batches<T: DeserializeOwned>(root: &Path) -> Result<Vec<Vec<T>>, CorpusError> {
        let files = Self::find_batch_files(root)?;
        let mut batches = Vec::with_capacity(files.len());

        for path in files {
            match Self::parse_batch(&path) {
                Ok(batch) => batches.push(batch),
                Err(e) => {
                    tracing::warn!("Skipping invalid corpus file {}: {}", path.display(), e);
                }
            }
        }
        Ok(batches)
    }

    fn require<T>(kind: &'static str, items: Vec<T>, wanted: usize) -> Result<Vec<T>, CorpusError> {
        if items.is_empty() && wanted > 0 {
            return Err(CorpusError::Insufficient {
                kind,
                wanted,
                found: 0,
            });
        }
        if items.len() < wanted {
            tracing::warn!(kind, wanted, found = items.len(), "corpus has fewer items than requested");
        }
        Ok(items)
    }
}

impl CorpusSource for FileCorpus {
    /// @ai:effects fs:read
    fn positions(&self, count: usize) -> Result<Vec<TestPosition>, CorpusError> {
        let batches = Self::load_batches::<TestPosition>(&self.positions_path)?;
        Self::require("positions", collect_unique(batches, count), count)
    }

    /// @ai:effects fs:read
    fn puzzles(&self, theme: PuzzleTheme, count: usize) -> Result<Vec<Puzzle>, CorpusError> {
        let batches = Self::load_batches::<Puzzle>(&self.puzzles_path)?
            .into_iter()
            .map(|batch| batch.into_iter().filter(|p| p.has_theme(theme)).collect::<Vec<_>>());
        Self::require("puzzles", collect_unique(batches, count), count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Side;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn puzzle_json(id: &str, theme: &str) -> String {
        format!(
            r#"{{"id": "{id}", "themes": ["{theme}"], "fen": "8/8/8/8/8/8/8/K6k w - - 0 1", "legalMoves": ["Kb1"], "solutionSan": "Kb1"}}"#
        )
    }

    #[test]
    fn test_collect_unique_dedupes_across_batches() {
        let position = |id: &str| TestPosition {
            id: id.to_string(),
            fen: String::new(),
            pgn: String::new(),
            turn: Side::White,
            legal_moves: vec![],
            legal_move_count: 0,
            move_number: 1,
        };

        let batches = vec![
            vec![position("a"), position("b")],
            vec![position("b"), position("c"), position("d")],
        ];
        let ids: Vec<String> = collect_unique(batches, 3).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_puzzles_filtered_by_theme_and_deduped() {
        let temp = TempDir::new().unwrap();
        create_file(
            temp.path(),
            "batch1.json",
            &format!("[{}, {}]", puzzle_json("p1", "mateIn1"), puzzle_json("p2", "oneMove")),
        );
        create_file(
            temp.path(),
            "nested/batch2.json",
            &format!(
                r#"{{"puzzles": [{}, {}]}}"#,
                puzzle_json("p1", "mateIn1"),
                puzzle_json("p3", "mateIn1")
            ),
        );
        create_file(temp.path(), "broken.json", "{ not json");

        let corpus = FileCorpus::new(temp.path(), temp.path());
        let puzzles = corpus.puzzles(PuzzleTheme::MateIn1, 10).unwrap();
        let ids: Vec<&str> = puzzles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[test]
    fn test_positions_from_toml() {
        let temp = TempDir::new().unwrap();
        create_file(
            temp.path(),
            "positions.toml",
            r#"
[[positions]]
id = "start"
fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
turn = "white"
legalMoves = ["a3", "e4"]
legalMoveCount = 2
moveNumber = 1
"#,
        );

        let corpus = FileCorpus::new(temp.path().join("positions.toml"), temp.path());
        let positions = corpus.positions(5).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].legal_moves, vec!["a3", "e4"]);
    }

    #[test]
    fn test_missing_path_and_empty_corpus() {
        let temp = TempDir::new().unwrap();
        let corpus = FileCorpus::new(temp.path().join("missing"), temp.path());
        assert!(matches!(corpus.positions(1), Err(CorpusError::NotFound(_))));
        assert!(matches!(
            corpus.puzzles(PuzzleTheme::OneMove, 2),
            Err(CorpusError::Insufficient { found: 0, .. })
        ));
    }
}
