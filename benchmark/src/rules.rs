//! @ai:module:intent Chess rules collaborator: legal moves, move application, game status
//! @ai:module:layer domain
//! @ai:module:public_api RulesEngine, AppliedMove, GameStatus, Termination, Side, side_to_move, repetition_key
//! @ai:module:stateless true

use crate::error::RulesError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opponent(&self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// @ai:intent How a game ended by rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    Repetition,
    InsufficientMaterial,
    FiftyMoveRule,
}

/// @ai:intent Check flag plus terminal state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameStatus {
    pub in_check: bool,
    pub outcome: Option<Termination>,
}

/// @ai:intent Result of playing a move: its canonical SAN and the new position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub san: String,
    pub fen: String,
}

/// @ai:intent Chess rules supplied by the embedding application
pub trait RulesEngine: Send + Sync {
    /// @ai:intent Legal moves of the side to move, in SAN
    fn legal_moves(&self, fen: &str) -> Result<Vec<String>, RulesError>;

    /// @ai:intent Play a move given in SAN or UCI notation
    /// @ai:post Err(IllegalMove) when the move is not legal in `fen`
    fn apply_move(&self, fen: &str, mv: &str) -> Result<AppliedMove, RulesError>;

    /// @ai:intent Check and game-over status; repetition needs history and is tracked by callers
    fn status(&self, fen: &str) -> Result<GameStatus, RulesError>;
}

/// @ai:intent Side to move from the second FEN field
/// @ai:effects pure
pub fn side_to_move(fen: &str) -> Result<Side, RulesError> {
    match fen.split_whitespace().nth(1) {
        Some("w") => Ok(Side::White),
        Some("b") => Ok(Side::Black),
        _ => Err(RulesError::InvalidPosition(fen.to_string())),
    }
}

/// @ai:intent Position identity for repetition counting (placement, side, castling, en passant)
/// @ai:effects pure
pub fn repetition_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}
