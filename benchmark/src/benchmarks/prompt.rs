//! @ai:module:intent Prompt builders for the three benchmarks
//! @ai:module:layer application
//! @ai:module:public_api legal_moves_prompt, puzzle_prompt, game_move_prompt, MovePrompt
//! @ai:module:stateless true

use crate::corpus::{Puzzle, PuzzleTheme, TestPosition};
use crate::rules::{side_to_move, Side};
use crate::runner::Provider;

/// @ai:intent Closing instruction on answer format, stricter where the API has no JSON mode
/// @ai:effects pure
fn answer_format(provider: Provider, example: &str) -> String {
    match provider {
        Provider::Claude => format!(
            "Respond with a single JSON object and nothing else, exactly like: {example}\n\
             Do not wrap it in a code block and do not add commentary."
        ),
        _ => format!("Respond in JSON, exactly like: {example}"),
    }
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::White => "WHITE",
        Side::Black => "BLACK",
    }
}

/// @ai:intent Ask for every legal move of a position
/// @ai:effects pure
pub fn legal_moves_prompt(provider: Provider, position: &TestPosition) -> String {
    let history = if position.pgn.trim().is_empty() {
        String::new()
    } else {
        format!("Game so far (PGN):\n{}\n\n", position.pgn.trim())
    };

    format!(
        "You are a chess expert.\n\n\
         {history}Current position (FEN): {fen}\n\
         Side to move: {turn}\n\n\
         List ALL legal moves for {turn} in this position, using Standard Algebraic Notation \
         (e.g. e4, Nf3, O-O, exd5, e8=Q, Qxf7+). Include every legal move exactly once and \
         no illegal moves.\n\n{format}",
        fen = position.fen,
        turn = side_label(position.turn),
        format = answer_format(provider, r#"{"moves": ["e4", "Nf3", "O-O"]}"#),
    )
}

/// @ai:intent Ask for the single best move of a puzzle
/// @ai:effects pure
pub fn puzzle_prompt(provider: Provider, puzzle: &Puzzle, theme: PuzzleTheme) -> String {
    let turn = side_to_move(&puzzle.fen)
        .map(side_label)
        .unwrap_or("the side to move");

    format!(
        "You are solving a chess puzzle ({theme}).\n\n\
         Position (FEN): {fen}\n\
         {turn} to move.\n\
         Legal moves: {moves}\n\n\
         Find the single best move. Answer with one move from the legal moves list, \
         in Standard Algebraic Notation.\n\n{format}",
        theme = theme.description(),
        fen = puzzle.fen,
        moves = puzzle.legal_moves.join(", "),
        format = answer_format(provider, r#"{"move": "Qxf7#"}"#),
    )
}

/// @ai:intent Inputs for a move request during an engine match
#[derive(Debug, Clone, Copy)]
pub struct MovePrompt<'a> {
    pub fen: &'a str,
    pub side: Side,
    pub in_check: bool,
    pub legal_moves: &'a [String],
    /// Previous unusable answer for this turn, if any.
    pub rejected: Option<&'a str>,
}

/// @ai:intent Ask for the next move in a game against the engine
/// @ai:effects pure
pub fn game_move_prompt(provider: Provider, input: &MovePrompt<'_>) -> String {
    let check = if input.in_check { "You are in CHECK.\n" } else { "" };
    let retry = input
        .rejected
        .map(|mv| format!("Your previous answer ({mv}) was not a legal move. Choose again.\n"))
        .unwrap_or_default();

    format!(
        "You are playing chess as {side} against a chess engine.\n\n\
         Position (FEN): {fen}\n\
         {check}{retry}\
         Legal moves ({count}): {moves}\n\n\
         Play the strongest move. Answer with one move from the legal moves list, \
         in Standard Algebraic Notation.\n\n{format}",
        side = side_label(input.side),
        fen = input.fen,
        count = input.legal_moves.len(),
        moves = input.legal_moves.join(", "),
        format = answer_format(provider, r#"{"move": "Nf3"}"#),
    )
}
