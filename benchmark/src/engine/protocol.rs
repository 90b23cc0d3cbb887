//! @ai:module:intent Pure helpers for the UCI text protocol: commands out, scores and moves in
//! @ai:module:layer domain
//! @ai:module:public_api Score, parse_score, last_score, parse_best_move, is_marker, commands
//! @ai:module:stateless true

/// Magnitude of a mate-in-0 score after normalization.
pub const MATE_SCORE: i32 = 10_000;

/// Longest mate distance kept apart in normalization; longer mates score as this one.
pub const MAX_MATE_DISTANCE: u32 = 99;

pub const MAX_SKILL_LEVEL: i32 = 20;

/// @ai:intent Engine evaluation as reported on an info line, side-to-move point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

impl Score {
    /// @ai:intent Map to a single centipawn scale; mate in N becomes ±(10000 - 100·|N|)
    /// @ai:post |N| is clamped to MAX_MATE_DISTANCE, so the sign always matches the mating side
    /// @ai:effects pure
    pub fn normalized(&self) -> i32 {
        match *self {
            Score::Centipawns(cp) => cp,
            Score::Mate(n) => {
                let distance = n.unsigned_abs().min(MAX_MATE_DISTANCE) as i32;
                let magnitude = MATE_SCORE - 100 * distance;
                if n > 0 {
                    magnitude
                } else {
                    -magnitude
                }
            }
        }
    }
}

/// @ai:intent Score carried by one `info` line, if any
/// @ai:effects pure
pub fn parse_score(line: &str) -> Option<Score> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return None;
    }

    while let Some(token) = tokens.next() {
        if token != "score" {
            continue;
        }
        return match (tokens.next(), tokens.next().and_then(|v| v.parse::<i32>().ok())) {
            (Some("cp"), Some(value)) => Some(Score::Centipawns(value)),
            (Some("mate"), Some(value)) => Some(Score::Mate(value)),
            _ => None,
        };
    }
    None
}

/// @ai:intent Score of the deepest (last) info line in a search transcript
/// @ai:effects pure
pub fn last_score<S: AsRef<str>>(lines: &[S]) -> Option<Score> {
    lines.iter().rev().find_map(|line| parse_score(line.as_ref()))
}

/// @ai:intent Move token following `bestmove`; `(none)` and `0000` mean no move
/// @ai:effects pure
pub fn parse_best_move(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("bestmove") {
        return None;
    }
    tokens
        .next()
        .filter(|mv| *mv != "(none)" && *mv != "0000")
        .map(str::to_string)
}

/// @ai:effects pure
pub fn is_marker(line: &str, marker: &str) -> bool {
    line.trim_start().starts_with(marker)
}

/// @ai:effects pure
pub fn clamp_skill_level(level: i32) -> i32 {
    level.clamp(0, MAX_SKILL_LEVEL)
}

pub mod commands {
    use std::time::Duration;

    pub const UCI: &str = "uci";
    pub const UCI_OK: &str = "uciok";
    pub const IS_READY: &str = "isready";
    pub const READY_OK: &str = "readyok";
    pub const BEST_MOVE: &str = "bestmove";
    pub const QUIT: &str = "quit";

    pub fn position(fen: &str) -> String {
        format!("position fen {fen}")
    }

    pub fn go_movetime(movetime: Duration) -> String {
        format!("go movetime {}", movetime.as_millis())
    }

    pub fn go_depth(depth: u32) -> String {
        format!("go depth {depth}")
    }

    pub fn skill_level(level: i32) -> String {
        format!("setoption name Skill Level value {level}")
    }
}
