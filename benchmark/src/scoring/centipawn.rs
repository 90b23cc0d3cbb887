//! @ai:module:intent Centipawn-loss classification and average centipawn loss
//! @ai:module:layer domain
//! @ai:module:public_api MoveClass, classify, centipawn_loss, acpl, LossTally
//! @ai:module:stateless true

use serde::{Deserialize, Serialize};

pub const BLUNDER_THRESHOLD: i32 = 100;
pub const MISTAKE_THRESHOLD: i32 = 50;
pub const INACCURACY_THRESHOLD: i32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveClass {
    Blunder,
    Mistake,
    Inaccuracy,
}

/// @ai:intent Classify a loss; None for losses of 25cp or less
/// @ai:effects pure
pub fn classify(loss: i32) -> Option<MoveClass> {
    if loss > BLUNDER_THRESHOLD {
        Some(MoveClass::Blunder)
    } else if loss > MISTAKE_THRESHOLD {
        Some(MoveClass::Mistake)
    } else if loss > INACCURACY_THRESHOLD {
        Some(MoveClass::Inaccuracy)
    } else {
        None
    }
}

/// @ai:intent Evaluation drop caused by a move, both scores from the mover's point of view
/// @ai:post never negative
/// @ai:effects pure
pub fn centipawn_loss(before: i32, after: i32) -> i32 {
    (before - after).max(0)
}

/// @ai:intent Mean loss over scored moves; None when nothing was scored
/// @ai:effects pure
pub fn acpl(losses: &[i32]) -> Option<f64> {
    if losses.is_empty() {
        return None;
    }
    let total: i64 = losses.iter().map(|l| *l as i64).sum();
    Some(total as f64 / losses.len() as f64)
}

/// @ai:intent Running loss counters for one game or one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossTally {
    pub total_loss: i64,
    pub scored_moves: u32,
    pub blunders: u32,
    pub mistakes: u32,
    pub inaccuracies: u32,
}

impl LossTally {
    /// @ai:intent Count one scored move and return its class
    /// @ai:effects state:write
    pub fn record(&mut self, loss: i32) -> Option<MoveClass> {
        self.total_loss += loss as i64;
        self.scored_moves += 1;

        let class = classify(loss);
        match class {
            Some(MoveClass::Blunder) => self.blunders += 1,
            Some(MoveClass::Mistake) => self.mistakes += 1,
            Some(MoveClass::Inaccuracy) => self.inaccuracies += 1,
            None => {}
        }
        class
    }

    pub fn merge(&mut self, other: &LossTally) {
        self.total_loss += other.total_loss;
        self.scored_moves += other.scored_moves;
        self.blunders += other.blunders;
        self.mistakes += other.mistakes;
        self.inaccuracies += other.inaccuracies;
    }

    /// @ai:effects pure
    pub fn acpl(&self) -> Option<f64> {
        (self.scored_moves > 0).then(|| self.total_loss as f64 / self.scored_moves as f64)
    }
}
