//! @ai:module:intent F1 scoring of a predicted legal-move list against the true legal-move set
//! @ai:module:layer domain
//! @ai:module:public_api LegalMoveScore, score_legal_moves
//! @ai:module:stateless true

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// @ai:intent Partition of a prediction into correct / illegal / missed moves
/// @ai:invariant accuracy, penalty and final score are derived from the partition, never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMoveScore {
    /// Predicted moves that are legal, in predicted order (duplicates kept).
    pub correct: Vec<String>,
    /// Predicted moves that are not legal, in predicted order.
    pub illegal: Vec<String>,
    /// Legal moves never predicted, in legal-list order.
    pub missed: Vec<String>,
    pub legal_count: usize,
    pub predicted_count: usize,
}

impl LegalMoveScore {
    /// @ai:intent Percentage of the legal set that was found (0 when there are no legal moves)
    /// @ai:effects pure
    pub fn recall(&self) -> f64 {
        percentage(self.correct.len(), self.legal_count)
    }

    /// @ai:intent Percentage of the prediction that was legal (0 for an empty prediction)
    /// @ai:effects pure
    pub fn precision(&self) -> f64 {
        percentage(self.correct.len(), self.predicted_count)
    }

    /// @ai:effects pure
    pub fn accuracy(&self) -> f64 {
        self.recall()
    }

    /// @ai:effects pure
    pub fn penalty(&self) -> f64 {
        100.0 - self.precision()
    }

    /// @ai:intent Harmonic mean of precision and recall
    /// @ai:effects pure
    pub fn final_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// @ai:intent Score a prediction; moves compare as exact strings after trimming
/// @ai:effects pure
pub fn score_legal_moves<L, P>(legal: &[L], predicted: &[P]) -> LegalMoveScore
where
    L: AsRef<str>,
    P: AsRef<str>,
{
    let legal: Vec<&str> = legal.iter().map(|m| m.as_ref().trim()).collect();
    let predicted: Vec<&str> = predicted.iter().map(|m| m.as_ref().trim()).collect();

    let legal_set: HashSet<&str> = legal.iter().copied().collect();
    let predicted_set: HashSet<&str> = predicted.iter().copied().collect();

    let (correct, illegal): (Vec<&str>, Vec<&str>) =
        predicted.iter().copied().partition(|m| legal_set.contains(m));

    let missed = legal
        .iter()
        .filter(|m| !predicted_set.contains(*m))
        .map(|m| m.to_string())
        .collect();

    LegalMoveScore {
        correct: correct.into_iter().map(str::to_string).collect(),
        illegal: illegal.into_iter().map(str::to_string).collect(),
        missed,
        legal_count: legal.len(),
        predicted_count: predicted.len(),
    }
}
