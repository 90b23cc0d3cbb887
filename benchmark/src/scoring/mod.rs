//! @ai:module:intent Pure scoring functions: legal-move F1, answer extraction, centipawn loss
//! @ai:module:layer domain
//! @ai:module:public_api LegalMoveScore, score_legal_moves, extract_move, extract_move_list, classify, LossTally
//! @ai:module:stateless true

pub mod answer;
pub mod centipawn;
pub mod legal_moves;

pub use answer::{extract_move, extract_move_list, same_san, Extracted, ExtractionStep};
pub use centipawn::{acpl, centipawn_loss, classify, LossTally, MoveClass};
pub use legal_moves::{score_legal_moves, LegalMoveScore};
