//! @ai:module:intent External chess engine driver (UCI over stdin/stdout)
//! @ai:module:layer infrastructure
//! @ai:module:public_api EngineSession, EngineCommand, EngineTimeouts, Evaluation, Score

pub mod protocol;
pub mod session;

pub use protocol::Score;
pub use session::{EngineCommand, EngineSession, EngineTimeouts, Evaluation, SessionState};
