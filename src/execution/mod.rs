// Position state, order reconciliation and the evaluation engine
pub mod engine;
pub mod position_tracker;
pub mod reconciler;

pub use engine::TradingEngine;
pub use position_tracker::{Direction, Position, PositionSide, PositionTracker};
pub use reconciler::OrderReconciler;
