pub mod indicators;
pub mod services;

pub use indicators::IndicatorSet;
pub use services::signal_evaluator::{Evaluation, SignalEvaluator, SignalScore};
pub use services::trade_planner::TradePlanner;
