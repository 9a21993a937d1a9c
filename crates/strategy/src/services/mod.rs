pub mod signal_evaluator;
pub mod trade_planner;
