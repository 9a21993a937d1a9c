pub mod advisor;
pub mod control_service;
pub mod scan_cycle;
pub mod scan_orchestrator;
pub mod telegram_service;
pub mod trade_simulator;
