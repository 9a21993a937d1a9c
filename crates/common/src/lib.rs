pub mod actors;
pub mod config;
pub mod errors;
pub mod logger;
pub mod models;
