//! Process setup: environment configuration and logging.
pub mod config;
pub mod logging;
