pub mod adb;
pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod state;
pub mod workflow;

#[cfg(test)]
pub mod test_support;
