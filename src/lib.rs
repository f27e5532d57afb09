//! reviewloom: multi-stage AI pull request review (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod aggregator;
pub mod config;
pub mod constants;
pub mod diff;
pub mod env;
pub mod limiter;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod providers;
pub mod reputation;
pub mod service;
pub mod stages;
pub mod store;
pub mod tools;
