//! sovereign — autonomous repository evolution engine (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod cancel;
pub mod classify;
pub mod cli;
pub mod codec;
pub mod config;
pub mod constants;
pub mod env;
pub mod gateway;
pub mod guardrail;
pub mod health;
pub mod host;
pub mod journal;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod queue;
pub mod store;
