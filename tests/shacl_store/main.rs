//! Integration tests for the validating store
//!
//! Exercises the public API end to end:
//! - scenarios: the canonical shape/data cases
//! - approaches: bulk, incremental and tuning choices give the same report
//! - concurrency: serializable escalation and lock fail-fast
//! - config: `shacl.toml` loading
//! - reports: report rendering and result limits

mod common;

mod approaches;
mod concurrency;
mod config;
mod reports;
mod scenarios;
