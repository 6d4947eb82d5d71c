//! Incident Ledger — watches a folder of incident-report emails and turns
//! each one into a validated, styled row of an xlsx table.

pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod store;
pub mod watcher;
