//! Observability
//!
//! Structured audit events for supervised runs.

pub mod audit;
