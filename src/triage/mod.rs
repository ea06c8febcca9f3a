//! Finding aggregation and presentation triage

pub mod aggregate;
pub mod prioritize;

pub use aggregate::{aggregate, Aggregated};
pub use prioritize::{triage, Triaged, DEFAULT_MAX_FINDINGS};
