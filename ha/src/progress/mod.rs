//! Progress aggregation
//!
//! Turns the flat task rows of one position into the phase/step view used by
//! checklists, status replies and the chat assistant.

mod aggregate;

pub use aggregate::{AggregatedProgress, PhaseView, ProcedureInfo, Progress, StepView, aggregate, percentage};

#[cfg(test)]
pub(crate) use aggregate::tests as tests_support;
