//! Core types: project names, summaries, tracing

pub mod project;
pub mod tracing;

pub use project::{ProjectName, ProjectNameError, ProjectSummary};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
