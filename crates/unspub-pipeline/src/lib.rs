//! Publish pipeline for UNS payloads.
//!
//! Each item flows through classify, validate, serialize and send. A
//! rejected or failed item is reported and skipped; it never aborts the
//! cycle. [`Publisher::run`] repeats cycles on a timer until cancelled or
//! until the transport loses its broker connection.

pub mod error;
pub mod publisher;
pub mod report;
pub mod source;

pub use error::{PipelineError, Result};
pub use publisher::{Publisher, REPORT_TARGET};
pub use report::{CycleSummary, PublishOutcome, PublishReport, PublishStage, RunSummary};
pub use source::{OutboundItem, PayloadSource};
