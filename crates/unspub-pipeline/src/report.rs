use std::fmt;

use unspub_schema::{Advisory, Classification, Rejection};
use unspub_topic::Topic;

/// Stage at which a publish attempt failed after passing validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Serializing,
    Sending,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStage::Serializing => f.write_str("serializing"),
            PublishStage::Sending => f.write_str("sending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Handed to the transport. `advisory` is set when no schema check ran.
    Delivered {
        advisory: Option<Advisory>,
        bytes: usize,
    },
    /// Blocked by the validation gate; nothing was sent.
    Rejected(Rejection),
    Failed { stage: PublishStage, reason: String },
}

/// Result of publishing one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    pub topic: Topic,
    pub classification: Classification,
    pub outcome: PublishOutcome,
}

impl PublishReport {
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Delivered { .. })
    }

    pub fn advisory(&self) -> Option<Advisory> {
        match &self.outcome {
            PublishOutcome::Delivered { advisory, .. } => *advisory,
            _ => None,
        }
    }
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PublishOutcome::Delivered {
                advisory: None,
                bytes,
            } => write!(
                f,
                "published {} ({}, {bytes} bytes)",
                self.topic, self.classification
            ),
            PublishOutcome::Delivered {
                advisory: Some(advisory),
                bytes,
            } => write!(f, "published {} ({bytes} bytes): {advisory}", self.topic),
            PublishOutcome::Rejected(rejection) => {
                write!(f, "rejected {}: {rejection}", self.topic)
            }
            PublishOutcome::Failed { stage, reason } => {
                write!(f, "failed {} while {stage}: {reason}", self.topic)
            }
        }
    }
}

/// Counts for one cycle. `advisory` is a subset of `delivered`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub delivered: usize,
    pub advisory: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl CycleSummary {
    pub fn record(&mut self, report: &PublishReport) {
        match &report.outcome {
            PublishOutcome::Delivered { advisory, .. } => {
                self.delivered += 1;
                if advisory.is_some() {
                    self.advisory += 1;
                }
            }
            PublishOutcome::Rejected(_) => self.rejected += 1,
            PublishOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.delivered + self.rejected + self.failed
    }

    pub fn merge(&mut self, other: &CycleSummary) {
        self.delivered += other.delivered;
        self.advisory += other.advisory;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} delivered ({} unvalidated), {} rejected, {} failed",
            self.delivered, self.advisory, self.rejected, self.failed
        )
    }
}

/// Totals across every completed cycle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub totals: CycleSummary,
}

#[cfg(test)]
mod tests {
    use unspub_schema::{InstancePath, SchemaName};

    use super::*;

    fn report(outcome: PublishOutcome) -> PublishReport {
        PublishReport {
            topic: Topic::parse("abelara/plant1/pump-101/kpi/efficiency").unwrap(),
            classification: Classification::Resolved(SchemaName::Kpi),
            outcome,
        }
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = CycleSummary::default();
        summary.record(&report(PublishOutcome::Delivered {
            advisory: None,
            bytes: 10,
        }));
        summary.record(&report(PublishOutcome::Delivered {
            advisory: Some(Advisory::SchemaIndeterminate),
            bytes: 10,
        }));
        summary.record(&report(PublishOutcome::Rejected(Rejection {
            schema: SchemaName::Kpi,
            message: "\"unit\" is a required property".to_string(),
            path: InstancePath::default(),
            expected: None,
        })));
        summary.record(&report(PublishOutcome::Failed {
            stage: PublishStage::Sending,
            reason: "channel closed".to_string(),
        }));

        assert_eq!(
            summary,
            CycleSummary {
                delivered: 2,
                advisory: 1,
                rejected: 1,
                failed: 1,
            }
        );
        assert_eq!(summary.total(), 4);
        assert_eq!(
            summary.to_string(),
            "2 delivered (1 unvalidated), 1 rejected, 1 failed"
        );
    }

    #[test]
    fn report_display_names_stage() {
        let failed = report(PublishOutcome::Failed {
            stage: PublishStage::Sending,
            reason: "channel closed".to_string(),
        });
        assert!(!failed.delivered());
        assert_eq!(
            failed.to_string(),
            "failed abelara/plant1/pump-101/kpi/efficiency while sending: channel closed"
        );
    }

    #[test]
    fn advisory_is_only_reported_for_deliveries() {
        let delivered = report(PublishOutcome::Delivered {
            advisory: Some(Advisory::SchemaNotLoaded(SchemaName::Kpi)),
            bytes: 42,
        });
        assert!(delivered.delivered());
        assert_eq!(
            delivered.advisory(),
            Some(Advisory::SchemaNotLoaded(SchemaName::Kpi))
        );
    }
}
