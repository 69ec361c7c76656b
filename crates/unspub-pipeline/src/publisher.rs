use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use unspub_schema::{validate, Advisory, SchemaRegistry, ValidationOutcome};
use unspub_topic::{classify, Topic};
use unspub_transport::Transport;

use crate::error::{PipelineError, Result};
use crate::report::{CycleSummary, PublishOutcome, PublishReport, PublishStage, RunSummary};
use crate::source::PayloadSource;

/// Log target for per-item publish results.
pub const REPORT_TARGET: &str = "unspub::publish";

type ReportHook = Box<dyn Fn(&PublishReport) + Send + Sync>;

/// Loaded schemas and an open transport, owned for the lifetime of a run.
pub struct Publisher<T> {
    registry: Arc<SchemaRegistry>,
    transport: T,
    on_report: Option<ReportHook>,
}

impl<T: Transport> Publisher<T> {
    pub fn new(registry: Arc<SchemaRegistry>, transport: T) -> Self {
        Self {
            registry,
            transport,
            on_report: None,
        }
    }

    /// Call `hook` with every report, after it has been logged.
    pub fn on_report(mut self, hook: impl Fn(&PublishReport) + Send + Sync + 'static) -> Self {
        self.on_report = Some(Box::new(hook));
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give the transport back so it can be shut down.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Classify, validate, serialize and send one payload.
    pub async fn publish(&self, topic: &Topic, payload: &Value) -> PublishReport {
        let classification = classify(topic, payload);
        let outcome = match validate(payload, classification, &self.registry) {
            ValidationOutcome::Rejected(rejection) => PublishOutcome::Rejected(rejection),
            ValidationOutcome::Accepted => self.transmit(topic, payload, None).await,
            ValidationOutcome::Advisory(advisory) => {
                self.transmit(topic, payload, Some(advisory)).await
            }
        };

        let report = PublishReport {
            topic: topic.clone(),
            classification,
            outcome,
        };
        log_report(&report);
        if let Some(hook) = &self.on_report {
            hook(&report);
        }
        report
    }

    async fn transmit(
        &self,
        topic: &Topic,
        payload: &Value,
        advisory: Option<Advisory>,
    ) -> PublishOutcome {
        let body = match serde_json::to_vec_pretty(payload) {
            Ok(body) => body,
            Err(err) => {
                return PublishOutcome::Failed {
                    stage: PublishStage::Serializing,
                    reason: err.to_string(),
                }
            }
        };
        debug!(
            topic = %topic,
            payload = %String::from_utf8_lossy(&body),
            "sending payload"
        );

        let bytes = body.len();
        match self.transport.send(topic.as_str(), Bytes::from(body)).await {
            Ok(()) => PublishOutcome::Delivered { advisory, bytes },
            Err(err) => PublishOutcome::Failed {
                stage: PublishStage::Sending,
                reason: err.to_string(),
            },
        }
    }

    /// Publish every item of the source's next cycle, in order.
    pub async fn run_cycle<S: PayloadSource>(&self, source: &mut S) -> CycleSummary {
        let mut summary = CycleSummary::default();
        for item in source.next_cycle() {
            let report = self.publish(&item.topic, &item.payload).await;
            summary.record(&report);
        }
        summary
    }

    /// Run cycles every `interval` until `cancel` fires or the transport is lost.
    ///
    /// The first cycle starts immediately. Cancellation also interrupts a
    /// cycle in progress.
    pub async fn run<S: PayloadSource>(
        &self,
        source: &mut S,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        if interval.is_zero() {
            return Err(PipelineError::InvalidInterval(interval));
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut run = RunSummary::default();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                lost = self.transport.closed() => {
                    error!(error = %lost, cycles = run.cycles, "broker connection lost");
                    return Err(PipelineError::ConnectionLost(lost));
                }
                _ = ticker.tick() => {}
            }

            let summary = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                summary = self.run_cycle(source) => summary,
            };

            run.cycles += 1;
            run.totals.merge(&summary);
            info!(
                cycle = run.cycles,
                delivered = summary.delivered,
                advisory = summary.advisory,
                rejected = summary.rejected,
                failed = summary.failed,
                "publish cycle complete"
            );
        }

        info!(
            cycles = run.cycles,
            delivered = run.totals.delivered,
            "publish loop cancelled"
        );
        Ok(run)
    }
}

fn log_report(report: &PublishReport) {
    let topic = report.topic.as_str();
    let schema = report.classification;
    match &report.outcome {
        PublishOutcome::Delivered {
            advisory: None,
            bytes,
        } => info!(target: REPORT_TARGET, topic, %schema, bytes, "payload published"),
        PublishOutcome::Delivered {
            advisory: Some(advisory),
            bytes,
        } => warn!(
            target: REPORT_TARGET,
            topic,
            %schema,
            bytes,
            advisory = %advisory,
            "payload published without validation"
        ),
        PublishOutcome::Rejected(rejection) => warn!(
            target: REPORT_TARGET,
            topic,
            %schema,
            path = %rejection.path,
            expected = ?rejection.expected,
            reason = %rejection.message,
            "payload rejected"
        ),
        PublishOutcome::Failed { stage, reason } => error!(
            target: REPORT_TARGET,
            topic,
            %schema,
            %stage,
            error = %reason,
            "payload publish failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;
    use unspub_schema::{Classification, SchemaName};
    use unspub_transport::TransportError;

    use super::*;
    use crate::source::OutboundItem;

    const BASE: &str = "abelara/plant1/utilities/water-system/pump-station/pump-101";

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, Bytes)>>,
        failing_topics: HashSet<String>,
        lost: CancellationToken,
    }

    impl RecordingTransport {
        fn failing_on(topic: &str) -> Self {
            Self {
                failing_topics: HashSet::from([topic.to_string()]),
                ..Self::default()
            }
        }

        fn sent_topics(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(topic, _)| topic.clone())
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        async fn send(&self, topic: &str, payload: Bytes) -> unspub_transport::Result<()> {
            if self.failing_topics.contains(topic) {
                return Err(TransportError::Shutdown);
            }
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }

        async fn closed(&self) -> TransportError {
            self.lost.cancelled().await;
            TransportError::ConnectionLost("broker went away".to_string())
        }
    }

    /// Counts cycles and cancels after `stop_after` of them.
    struct CountingSource {
        items: Vec<OutboundItem>,
        cycles: AtomicUsize,
        stop_after: usize,
        cancel: CancellationToken,
    }

    impl PayloadSource for CountingSource {
        fn next_cycle(&mut self) -> Vec<OutboundItem> {
            let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
            if cycle >= self.stop_after {
                self.cancel.cancel();
            }
            self.items.clone()
        }
    }

    fn shipped_registry() -> Arc<SchemaRegistry> {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../schemas");
        Arc::new(SchemaRegistry::load(&root))
    }

    fn topic(suffix: &str) -> Topic {
        Topic::parse(&format!("{BASE}/{suffix}")).unwrap()
    }

    fn bearing_temperature() -> Value {
        json!({
            "timestamp": "2024-05-01T10:00:00Z",
            "type": { "id": 101, "name": "Bearing Temperature" },
            "value": 72.4,
            "unit": "°C",
            "target": 70.0,
            "tolerance": 5.0,
            "inTolerance": true,
            "metadata": {
                "source": "pump-101",
                "uri": format!("{BASE}/measurement/bearing-temperature"),
                "asset": { "id": 101, "name": "Pump-101" }
            }
        })
    }

    #[tokio::test]
    async fn missing_unit_is_rejected_and_not_sent() {
        let publisher = Publisher::new(shipped_registry(), RecordingTransport::default());
        let mut payload = bearing_temperature();
        payload.as_object_mut().unwrap().remove("unit");

        let report = publisher
            .publish(&topic("measurement/bearing-temperature"), &payload)
            .await;

        assert!(!report.delivered());
        assert_eq!(
            report.classification,
            Classification::Resolved(SchemaName::Measurement)
        );
        match &report.outcome {
            PublishOutcome::Rejected(rejection) => {
                assert!(rejection.message.contains("unit"), "{}", rejection.message);
                assert!(rejection.path.is_root());
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(publisher.transport().sent_topics().is_empty());
    }

    #[tokio::test]
    async fn plural_and_suffixed_entity_topics_are_validated() {
        let publisher = Publisher::new(shipped_registry(), RecordingTransport::default());
        let payload = json!({ "garbage": true });

        for (suffix, schema) in [
            ("alerts", SchemaName::Alert),
            ("asset-info", SchemaName::Asset),
            ("states/current", SchemaName::State),
        ] {
            let report = publisher.publish(&topic(suffix), &payload).await;
            assert_eq!(report.classification, Classification::Resolved(schema), "{suffix}");
            assert!(
                matches!(report.outcome, PublishOutcome::Rejected(_)),
                "{suffix}: {:?}",
                report.outcome
            );
        }
        assert!(publisher.transport().sent_topics().is_empty());
    }

    #[tokio::test]
    async fn report_hook_sees_every_item_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let publisher = Publisher::new(shipped_registry(), RecordingTransport::default())
            .on_report(move |report| sink.lock().unwrap().push(report.to_string()));

        let mut incomplete = bearing_temperature();
        incomplete.as_object_mut().unwrap().remove("unit");
        let mut items = vec![
            OutboundItem::new(topic("measurement/bearing-temperature"), bearing_temperature()),
            OutboundItem::new(topic("measurement/bearing-temperature"), incomplete),
        ];
        publisher.run_cycle(&mut items).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("published "), "{}", seen[0]);
        assert!(seen[1].starts_with("rejected "), "{}", seen[1]);
    }

    #[tokio::test]
    async fn complete_payload_is_sent_as_pretty_json() {
        let publisher = Publisher::new(shipped_registry(), RecordingTransport::default());
        let payload = bearing_temperature();

        let report = publisher
            .publish(&topic("measurement/bearing-temperature"), &payload)
            .await;

        assert!(report.delivered());
        assert_eq!(report.advisory(), None);
        let sent = publisher.transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, format!("{BASE}/measurement/bearing-temperature"));
        let body = std::str::from_utf8(&sent[0].1).unwrap();
        assert!(body.contains("\n  \"unit\""), "{body}");
        let decoded: Value = serde_json::from_str(body).unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn absent_schema_is_sent_with_advisory() {
        let publisher = Publisher::new(
            Arc::new(SchemaRegistry::new()),
            RecordingTransport::default(),
        );
        let mut payload = bearing_temperature();
        payload.as_object_mut().unwrap().remove("unit");

        let report = publisher
            .publish(&topic("measurement/bearing-temperature"), &payload)
            .await;

        assert!(report.delivered());
        assert_eq!(
            report.advisory(),
            Some(Advisory::SchemaNotLoaded(SchemaName::Measurement))
        );
        assert_eq!(publisher.transport().sent_topics().len(), 1);
    }

    #[tokio::test]
    async fn unclassifiable_payload_is_sent_with_advisory() {
        let publisher = Publisher::new(shipped_registry(), RecordingTransport::default());
        let report = publisher
            .publish(&topic("misc"), &json!({ "foo": 1 }))
            .await;

        assert_eq!(report.classification, Classification::Unknown);
        assert_eq!(report.advisory(), Some(Advisory::SchemaIndeterminate));
        assert!(report.delivered());
    }

    #[tokio::test]
    async fn transport_failure_does_not_stop_the_cycle() {
        let failing = format!("{BASE}/measurement/bearing-temperature");
        let publisher = Publisher::new(
            shipped_registry(),
            RecordingTransport::failing_on(&failing),
        );

        let mut rejected = bearing_temperature();
        rejected.as_object_mut().unwrap().remove("metadata");
        let mut source = vec![
            OutboundItem::new(topic("measurement/bearing-temperature"), bearing_temperature()),
            OutboundItem::new(topic("measurement/discharge-pressure"), rejected),
            OutboundItem::new(topic("misc"), json!({ "note": "free-form" })),
            OutboundItem::new(topic("measurement/motor-current"), bearing_temperature()),
        ];

        let summary = publisher.run_cycle(&mut source).await;

        assert_eq!(
            summary,
            CycleSummary {
                delivered: 2,
                advisory: 1,
                rejected: 1,
                failed: 1,
            }
        );
        assert_eq!(
            publisher.transport().sent_topics(),
            vec![
                format!("{BASE}/misc"),
                format!("{BASE}/measurement/motor-current"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_repeats_cycles_until_cancelled() {
        let publisher = Publisher::new(shipped_registry(), RecordingTransport::default());
        let cancel = CancellationToken::new();
        let mut source = CountingSource {
            items: vec![OutboundItem::new(
                topic("measurement/bearing-temperature"),
                bearing_temperature(),
            )],
            cycles: AtomicUsize::new(0),
            stop_after: 3,
            cancel: cancel.clone(),
        };

        let run = publisher
            .run(&mut source, Duration::from_secs(5), cancel)
            .await
            .unwrap();

        assert_eq!(run.cycles, 3);
        assert_eq!(run.totals.delivered, 3);
        assert_eq!(source.cycles.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_connection_ends_the_run() {
        let transport = RecordingTransport::default();
        transport.lost.cancel();
        let publisher = Publisher::new(shipped_registry(), transport);
        let mut source: Vec<OutboundItem> = Vec::new();

        let result = publisher
            .run(&mut source, Duration::from_secs(5), CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::ConnectionLost(TransportError::ConnectionLost(_)))
        ));
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let publisher = Publisher::new(shipped_registry(), RecordingTransport::default());
        let mut source: Vec<OutboundItem> = Vec::new();
        let result = publisher
            .run(&mut source, Duration::ZERO, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(PipelineError::InvalidInterval(_))));
    }
}
