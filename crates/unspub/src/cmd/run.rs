use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use unspub::fixture::{FixtureSource, Profile};
use unspub_pipeline::{PublishOutcome, PublishReport, Publisher, RunSummary};
use unspub_schema::SchemaRegistry;
use unspub_topic::TopicPrefix;
use unspub_transport::{BrokerConfig, ClientAuth, Credentials, MqttTransport, QosLevel, TlsMode};

use crate::cmd::{BrokerArgs, RunArgs, TopicArgs};
use crate::exit::{
    io_error, pipeline_error, transport_error, CliError, CliResult, SUCCESS, USAGE,
};
use crate::output::{print_json, table, OutputFormat, SCHEMA_ID_BASE};

#[derive(Serialize)]
struct RunBanner {
    schema_id: String,
    broker: String,
    client_id: String,
    profile: &'static str,
    assets: Vec<&'static str>,
    topics_per_cycle: usize,
    interval_ms: u128,
    simulation: bool,
    auth: bool,
    tls: &'static str,
    schemas_loaded: Vec<String>,
    schemas_missing: Vec<String>,
}

#[derive(Serialize)]
struct PublishLine {
    schema_id: String,
    topic: String,
    schema: String,
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct RunReport {
    schema_id: String,
    cycles: u64,
    delivered: usize,
    advisory: usize,
    rejected: usize,
    failed: usize,
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let broker = broker_config(&args.broker)?;
    let prefix = topic_prefix(&args.topic, args.profile);

    let registry = Arc::new(SchemaRegistry::load(&args.schema_dir));
    let source = FixtureSource::new(args.profile, &prefix, args.simulation)
        .map_err(|err| CliError::new(USAGE, format!("invalid topic prefix: {err}")))?;

    let banner = RunBanner {
        schema_id: format!("{SCHEMA_ID_BASE}/run-started.schema.json"),
        broker: broker.address(),
        client_id: broker.client_id.clone(),
        profile: args.profile.as_str(),
        assets: source.asset_names(),
        topics_per_cycle: source.topics().count(),
        interval_ms: interval.as_millis(),
        simulation: args.simulation,
        auth: broker.credentials.is_some(),
        tls: tls_label(&broker.tls),
        schemas_loaded: registry.names().iter().map(ToString::to_string).collect(),
        schemas_missing: registry.missing().keys().map(ToString::to_string).collect(),
    };
    print_banner(&banner, format);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start async runtime", err))?;
    let summary = runtime.block_on(publish_until_stopped(
        broker, registry, source, interval, format,
    ))?;

    print_report(
        &RunReport {
            schema_id: format!("{SCHEMA_ID_BASE}/run-finished.schema.json"),
            cycles: summary.cycles,
            delivered: summary.totals.delivered,
            advisory: summary.totals.advisory,
            rejected: summary.totals.rejected,
            failed: summary.totals.failed,
        },
        format,
    );
    Ok(SUCCESS)
}

async fn publish_until_stopped(
    broker: BrokerConfig,
    registry: Arc<SchemaRegistry>,
    mut source: FixtureSource,
    interval: Duration,
    format: OutputFormat,
) -> CliResult<RunSummary> {
    let transport = MqttTransport::connect(&broker)
        .await
        .map_err(|err| transport_error("connect failed", err))?;

    let cancel = CancellationToken::new();
    tokio::spawn(stop_on_interrupt(cancel.clone()));

    let publisher = Publisher::new(registry, transport)
        .on_report(move |report| print_publish(report, format));
    let result = publisher.run(&mut source, interval, cancel.clone()).await;
    cancel.cancel();
    publisher.into_transport().shutdown().await;

    result.map_err(pipeline_error)
}

async fn stop_on_interrupt(cancel: CancellationToken) {
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("interrupt received, stopping"),
                Err(err) => warn!(error = %err, "failed to listen for interrupt"),
            }
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}

fn broker_config(args: &BrokerArgs) -> CliResult<BrokerConfig> {
    let mut config = BrokerConfig::new(&args.client_id, &args.host, args.port);
    config.keep_alive = Duration::from_secs(args.keepalive);
    config.qos =
        QosLevel::try_from(args.qos).map_err(|err| CliError::new(USAGE, err.to_string()))?;
    config.connect_timeout = parse_duration(&args.connect_timeout)?;
    config.credentials = credentials(args);
    config.tls = tls_mode(args);
    Ok(config)
}

fn credentials(args: &BrokerArgs) -> Option<Credentials> {
    if !args.use_auth {
        return None;
    }
    if args.username.is_empty() || args.password.is_empty() {
        warn!("authentication enabled but username or password is empty, connecting anonymously");
        return None;
    }
    Some(Credentials {
        username: args.username.clone(),
        password: args.password.clone(),
    })
}

fn tls_mode(args: &BrokerArgs) -> TlsMode {
    if !args.tls {
        return TlsMode::Disabled;
    }
    let Some(ca_cert) = args.ca_cert.clone() else {
        warn!("TLS enabled without a CA certificate, the broker certificate will not be verified");
        return TlsMode::Insecure;
    };
    let client_auth = match (&args.client_cert, &args.client_key) {
        (Some(cert), Some(key)) => Some(ClientAuth {
            cert: cert.clone(),
            key: key.clone(),
        }),
        (None, None) => None,
        _ => {
            warn!("client certificate and key must be given together, skipping client authentication");
            None
        }
    };
    TlsMode::Verified {
        ca_cert,
        client_auth,
    }
}

fn topic_prefix(args: &TopicArgs, profile: Profile) -> TopicPrefix {
    TopicPrefix {
        enterprise: args.enterprise.clone(),
        site: args.site.clone(),
        area: args.area.clone(),
        line: args.line.clone(),
        cell: args
            .cell
            .clone()
            .unwrap_or_else(|| profile.default_cell().to_string()),
    }
}

fn tls_label(mode: &TlsMode) -> &'static str {
    match mode {
        TlsMode::Disabled => "disabled",
        TlsMode::Verified {
            client_auth: Some(_),
            ..
        } => "verified+client-auth",
        TlsMode::Verified { .. } => "verified",
        TlsMode::Insecure => "insecure",
    }
}

fn print_banner(banner: &RunBanner, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(banner),
        OutputFormat::Table => {
            let mut t = table(vec!["SETTING", "VALUE"]);
            t.add_row(vec!["broker".to_string(), banner.broker.clone()])
                .add_row(vec!["client id".to_string(), banner.client_id.clone()])
                .add_row(vec!["profile".to_string(), banner.profile.to_string()])
                .add_row(vec!["assets".to_string(), banner.assets.join(", ")])
                .add_row(vec![
                    "topics per cycle".to_string(),
                    banner.topics_per_cycle.to_string(),
                ])
                .add_row(vec![
                    "interval".to_string(),
                    format!("{} ms", banner.interval_ms),
                ])
                .add_row(vec!["simulation".to_string(), banner.simulation.to_string()])
                .add_row(vec!["auth".to_string(), banner.auth.to_string()])
                .add_row(vec!["tls".to_string(), banner.tls.to_string()])
                .add_row(vec![
                    "schemas loaded".to_string(),
                    banner.schemas_loaded.join(", "),
                ])
                .add_row(vec![
                    "schemas missing".to_string(),
                    banner.schemas_missing.join(", "),
                ]);
            println!("{t}");
        }
        OutputFormat::Pretty => {
            println!(
                "publishing {} profile to {} as {}",
                banner.profile, banner.broker, banner.client_id
            );
            println!("  assets:     {}", banner.assets.join(", "));
            println!(
                "  cycle:      {} topics every {} ms (simulation {})",
                banner.topics_per_cycle, banner.interval_ms, banner.simulation
            );
            println!("  security:   auth={} tls={}", banner.auth, banner.tls);
            println!(
                "  schemas:    {} loaded, {} missing",
                banner.schemas_loaded.len(),
                banner.schemas_missing.len()
            );
        }
    }
}

fn publish_line(report: &PublishReport) -> PublishLine {
    let (result, detail) = match &report.outcome {
        PublishOutcome::Delivered { advisory: None, .. } => ("delivered", None),
        PublishOutcome::Delivered {
            advisory: Some(advisory),
            ..
        } => ("advisory", Some(advisory.to_string())),
        PublishOutcome::Rejected(rejection) => ("rejected", Some(rejection.to_string())),
        PublishOutcome::Failed { stage, reason } => {
            ("failed", Some(format!("{stage}: {reason}")))
        }
    };
    PublishLine {
        schema_id: format!("{SCHEMA_ID_BASE}/publish-result.schema.json"),
        topic: report.topic.to_string(),
        schema: report.classification.to_string(),
        result,
        detail,
    }
}

fn print_publish(report: &PublishReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&publish_line(report)),
        OutputFormat::Table | OutputFormat::Pretty => println!("{report}"),
    }
}

fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "stopped after {} cycles: {} delivered ({} unvalidated), {} rejected, {} failed",
            report.cycles, report.delivered, report.advisory, report.rejected, report.failed
        ),
    }
}

/// Parse `5`, `5s` or `500ms`.
fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
