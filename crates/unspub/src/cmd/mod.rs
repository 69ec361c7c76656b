use std::fs;
use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Subcommand};
use serde_json::Value;
use unspub::fixture::Profile;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};
use crate::output::OutputFormat;

pub mod classify;
pub mod run;
pub mod schemas;
pub mod validate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to the broker and publish fixture payloads until interrupted.
    Run(RunArgs),
    /// Show which schema a topic and payload resolve to.
    Classify(ClassifyArgs),
    /// Classify and validate a payload without publishing it.
    Validate(ValidateArgs),
    /// List loaded and missing schemas.
    Schemas(SchemasArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Classify(args) => classify::run(args, format),
        Command::Validate(args) => validate::run(args, format),
        Command::Schemas(args) => schemas::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct BrokerArgs {
    /// Broker host name or address.
    #[arg(long, env = "MQTT_BROKER_HOST", default_value = "localhost")]
    pub host: String,
    /// Broker port.
    #[arg(long, env = "MQTT_BROKER_PORT", default_value_t = 1883)]
    pub port: u16,
    /// Username, sent only with --use-auth.
    #[arg(long, env = "MQTT_BROKER_USERNAME", default_value = "")]
    pub username: String,
    /// Password, sent only with --use-auth.
    #[arg(long, env = "MQTT_BROKER_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// Authenticate with username and password.
    #[arg(long, env = "MQTT_USE_AUTH", value_parser = BoolishValueParser::new())]
    pub use_auth: bool,
    /// MQTT client identifier.
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "uns-payload-example")]
    pub client_id: String,
    /// Keep-alive interval in seconds.
    #[arg(long, env = "MQTT_KEEPALIVE", default_value_t = 60)]
    pub keepalive: u64,
    /// Delivery QoS for published messages (0, 1 or 2).
    #[arg(long, env = "MQTT_QOS", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: u8,
    /// Connect over TLS. Without --ca-cert the broker certificate is not verified.
    #[arg(long, env = "MQTT_USE_TLS", value_parser = BoolishValueParser::new())]
    pub tls: bool,
    /// CA certificate used to verify the broker.
    #[arg(long, env = "MQTT_CA_CERT_PATH", value_name = "PATH")]
    pub ca_cert: Option<PathBuf>,
    /// Client certificate for mutual TLS.
    #[arg(long, env = "MQTT_CLIENT_CERT_PATH", value_name = "PATH")]
    pub client_cert: Option<PathBuf>,
    /// Client private key for mutual TLS.
    #[arg(long, env = "MQTT_CLIENT_KEY_PATH", value_name = "PATH")]
    pub client_key: Option<PathBuf>,
    /// Time allowed for the broker to accept the connection (e.g. 10s, 500ms).
    #[arg(long, env = "MQTT_CONNECT_TIMEOUT", default_value = "10s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct TopicArgs {
    #[arg(long, env = "MQTT_TOPIC_ENTERPRISE", default_value = "abelara")]
    pub enterprise: String,
    #[arg(long, env = "MQTT_TOPIC_SITE", default_value = "plant1")]
    pub site: String,
    #[arg(long, env = "MQTT_TOPIC_AREA", default_value = "utilities")]
    pub area: String,
    #[arg(long, env = "MQTT_TOPIC_LINE", default_value = "water-system")]
    pub line: String,
    /// Cell segment. Defaults to the profile's cell.
    #[arg(long, env = "MQTT_TOPIC_CELL")]
    pub cell: Option<String>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,
    #[command(flatten)]
    pub topic: TopicArgs,
    /// Demo site to simulate.
    #[arg(long, env = "UNS_PROFILE", value_enum, ignore_case = true, default_value = "pump")]
    pub profile: Profile,
    /// Time between publish cycles (e.g. 5, 5s, 500ms).
    #[arg(long, env = "PUBLISH_INTERVAL", default_value = "5")]
    pub interval: String,
    /// Apply ±3 % jitter to fixture values.
    #[arg(
        long,
        env = "SIMULATION_MODE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub simulation: bool,
    /// Schema store root.
    #[arg(long, env = "UNS_SCHEMA_DIR", default_value = "schemas", value_name = "DIR")]
    pub schema_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Topic the payload would be published on.
    pub topic: String,
    /// Payload as inline JSON.
    #[arg(long, conflicts_with = "file")]
    pub json: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Topic the payload would be published on.
    pub topic: String,
    /// Payload as inline JSON.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub json: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
    /// Schema store root.
    #[arg(long, env = "UNS_SCHEMA_DIR", default_value = "schemas", value_name = "DIR")]
    pub schema_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct SchemasArgs {
    /// Schema store root.
    #[arg(long, env = "UNS_SCHEMA_DIR", default_value = "schemas", value_name = "DIR")]
    pub schema_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `--json` or `--file`; an empty object when neither is given.
pub fn load_payload(json: Option<&str>, file: Option<&Path>) -> CliResult<Value> {
    let (text, origin) = match (json, file) {
        (Some(json), _) => (json.to_string(), "--json".to_string()),
        (None, Some(path)) => {
            let text = fs::read_to_string(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
            (text, path.display().to_string())
        }
        (None, None) => return Ok(Value::Object(Default::default())),
    };
    serde_json::from_str(&text)
        .map_err(|err| CliError::new(DATA_INVALID, format!("{origin} is not valid JSON: {err}")))
}
