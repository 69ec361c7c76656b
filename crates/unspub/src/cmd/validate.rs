use serde::Serialize;
use serde_json::Value;
use unspub_schema::{validate, SchemaRegistry, ValidationOutcome};
use unspub_topic::classify;

use crate::cmd::classify::parse_topic;
use crate::cmd::{load_payload, ValidateArgs};
use crate::exit::{CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_json, table, OutputFormat, SCHEMA_ID_BASE};

#[derive(Serialize)]
struct ValidateOutput {
    schema_id: String,
    topic: String,
    schema: Option<&'static str>,
    verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    advisory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<Value>,
}

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let topic = parse_topic(&args.topic)?;
    let payload = load_payload(args.json.as_deref(), args.file.as_deref())?;
    let registry = SchemaRegistry::load(&args.schema_dir);

    let classification = classify(&topic, &payload);
    let outcome = validate(&payload, classification, &registry);

    let mut output = ValidateOutput {
        schema_id: format!("{SCHEMA_ID_BASE}/validation.schema.json"),
        topic: topic.to_string(),
        schema: classification.schema().map(|name| name.as_str()),
        verdict: "accepted",
        advisory: None,
        path: None,
        message: None,
        expected: None,
    };
    match &outcome {
        ValidationOutcome::Accepted => {}
        ValidationOutcome::Advisory(advisory) => {
            output.verdict = "advisory";
            output.advisory = Some(advisory.to_string());
        }
        ValidationOutcome::Rejected(rejection) => {
            output.verdict = "rejected";
            output.path = Some(rejection.path.to_string());
            output.message = Some(rejection.message.clone());
            output.expected = rejection.expected.clone();
        }
    }

    print_validation(&output, format);

    if outcome.permits_publish() {
        Ok(SUCCESS)
    } else {
        Ok(DATA_INVALID)
    }
}

fn print_validation(output: &ValidateOutput, format: OutputFormat) {
    let schema = output.schema.unwrap_or("unknown");
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table => {
            let detail = match (&output.advisory, &output.message) {
                (Some(advisory), _) => advisory.clone(),
                (None, Some(message)) => format!(
                    "at {}: {}",
                    output.path.as_deref().unwrap_or("root"),
                    message
                ),
                (None, None) => String::new(),
            };
            let mut t = table(vec!["TOPIC", "SCHEMA", "VERDICT", "DETAIL"]);
            t.add_row(vec![
                output.topic.clone(),
                schema.to_string(),
                output.verdict.to_string(),
                detail,
            ]);
            println!("{t}");
        }
        OutputFormat::Pretty => {
            println!("{}: {} ({schema})", output.topic, output.verdict);
            if let Some(advisory) = &output.advisory {
                println!("  warning:  {advisory}");
            }
            if let Some(message) = &output.message {
                println!("  error:    {message}");
                println!("  path:     {}", output.path.as_deref().unwrap_or("root"));
            }
            if let Some(expected) = &output.expected {
                println!("  expected: {expected}");
            }
        }
    }
}
