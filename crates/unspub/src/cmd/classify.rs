use serde::Serialize;
use unspub_topic::{explain, Topic};

use crate::cmd::{load_payload, ClassifyArgs};
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, table, OutputFormat, SCHEMA_ID_BASE};

#[derive(Serialize)]
struct ClassifyOutput {
    schema_id: String,
    topic: String,
    schema: Option<&'static str>,
    rule: String,
}

pub fn run(args: ClassifyArgs, format: OutputFormat) -> CliResult<i32> {
    let topic = parse_topic(&args.topic)?;
    let payload = load_payload(args.json.as_deref(), args.file.as_deref())?;
    let explanation = explain(&topic, &payload);

    let output = ClassifyOutput {
        schema_id: format!("{SCHEMA_ID_BASE}/classification.schema.json"),
        topic: topic.to_string(),
        schema: explanation.classification.schema().map(|name| name.as_str()),
        rule: explanation.rule.to_string(),
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            let mut t = table(vec!["TOPIC", "SCHEMA", "RULE"]);
            t.add_row(vec![
                output.topic.clone(),
                output.schema.unwrap_or("unknown").to_string(),
                output.rule.clone(),
            ]);
            println!("{t}");
        }
        OutputFormat::Pretty => println!(
            "{} -> {} ({})",
            output.topic,
            output.schema.unwrap_or("unknown"),
            output.rule
        ),
    }

    Ok(SUCCESS)
}

pub fn parse_topic(topic: &str) -> CliResult<Topic> {
    Topic::parse(topic).map_err(|err| CliError::new(USAGE, format!("invalid topic: {err}")))
}
