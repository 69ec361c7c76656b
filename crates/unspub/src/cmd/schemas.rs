use serde::Serialize;
use unspub_schema::{SchemaName, SchemaRegistry};

use crate::cmd::SchemasArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, table, OutputFormat, SCHEMA_ID_BASE};

#[derive(Serialize)]
struct LoadedSchema {
    name: &'static str,
    path: Option<String>,
}

#[derive(Serialize)]
struct MissingSchema {
    name: &'static str,
    reason: String,
}

#[derive(Serialize)]
struct SchemasOutput {
    schema_id: String,
    root: String,
    loaded: Vec<LoadedSchema>,
    missing: Vec<MissingSchema>,
}

pub fn run(args: SchemasArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = SchemaRegistry::load(&args.schema_dir);

    let output = SchemasOutput {
        schema_id: format!("{SCHEMA_ID_BASE}/schema-inventory.schema.json"),
        root: args.schema_dir.display().to_string(),
        loaded: registry
            .names()
            .into_iter()
            .map(|name| LoadedSchema {
                name: name.as_str(),
                path: registry
                    .lookup(name)
                    .and_then(|doc| doc.source())
                    .map(|path| path.display().to_string()),
            })
            .collect(),
        missing: registry
            .missing()
            .iter()
            .map(|(name, reason)| MissingSchema {
                name: name.as_str(),
                reason: reason.clone(),
            })
            .collect(),
    };

    print_inventory(&output, format);
    Ok(SUCCESS)
}

fn print_inventory(output: &SchemasOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table => {
            let mut t = table(vec!["SCHEMA", "STATUS", "DETAIL"]);
            for name in SchemaName::ALL {
                if let Some(loaded) = output.loaded.iter().find(|s| s.name == name.as_str()) {
                    t.add_row(vec![
                        loaded.name.to_string(),
                        "loaded".to_string(),
                        loaded.path.clone().unwrap_or_default(),
                    ]);
                } else if let Some(missing) =
                    output.missing.iter().find(|s| s.name == name.as_str())
                {
                    t.add_row(vec![
                        missing.name.to_string(),
                        "missing".to_string(),
                        missing.reason.clone(),
                    ]);
                }
            }
            println!("{t}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}: {} loaded, {} missing",
                output.root,
                output.loaded.len(),
                output.missing.len()
            );
            for schema in &output.loaded {
                println!("  [  OK] {}", schema.name);
            }
            for schema in &output.missing {
                println!("  [MISS] {:<12} {}", schema.name, schema.reason);
            }
        }
    }
}
