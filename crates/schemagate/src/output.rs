use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use schemagate_service::SchemaEntry;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print one compact JSON document on its own line.
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_schemas(schemas: &[SchemaEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "ok": true, "schemas": schemas })),
        OutputFormat::Table => println!("{}", schema_table(schemas)),
    }
}

fn schema_table(schemas: &[SchemaEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["NAME", "VERSION", "PATH"]);
    for entry in schemas {
        table.add_row(vec![
            entry.name.clone(),
            entry.version.clone().unwrap_or_else(|| "-".to_string()),
            entry.path.clone(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_every_schema() {
        let schemas = vec![
            SchemaEntry {
                name: "control".to_string(),
                version: None,
                path: "control.schema.json".to_string(),
            },
            SchemaEntry {
                name: "synesthetic-asset".to_string(),
                version: Some("0.7.3".to_string()),
                path: "synesthetic-asset.schema.json".to_string(),
            },
        ];
        let rendered = schema_table(&schemas).to_string();
        assert!(rendered.contains("NAME"));
        assert!(rendered.contains("synesthetic-asset"));
        assert!(rendered.contains("0.7.3"));
        assert!(rendered.contains(" - "));
    }
}
