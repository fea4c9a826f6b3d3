//! Values file commands

use anyhow::{Context, Result};
use monitor_lib::values::ValuesDocument;
use serde_json::Value;
use std::path::Path;
use tabled::Tabled;

use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Row for values table
#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Build the document to write: the demo entries unless pairs were given
pub fn document_from(entries: Vec<(String, Value)>) -> ValuesDocument {
    if entries.is_empty() {
        return ValuesDocument::demo();
    }
    let mut doc = ValuesDocument::new();
    for (key, value) in entries {
        doc.insert(key, value);
    }
    doc
}

/// Write the values file
pub fn write_values(path: &Path, entries: Vec<(String, Value)>, format: OutputFormat) -> Result<()> {
    let doc = document_from(entries);
    doc.write(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    match format {
        OutputFormat::Json => print_json(&doc)?,
        OutputFormat::Table => print_success(&format!(
            "Wrote {} entries to {}",
            doc.values.len(),
            path.display()
        )),
    }

    Ok(())
}

/// Read the values file and print its entries
pub fn read_values(path: &Path, format: OutputFormat) -> Result<()> {
    let doc = ValuesDocument::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    match format {
        OutputFormat::Json => print_json(&doc)?,
        OutputFormat::Table => {
            if doc.values.is_empty() {
                print_info("No values found");
                return Ok(());
            }

            let rows: Vec<ValueRow> = doc
                .values
                .iter()
                .map(|(key, value)| ValueRow {
                    key: key.clone(),
                    value: match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_defaults_to_demo() {
        assert_eq!(document_from(Vec::new()), ValuesDocument::demo());
    }

    #[test]
    fn test_document_from_entries() {
        let doc = document_from(vec![
            ("limit".to_string(), json!(42)),
            ("name".to_string(), json!("web")),
        ]);

        assert_eq!(doc.values.len(), 2);
        assert_eq!(doc.get("limit"), Some(&json!(42)));
        assert_eq!(doc.get("key1"), None);
    }
}
