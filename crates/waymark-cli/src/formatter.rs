//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};

use crate::commands::Status;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

/// Renders command results.
pub trait Formatter {
    /// Format a status report.
    fn format_status(&self, status: &Status) -> String;

    /// Format an error message.
    fn format_error(&self, error: &str) -> String;

    /// Confirm that `id` was recorded by hand.
    fn format_recorded(&self, id: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_status(&self, status: &Status) -> String {
        let mut table = Table::new();
        table.set_header(vec!["#", "Identifier", "Status"]);

        let pending = status.pending.as_deref().unwrap_or_default();
        let rows = status
            .applied
            .iter()
            .map(|id| (id, "applied"))
            .chain(pending.iter().map(|id| (id, "pending")));
        for (idx, (id, state)) in rows.enumerate() {
            table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(id),
                Cell::new(state),
            ]);
        }

        let mut output = format!("{}\n{} applied", table, status.applied.len());
        if let Some(pending) = &status.pending {
            output.push_str(&format!(", {} pending", pending.len()));
        }
        if let Some(error) = &status.error {
            output.push('\n');
            output.push_str(&self.format_error(error));
        }
        output
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}", error)
    }

    fn format_recorded(&self, id: &str) -> String {
        format!("recorded \"{id}\"")
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_status(&self, status: &Status) -> String {
        let value = serde_json::json!({
            "applied": status.applied,
            "pending": status.pending,
            "error": status.error,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({
            "error": error
        })
        .to_string()
    }

    fn format_recorded(&self, id: &str) -> String {
        serde_json::json!({ "recorded": id }).to_string()
    }
}
