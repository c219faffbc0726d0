//! Text and JSON rendering of session replies and query results.

use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    shell::{cache::RefreshReport, command::META_COMMANDS, session::Reply},
    sql::{executor::RowSet, types::Value},
};

/// Default width at which field values are cut off
pub const MAX_FIELD_LENGTH: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Formats replies for the terminal
#[derive(Debug, Clone)]
pub struct Renderer {
    format: OutputFormat,
    max_field_length: usize,
    color: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(OutputFormat::Table, MAX_FIELD_LENGTH, true)
    }
}

impl Renderer {
    pub fn new(format: OutputFormat, max_field_length: usize, color: bool) -> Self {
        Self {
            format,
            max_field_length,
            color,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn title(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Cuts `value` to the configured width and marks the cut with `...`
    pub fn truncate(&self, value: &str) -> String {
        if value.chars().count() > self.max_field_length {
            let kept: String = value.chars().take(self.max_field_length).collect();
            format!("{}...", kept)
        } else {
            value.to_string()
        }
    }

    pub fn reply(&self, reply: &Reply) -> String {
        match reply {
            Reply::Nothing => String::new(),
            Reply::Tables(names) => self.tables("Available Tables", names),
            Reply::Schema(table) => format!(
                "{}\n{}",
                self.paint(&format!("Schema for {}:", table.name), Color::Cyan),
                table
            ),
            Reply::Refreshed(report) => self.refreshed(report),
            Reply::Updated(report) => [
                self.paint(
                    &format!("Successfully updated rows in '{}'", report.table),
                    Color::Green,
                ),
                format!("Updated columns: [{}]", report.columns.join(", ")),
                format!("WHERE condition: {}", report.predicate),
                format!("Rows updated: {}", report.updated),
            ]
            .join("\n"),
            Reply::Deleted(report) => format!(
                "{}\n{}",
                self.paint(
                    &format!("Successfully deleted {} row(s)", report.deleted),
                    Color::Green
                ),
                self.paint(
                    &format!(
                        "Rows before: {}, Rows after: {}",
                        report.rows_before, report.rows_after
                    ),
                    Color::Cyan
                ),
            ),
            Reply::Emptied(report) => self.paint(
                &format!(
                    "Successfully emptied table '{}' - deleted {} row(s)",
                    report.table, report.deleted
                ),
                Color::Green,
            ),
            Reply::Dropped(table) => {
                self.paint(&format!("Successfully dropped table '{}'", table), Color::Green)
            }
            Reply::Cancelled => self.paint("Operation cancelled", Color::Cyan),
            Reply::Rows(outcome) => {
                let rows = self.rows(&outcome.rows);
                if outcome.retried {
                    format!(
                        "{}\n{}\n{}",
                        self.paint("Table schema has changed. Refreshing views...", Color::Yellow),
                        self.paint("Retrying query...", Color::Cyan),
                        rows
                    )
                } else {
                    rows
                }
            }
            Reply::Help => self.help(),
            Reply::Usage(usage) => self.paint(usage, Color::Red),
            Reply::Goodbye => self.paint("Goodbye!", Color::Yellow),
        }
    }

    fn refreshed(&self, report: &RefreshReport) -> String {
        let mut lines = vec![self.paint("Refreshing all table views...", Color::Cyan)];
        for (table, reason) in &report.failed {
            lines.push(self.paint(
                &format!("Warning: Could not refresh view for {}: {}", table, reason),
                Color::Yellow,
            ));
        }
        lines.push(self.paint("All views refreshed successfully", Color::Green));
        lines.join("\n")
    }

    pub fn rows(&self, rows: &RowSet) -> String {
        self.rows_titled(&format!("Query Results ({} rows)", rows.len()), rows)
    }

    /// Query results as a titled table or a JSON array of objects
    pub fn rows_titled(&self, title: &str, rows: &RowSet) -> String {
        match self.format {
            OutputFormat::Json => json(rows),
            OutputFormat::Table if rows.is_empty() => self.paint("No results", Color::Yellow),
            OutputFormat::Table => {
                let cells = rows
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|v| v.to_string()).collect())
                    .collect();
                self.table(title, &rows.columns, cells)
            }
        }
    }

    pub fn tables(&self, title: &str, names: &[String]) -> String {
        if names.is_empty() {
            return self.paint("No tables found", Color::Yellow);
        }
        let cells = names.iter().map(|n| vec![n.clone()]).collect();
        self.table(title, &["Table Name".to_string()], cells)
    }

    /// Draws a boxed table; every cell is truncated first
    pub fn table(&self, title: &str, columns: &[String], rows: Vec<Vec<String>>) -> String {
        let header: Vec<String> = columns.iter().map(|c| self.truncate(c)).collect();
        let rows: Vec<Vec<String>> = rows
            .iter()
            .map(|row| row.iter().map(|v| self.truncate(v)).collect())
            .collect();
        let mut widths: Vec<usize> = header.iter().map(|c| c.chars().count()).collect();
        for row in &rows {
            for (width, value) in widths.iter_mut().zip(row) {
                *width = (*width).max(value.chars().count());
            }
        }

        let border = |left: char, middle: char, right: char| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}", left, segments.join(middle.to_string().as_str()), right)
        };

        let mut out = vec![self.title(title), border('┌', '┬', '┐')];
        let cells: Vec<String> = header
            .iter()
            .zip(&widths)
            .map(|(c, w)| self.paint(&format!("{:w$}", c, w = *w), Color::Cyan))
            .collect();
        out.push(format!("│ {} │", cells.join(" │ ")));
        out.push(border('├', '┼', '┤'));
        for row in &rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:w$}", v, w = *w))
                .collect();
            out.push(format!("│ {} │", cells.join(" │ ")));
        }
        out.push(border('└', '┴', '┘'));
        out.join("\n")
    }

    pub fn error(&self, err: &Error) -> String {
        match err {
            Error::Interrupted => self.paint("Interrupted", Color::Yellow),
            Error::StoreOperationFailed {
                operation,
                columns,
                predicate,
                ..
            } => {
                let mut lines = vec![self.paint(&format!("Error: {}", err), Color::Red)];
                if *operation == "update" {
                    lines.push(format!("Columns being updated: [{}]", columns.join(", ")));
                }
                if !predicate.is_empty() {
                    lines.push(format!("WHERE condition: {}", predicate));
                }
                lines.join("\n")
            }
            err => self.paint(&format!("Error: {}", err), Color::Red),
        }
    }

    pub fn banner(&self, target: &str) -> String {
        format!(
            "{}\n{}",
            self.title(&self.paint(&format!("Connected to: {}", target), Color::Cyan)),
            self.help()
        )
    }

    pub fn help(&self) -> String {
        let described = [
            "List all tables",
            "Show schema of a table (.schema <table_name>)",
            "Refresh all table views",
            "Update rows (.update <table> <set_clause> <where_clause>)",
            "Delete rows (.delete <table> <where_clause>)",
            "Empty a table (.empty <table>)",
            "Drop an entire table (.drop <table> [--confirm])",
            "Show this help",
            "Exit interactive mode",
        ];
        let mut lines = vec![self.paint("Commands:", Color::Yellow)];
        for (command, description) in META_COMMANDS.iter().zip(described) {
            lines.push(format!("  {:<13} - {}", command, description));
        }
        lines.push(self.paint("Or type SQL queries directly", Color::Yellow));
        lines.join("\n")
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
    }
}

fn json(rows: &RowSet) -> String {
    let objects: Vec<serde_json::Value> = rows
        .rows
        .iter()
        .map(|row| {
            rows.columns
                .iter()
                .cloned()
                .zip(row.iter().map(json_value))
                .collect::<serde_json::Map<_, _>>()
                .into()
        })
        .collect();
    serde_json::to_string_pretty(&objects).unwrap_or_else(|e| format!("Error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::{OutputFormat, Renderer};
    use crate::{
        error::Error,
        shell::{mutation::DeleteReport, runner::QueryOutcome, session::Reply},
        sql::{executor::RowSet, types::Value},
    };

    fn plain() -> Renderer {
        Renderer::new(OutputFormat::Table, 5, false)
    }

    fn rowset() -> RowSet {
        RowSet {
            columns: vec!["id".into(), "name".into()],
            rows: vec![
                vec![Value::Integer(1), Value::String("Jane".into())],
                vec![Value::Integer(22), Value::String("Bartholomew".into())],
            ],
        }
    }

    #[test]
    fn test_truncate() {
        let renderer = plain();
        assert_eq!(renderer.truncate("short"), "short");
        assert_eq!(renderer.truncate("longer"), "longe...");
        assert_eq!(renderer.truncate("ééééééé"), "ééééé...");
    }

    #[test]
    fn test_table() {
        let rendered = plain().rows(&rowset());
        let expected = "\
Query Results (2 rows)
┌────┬──────────┐
│ id │ name     │
├────┼──────────┤
│ 1  │ Jane     │
│ 22 │ Barth... │
└────┴──────────┘";
        assert_eq!(rendered, expected);

        let empty = RowSet {
            columns: vec!["id".into()],
            rows: vec![],
        };
        assert_eq!(plain().rows(&empty), "No results");
    }

    #[test]
    fn test_json() -> crate::error::Result<()> {
        let rendered = plain().with_format(OutputFormat::Json).rows(&rowset());
        let parsed: serde_json::Value = serde_json::from_str(&rendered)?;
        assert_eq!(
            parsed,
            serde_json::json!([
                {"id": 1, "name": "Jane"},
                {"id": 22, "name": "Bartholomew"},
            ])
        );
        Ok(())
    }

    #[test]
    fn test_replies() {
        let renderer = plain();
        let report = DeleteReport {
            table: "orders".into(),
            predicate: "amount < 0".into(),
            rows_before: 10,
            rows_after: 8,
            deleted: 2,
        };
        assert_eq!(
            renderer.reply(&Reply::Deleted(report.clone())),
            "Successfully deleted 2 row(s)\nRows before: 10, Rows after: 8"
        );
        assert_eq!(
            renderer.reply(&Reply::Emptied(report)),
            "Successfully emptied table 'orders' - deleted 2 row(s)"
        );
        let retried = renderer.reply(&Reply::Rows(QueryOutcome {
            rows: rowset(),
            retried: true,
        }));
        assert!(
            retried.starts_with("Table schema has changed. Refreshing views...\nRetrying query...")
        );
        assert!(renderer.help().contains(".drop"));
        assert_eq!(renderer.error(&Error::Interrupted), "Interrupted");
        assert_eq!(
            renderer.error(&Error::TableNotFound("x".into())),
            "Error: Table 'x' not found"
        );
    }
}
