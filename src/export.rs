//! Export of projected tables as CSV or JSON.
//!
//! CSV output has a header row matching the projected columns; nulls are
//! empty fields. JSON output is an array of objects keyed by column name.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::io::Write;
use std::path::Path;

use engagement_fusion_core::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Write `table` to `writer` in the requested format.
pub fn write_table<W: Write>(table: &Table, format: ExportFormat, mut writer: W) -> Result<()> {
    match format {
        ExportFormat::Csv => {
            if table.columns.is_empty() {
                return Ok(());
            }
            let mut csv_writer = csv::Writer::from_writer(writer);
            csv_writer.write_record(&table.columns)?;
            for row in &table.rows {
                csv_writer.write_record(row.iter().map(|v| v.to_string()))?;
            }
            csv_writer.flush()?;
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, table)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Export to `output`, or to stdout when `output` is `None`.
pub fn run_export(table: &Table, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_table(table, format, std::io::BufWriter::new(file))?;
            eprintln!(
                "Exported {} rows, {} columns to {}",
                table.row_count(),
                table.column_count(),
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            write_table(table, format, stdout.lock())?;
        }
    }
    Ok(())
}
