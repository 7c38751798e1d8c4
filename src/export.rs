/*!
 * Export functionality for collected series reports
 *
 * Writes the long-form series table as delimited text or JSON for downstream
 * charting and analysis tools.
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::series::DrugSeriesRow;
use crate::{ExportFormat, Result};

/// Trait for implementing series report exporters
pub trait ReportExporter {
    /// Export the rows to a file
    fn export(&self, rows: &[DrugSeriesRow], path: &Path) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

/// Delimited-text exporter for series rows
pub struct CsvExporter {
    /// Field delimiter
    pub delimiter: u8,
    /// Whether to write a header row
    pub include_headers: bool,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_headers: true,
        }
    }
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to include a header row
    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, rows: &[DrugSeriesRow], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.include_headers)
            .from_writer(file);

        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// JSON exporter for series rows
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
    /// Whether to export as JSON Lines (one row per line)
    pub json_lines: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self {
            pretty_print: true,
            json_lines: false,
        }
    }
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Set JSON Lines format
    pub fn as_json_lines(mut self) -> Self {
        self.json_lines = true;
        self.pretty_print = false; // JSON Lines shouldn't be pretty printed
        self
    }
}

impl ReportExporter for JsonExporter {
    fn export(&self, rows: &[DrugSeriesRow], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        if self.json_lines {
            for row in rows {
                let json = serde_json::to_string(row)?;
                writeln!(writer, "{}", json)?;
            }
        } else if self.pretty_print {
            serde_json::to_writer_pretty(writer, rows)?;
        } else {
            serde_json::to_writer(writer, rows)?;
        }

        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

/// Export rows to a path in the given format with default exporter settings
pub fn export_report(rows: &[DrugSeriesRow], path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Csv => CsvExporter::new().export(rows, path),
        ExportFormat::Json => JsonExporter::new().export(rows, path),
    }
}
