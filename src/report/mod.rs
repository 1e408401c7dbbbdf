//! Report Writer
//!
//! Serializes the audit tables into an `.xlsx` workbook: "Summary" and
//! "Raw Metrics", plus "Registered Models" when requested. The workbook is
//! assembled in memory and the output file is only touched by the final
//! save, which overwrites any existing file at that path without a backup.
//!
//! # Example
//!
//! ```rust,no_run
//! use experiment_audit::report::write_report;
//!
//! # fn example() -> experiment_audit::Result<()> {
//! write_report(&[], &[], "experiment_metrics_summary.xlsx")?;
//! # Ok(())
//! # }
//! ```

mod table;

pub use table::{
    metric_column, models_table, param_column, raw_metrics_table, summary_table, tag_column,
    utilization_mean_column, utilization_peak_column, Cell, SummarySchema, Table,
    FIXED_SUMMARY_COLUMNS, MODELS_SHEET, MODEL_COLUMNS, RAW_METRICS_COLUMNS, RAW_METRICS_SHEET,
    SUMMARY_SHEET,
};

use std::path::Path;

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet, XlsxError};
use tracing::{info, warn};

use crate::aggregate::{ModelVersionRow, RawMetricRow, SummaryRow};
use crate::{Error, Result};

/// Data rows per worksheet (Excel's 1,048,576-row limit minus the header).
pub const MAX_SHEET_ROWS: usize = 1_048_575;

/// Characters Excel accepts in one cell; longer text is cut to this length.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Widest column set from content, in characters.
const MAX_COLUMN_WIDTH: usize = 60;

/// Excel serial day number of the Unix epoch (1970-01-01).
const EXCEL_UNIX_EPOCH: f64 = 25_569.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Width used for datetime columns (`dd/mm/yyyy hh:mm:ss`).
const DATETIME_WIDTH: usize = 19;

/// Write the two-sheet report to `output_path`.
///
/// # Errors
///
/// `Error::Write` naming the path if the workbook cannot be saved.
pub fn write_report(
    summary_rows: &[SummaryRow],
    raw_rows: &[RawMetricRow],
    output_path: impl AsRef<Path>,
) -> Result<()> {
    Report::new(summary_rows, raw_rows).save(output_path)
}

/// A workbook's worth of tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    tables: Vec<Table>,
    max_sheet_rows: usize,
}

impl Report {
    /// Create a report with the "Summary" and "Raw Metrics" sheets.
    #[must_use]
    pub fn new(summary_rows: &[SummaryRow], raw_rows: &[RawMetricRow]) -> Self {
        Self {
            tables: vec![summary_table(summary_rows), raw_metrics_table(raw_rows)],
            max_sheet_rows: MAX_SHEET_ROWS,
        }
    }

    /// Append the "Registered Models" sheet.
    #[must_use]
    pub fn with_models(mut self, rows: &[ModelVersionRow]) -> Self {
        self.tables.push(models_table(rows));
        self
    }

    /// Cap the data rows per worksheet (at least 1, at most [`MAX_SHEET_ROWS`]).
    #[must_use]
    pub fn with_max_sheet_rows(mut self, rows: usize) -> Self {
        self.max_sheet_rows = rows.clamp(1, MAX_SHEET_ROWS);
        self
    }

    /// Data rows written per worksheet before continuing on the next one.
    #[must_use]
    pub const fn max_sheet_rows(&self) -> usize {
        self.max_sheet_rows
    }

    /// Tables in sheet order.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Look up a table by sheet name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Render and save the workbook, replacing any existing file.
    ///
    /// Tables longer than [`Report::max_sheet_rows`] continue on sheets
    /// suffixed ` 2`, ` 3`, ...
    ///
    /// # Errors
    ///
    /// `Error::Write` naming the path if rendering or saving fails.
    pub fn save(&self, output_path: impl AsRef<Path>) -> Result<()> {
        let path = output_path.as_ref();
        let write_error = |e: XlsxError| Error::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let formats = Formats::new();
        let mut workbook = Workbook::new();
        let mut sheets = 0usize;

        for table in &self.tables {
            let mut chunks: Vec<&[Vec<Cell>]> = table.rows().chunks(self.max_sheet_rows).collect();
            if chunks.is_empty() {
                chunks.push(table.rows());
            }
            if chunks.len() > 1 {
                warn!(
                    sheet = table.name(),
                    rows = table.rows().len(),
                    sheets = chunks.len(),
                    "table exceeds the worksheet row limit; continuing on extra sheets"
                );
            }

            for (index, rows) in chunks.into_iter().enumerate() {
                let name = if index == 0 {
                    table.name().to_string()
                } else {
                    format!("{} {}", table.name(), index + 1)
                };
                let sheet = workbook.add_worksheet();
                render_sheet(sheet, &name, table.headers(), rows, &formats).map_err(write_error)?;
                sheets += 1;
            }
        }

        workbook.save(path).map_err(write_error)?;
        info!(path = %path.display(), sheets, "report written");
        Ok(())
    }
}

struct Formats {
    header: Format,
    datetime: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold().set_border_bottom(FormatBorder::Thin),
            datetime: Format::new().set_num_format("dd/mm/yyyy hh:mm:ss"),
        }
    }
}

type RowNum = u32;
type ColNum = u16;

fn row_num(index: usize) -> std::result::Result<RowNum, XlsxError> {
    RowNum::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn col_num(index: usize) -> std::result::Result<ColNum, XlsxError> {
    ColNum::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

/// Cut text to Excel's per-cell limit on a character boundary.
fn clamp_text(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Excel serial date (days since 1899-12-30) for a UTC timestamp.
#[allow(clippy::cast_precision_loss)]
fn excel_serial(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp_millis() as f64 / MILLIS_PER_DAY + EXCEL_UNIX_EPOCH
}

fn render_sheet(
    sheet: &mut Worksheet,
    name: &str,
    headers: &[String],
    rows: &[Vec<Cell>],
    formats: &Formats,
) -> std::result::Result<(), XlsxError> {
    sheet.set_name(name)?;

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col_num(col)?, clamp_text(header), &formats.header)?;
    }

    for (index, cells) in rows.iter().enumerate() {
        let row = row_num(index + 1)?;
        for (col, cell) in cells.iter().enumerate() {
            let width = write_cell(sheet, row, col_num(col)?, cell, formats)?;
            if let Some(current) = widths.get_mut(col) {
                *current = (*current).max(width);
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let width = (*width + 2).min(MAX_COLUMN_WIDTH) as f64;
        sheet.set_column_width(col_num(col)?, width)?;
    }

    if !headers.is_empty() {
        sheet.set_freeze_panes(1, 0)?;
        sheet.autofilter(0, 0, row_num(rows.len())?, col_num(headers.len() - 1)?)?;
    }
    Ok(())
}

/// Write one cell; returns the display width it needs.
fn write_cell(
    sheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    cell: &Cell,
    formats: &Formats,
) -> std::result::Result<usize, XlsxError> {
    match cell {
        Cell::Empty => Ok(0),
        Cell::Text(text) => {
            let clamped = clamp_text(text);
            if clamped.len() < text.len() {
                warn!(row, col, chars = text.chars().count(), "cell text truncated to the Excel limit");
            }
            sheet.write_string(row, col, clamped)?;
            Ok(clamped.chars().count())
        }
        // Excel has no NaN/Infinity; keep the value visible as text.
        Cell::Number(value) if !value.is_finite() => {
            let text = value.to_string();
            sheet.write_string(row, col, &text)?;
            Ok(text.len())
        }
        Cell::Number(value) => {
            sheet.write_number(row, col, *value)?;
            Ok(value.to_string().len())
        }
        Cell::DateTime(timestamp) => {
            let serial = excel_serial(*timestamp);
            if serial < 1.0 {
                let text = timestamp.to_rfc3339();
                sheet.write_string(row, col, &text)?;
                return Ok(text.len());
            }
            sheet.write_number_with_format(row, col, serial, &formats.datetime)?;
            Ok(DATETIME_WIDTH)
        }
    }
}
