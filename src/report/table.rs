//! Sheet contents: declared column schemas and cell projections.
//!
//! Kept separate from the xlsx rendering so the exact contents of every
//! sheet can be inspected without reading a workbook back.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::aggregate::{ModelVersionRow, RawMetricRow, SummaryRow};

/// Name of the one-row-per-run sheet.
pub const SUMMARY_SHEET: &str = "Summary";
/// Name of the one-row-per-sample sheet.
pub const RAW_METRICS_SHEET: &str = "Raw Metrics";
/// Name of the optional model registry sheet.
pub const MODELS_SHEET: &str = "Registered Models";

/// Leading "Summary" columns, present regardless of the data.
pub const FIXED_SUMMARY_COLUMNS: [&str; 11] = [
    "Run ID",
    "Experiment Name",
    "Run Name",
    "Status",
    "Start Time",
    "End Time",
    "Duration (s)",
    "User",
    "Source",
    "Logged Models",
    "Registered Models",
];

/// "Raw Metrics" columns.
pub const RAW_METRICS_COLUMNS: [&str; 5] = ["Run ID", "Metric", "Timestamp", "Step", "Value"];

/// "Registered Models" columns.
pub const MODEL_COLUMNS: [&str; 7] = [
    "Model Name",
    "Version",
    "Stage",
    "Source",
    "Run ID",
    "Git Commit",
    "Creation Time",
];

/// Header of the column holding a parameter.
#[must_use]
pub fn param_column(name: &str) -> String {
    format!("params.{name}")
}

/// Header of the column holding a metric's final value.
#[must_use]
pub fn metric_column(name: &str) -> String {
    format!("metrics.{name}")
}

/// Header of the column holding a user tag.
#[must_use]
pub fn tag_column(name: &str) -> String {
    format!("tags.{name}")
}

/// Header of the column holding a utilization metric's mean.
#[must_use]
pub fn utilization_mean_column(metric: &str) -> String {
    format!("{metric} mean")
}

/// Header of the column holding a utilization metric's peak.
#[must_use]
pub fn utilization_peak_column(metric: &str) -> String {
    format!("{metric} peak")
}

/// A single cell value. `Empty` renders as a blank cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Absent value.
    Empty,
    /// Text.
    Text(String),
    /// Number.
    Number(f64),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
}

impl Cell {
    fn text(value: Option<&str>) -> Self {
        value.map_or(Self::Empty, |v| Self::Text(v.to_string()))
    }

    fn number(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }

    fn datetime(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(Self::Empty, Self::DateTime)
    }

    /// Whether the cell is blank.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The numeric value, if this is a number cell.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// The text value, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// A named sheet: headers plus rows of cells, one cell per header.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create a table.
    #[must_use]
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Sheet name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column headers.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows (excluding the header).
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Index of the column with the given header.
    #[must_use]
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell at `row` in the column named `header`.
    #[must_use]
    pub fn cell(&self, row: usize, header: &str) -> Option<&Cell> {
        let col = self.column(header)?;
        self.rows.get(row)?.get(col)
    }
}

/// Declared schema of the "Summary" sheet.
///
/// The fixed columns come first; the remaining columns are derived from the
/// parameter, metric, tag, and utilization names observed across all rows,
/// each group in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummarySchema {
    params: Vec<String>,
    metrics: Vec<String>,
    tags: Vec<String>,
    utilization: Vec<String>,
}

impl SummarySchema {
    /// Derive the schema from the rows that will be written.
    #[must_use]
    pub fn from_rows(rows: &[SummaryRow]) -> Self {
        let mut params = BTreeSet::new();
        let mut metrics = BTreeSet::new();
        let mut tags = BTreeSet::new();
        let mut utilization = BTreeSet::new();

        for row in rows {
            params.extend(row.params.keys().cloned());
            metrics.extend(row.metrics.keys().cloned());
            tags.extend(row.tags.keys().cloned());
            utilization.extend(row.utilization.keys().cloned());
        }

        Self {
            params: params.into_iter().collect(),
            metrics: metrics.into_iter().collect(),
            tags: tags.into_iter().collect(),
            utilization: utilization.into_iter().collect(),
        }
    }

    /// Parameter names with a column.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Metric names with a column.
    #[must_use]
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Column headers, in order.
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = FIXED_SUMMARY_COLUMNS.iter().map(|h| (*h).to_string()).collect();
        headers.extend(self.params.iter().map(|name| param_column(name)));
        headers.extend(self.metrics.iter().map(|name| metric_column(name)));
        headers.extend(self.tags.iter().map(|name| tag_column(name)));
        for metric in &self.utilization {
            headers.push(utilization_mean_column(metric));
            headers.push(utilization_peak_column(metric));
        }
        headers
    }

    /// Project a row onto the schema's columns.
    #[must_use]
    pub fn cells(&self, row: &SummaryRow) -> Vec<Cell> {
        let logged_models = (!row.logged_models.is_empty()).then(|| row.logged_models.join(", "));

        let mut cells = vec![
            Cell::Text(row.run_id.clone()),
            Cell::Text(row.experiment_name.clone()),
            Cell::text(row.run_name.as_deref()),
            Cell::Text(row.status.to_string()),
            Cell::datetime(row.started_at),
            Cell::datetime(row.ended_at),
            Cell::number(row.duration_secs),
            Cell::text(row.user.as_deref()),
            Cell::text(row.source.as_deref()),
            Cell::text(logged_models.as_deref()),
            Cell::text(row.registered_models.as_deref()),
        ];
        cells.extend(self.params.iter().map(|name| Cell::text(row.params.get(name).map(String::as_str))));
        cells.extend(self.metrics.iter().map(|name| Cell::number(row.metrics.get(name).copied())));
        cells.extend(self.tags.iter().map(|name| Cell::text(row.tags.get(name).map(String::as_str))));
        for metric in &self.utilization {
            let stats = row.utilization.get(metric);
            cells.push(Cell::number(stats.map(|s| s.mean)));
            cells.push(Cell::number(stats.map(|s| s.peak)));
        }
        cells
    }
}

/// Build the "Summary" sheet.
#[must_use]
pub fn summary_table(rows: &[SummaryRow]) -> Table {
    let schema = SummarySchema::from_rows(rows);
    let cells = rows.iter().map(|row| schema.cells(row)).collect();
    Table::new(SUMMARY_SHEET, schema.headers(), cells)
}

/// Build the "Raw Metrics" sheet.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn raw_metrics_table(rows: &[RawMetricRow]) -> Table {
    let cells = rows
        .iter()
        .map(|row| {
            vec![
                Cell::Text(row.run_id.clone()),
                Cell::Text(row.metric.clone()),
                Cell::DateTime(row.timestamp),
                Cell::Number(row.step as f64),
                Cell::Number(row.value),
            ]
        })
        .collect();
    Table::new(RAW_METRICS_SHEET, headers(&RAW_METRICS_COLUMNS), cells)
}

/// Build the "Registered Models" sheet.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn models_table(rows: &[ModelVersionRow]) -> Table {
    let cells = rows
        .iter()
        .map(|row| {
            vec![
                Cell::Text(row.model_name.clone()),
                Cell::Number(row.version as f64),
                Cell::Text(row.stage.clone()),
                Cell::Text(row.source.clone()),
                Cell::text(row.run_id.as_deref()),
                Cell::text(row.git_commit.as_deref()),
                Cell::datetime(row.created_at),
            ]
        })
        .collect();
    Table::new(MODELS_SHEET, headers(&MODEL_COLUMNS), cells)
}

fn headers(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|h| (*h).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::UtilizationStats;
    use crate::experiment::RunStatus;
    use std::collections::BTreeMap;

    fn row(run_id: &str) -> SummaryRow {
        SummaryRow {
            run_id: run_id.to_string(),
            experiment_id: "1".to_string(),
            experiment_name: "exp".to_string(),
            run_name: None,
            status: RunStatus::Finished,
            started_at: None,
            ended_at: None,
            duration_secs: None,
            user: None,
            source: None,
            logged_models: Vec::new(),
            registered_models: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            utilization: BTreeMap::new(),
        }
    }

    #[test]
    fn test_schema_unions_observed_names() {
        let mut a = row("a");
        a.params.insert("lr".into(), "0.01".into());
        a.metrics.insert("accuracy".into(), 0.9);
        let mut b = row("b");
        b.params.insert("batch".into(), "32".into());

        let schema = SummarySchema::from_rows(&[a, b]);
        assert_eq!(schema.params(), &["batch", "lr"]);
        assert_eq!(schema.metrics(), &["accuracy"]);

        let headers = schema.headers();
        assert_eq!(headers.len(), FIXED_SUMMARY_COLUMNS.len() + 3);
        assert_eq!(headers[FIXED_SUMMARY_COLUMNS.len()], "params.batch");
        assert_eq!(headers.last().map(String::as_str), Some("metrics.accuracy"));
    }

    #[test]
    fn test_absent_values_are_empty_cells() {
        let mut a = row("a");
        a.metrics.insert("accuracy".into(), 0.9);
        let b = row("b");

        let table = summary_table(&[a, b]);
        assert_eq!(table.cell(0, "metrics.accuracy").and_then(Cell::as_number), Some(0.9));
        assert!(table.cell(1, "metrics.accuracy").unwrap().is_empty());
        assert!(table.cell(1, "Start Time").unwrap().is_empty());
        assert_eq!(table.cell(1, "Status").and_then(Cell::as_text), Some("FINISHED"));
    }

    #[test]
    fn test_utilization_columns() {
        let mut a = row("a");
        a.utilization.insert(
            "system/cpu_utilization_percentage".into(),
            UtilizationStats {
                samples: 2,
                mean: 40.0,
                peak: 70.0,
            },
        );
        let table = summary_table(&[a]);
        assert_eq!(
            table
                .cell(0, "system/cpu_utilization_percentage peak")
                .and_then(Cell::as_number),
            Some(70.0)
        );
    }

    #[test]
    fn test_raw_metrics_table_shape() {
        let rows = vec![RawMetricRow {
            run_id: "a".into(),
            metric: "cpu".into(),
            timestamp: DateTime::from_timestamp_millis(0).unwrap(),
            step: 4,
            value: 12.5,
        }];
        let table = raw_metrics_table(&rows);
        assert_eq!(table.name(), RAW_METRICS_SHEET);
        assert_eq!(table.headers(), &RAW_METRICS_COLUMNS);
        assert_eq!(table.cell(0, "Step").and_then(Cell::as_number), Some(4.0));
    }
}
