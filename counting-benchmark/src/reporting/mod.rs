//! Results reporting

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::{Bucket, CountSummary, MethodRmse};
use crate::runner::StageReport;
use crate::table::{ResultTable, TableResult};

/// First column of the RMSE report
pub const METHOD_COLUMN: &str = "Method";
pub const OVERALL_COLUMN: &str = "Overall performance";
pub const MISSING_COLUMN: &str = "Number of NA";

/// Columns of a fresh RMSE report, in order
pub fn report_columns() -> Vec<&'static str> {
    let mut columns = vec![METHOD_COLUMN];
    columns.extend(Bucket::all().iter().map(|b| b.label()));
    columns.push(OVERALL_COLUMN);
    columns.push(MISSING_COLUMN);
    columns
}

/// `NaN` becomes an empty cell
fn format_rmse(value: f64) -> Option<String> {
    if value.is_nan() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Merge method rows into the RMSE report at `path`.
///
/// Rows whose `Method` matches a result are overwritten, other methods are
/// appended, and rows for methods not in `results` are left as they were.
pub fn update_rmse_report(path: impl AsRef<Path>, results: &[MethodRmse]) -> TableResult<ResultTable> {
    let path = path.as_ref();
    let mut table = if path.exists() {
        ResultTable::read(path)?
    } else {
        ResultTable::new(report_columns())
    };
    for column in report_columns() {
        table.ensure_column(column);
    }

    for result in results {
        let existing = table
            .column(METHOD_COLUMN)?
            .iter()
            .position(|m| *m == Some(result.method.as_str()));
        let row = match existing {
            Some(row) => row,
            None => {
                table.push_row([(METHOD_COLUMN, result.method.clone())])?;
                table.len() - 1
            }
        };

        for bucket in Bucket::all() {
            table.set(row, bucket.label(), format_rmse(result.bucket(bucket).rmse).as_deref())?;
        }
        table.set(row, OVERALL_COLUMN, format_rmse(result.overall.rmse).as_deref())?;
        table.set(row, MISSING_COLUMN, Some(result.missing.to_string().as_str()))?;
    }

    table.write(path)?;
    tracing::info!("Updated {} with {} methods", path.display(), results.len());
    Ok(table)
}

/// JSON summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub run_id: String,
    pub timestamp: String,
    pub evaluation_file: String,
    pub rmse_file: String,
    /// Per-method scores including per-bucket row and missing tallies
    pub methods: Vec<MethodRmse>,
}

impl JsonSummary {
    pub fn new(
        run_id: impl Into<String>,
        evaluation_file: impl Into<String>,
        rmse_file: impl Into<String>,
        methods: &[MethodRmse],
    ) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            evaluation_file: evaluation_file.into(),
            rmse_file: rmse_file.into(),
            methods: methods.to_vec(),
        }
    }

    /// `summary.json` next to the RMSE report
    pub fn default_path(rmse_file: &Path) -> PathBuf {
        rmse_file.with_file_name("summary.json")
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
    }
}

fn cell(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.3}", value)
    }
}

/// Print the RMSE table
pub fn print_console_report(results: &[MethodRmse]) {
    println!("\n=== Counting RMSE ===\n");
    println!(
        "{:<18} {:>10} {:>12} {:>10} {:>10} {:>6}",
        "Method", "<20", "20..100", ">=100", "Overall", "NA"
    );
    println!("{:-<71}", "");

    for result in results {
        println!(
            "{:<18} {:>10} {:>12} {:>10} {:>10} {:>6}",
            result.method,
            cell(result.small.rmse),
            cell(result.medium.rmse),
            cell(result.large.rmse),
            cell(result.overall.rmse),
            result.missing
        );
    }

    // Per-bucket missing tallies only when some bucket has gaps
    if results.iter().any(|r| r.missing > 0) {
        println!("\nMissing predictions by bucket:");
        for result in results.iter().filter(|r| r.missing > 0) {
            let tallies: Vec<String> = Bucket::all()
                .iter()
                .map(|b| format!("{}: {}/{}", b, result.bucket(*b).missing, result.bucket(*b).rows))
                .collect();
            println!("  {:<18} {}", result.method, tallies.join(", "));
        }
    }

    println!("\n{:=<71}", "");
}

/// Print bucket and class tallies of the label table
pub fn print_count_summary(summary: &CountSummary, top_classes: usize) {
    println!("\n=== True Count Summary ===\n");
    println!("Images: {}", summary.images);
    for (bucket, n) in &summary.buckets {
        println!("  {:<20} {}", bucket.to_string(), n);
    }

    if let Some(d) = &summary.distribution {
        println!(
            "\nmin {}  q1 {}  median {}  q3 {}  max {}",
            d.min, d.q1, d.median, d.q3, d.max
        );
    }

    if !summary.classes.is_empty() {
        println!("\nClasses: {}", summary.classes.len());
        for (class, n) in summary.classes.iter().take(top_classes) {
            println!("  {:<24} {}", class, n);
        }
    }
}

/// One-line outcome of a generation stage
pub fn print_stage_report(report: &StageReport) {
    println!(
        "{} -> {}: {} answered, {} skipped, {} missing images, {} failed, {} unparsed ({} rows)",
        report.stage,
        report.column,
        report.answered,
        report.skipped,
        report.missing_images,
        report.failures,
        report.unparsed,
        report.rows
    );
}
