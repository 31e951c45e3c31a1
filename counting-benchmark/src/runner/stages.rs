//! Response generation stages
//!
//! Each stage walks the shared result table once, asks the model about
//! every row that still needs an answer and rewrites the table after each
//! processed row, so an interrupted run keeps everything answered so far.
//!
//! Resume policy, identical for every stage: a row is skipped when its
//! target column (or, for counting stages, the raw-answer column next to
//! it) already holds a value. Rows whose call failed or whose image was
//! missing stay empty and are attempted again on the next run. A row whose
//! answer could not be parsed keeps its raw text and is not retried.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::executor::{Executor, ProgressCallback, RowOutcome};
use super::variant::HintVariant;
use crate::extract::{Section, FULL_RESPONSE};
use crate::normalize::{format_count, normalize_count};
use crate::prompts;
use crate::providers::ImageAttachment;
use crate::table::{ResultTable, TableResult, CLASS, FILENAME};

/// Column holding the plain (hint-free) count
pub const INITIAL_ANSWER: &str = "gpt_4_initial_answer";

/// Suffix of the column that keeps the unparsed answer text
pub const RAW_SUFFIX: &str = "_raw";

/// One pass of the response generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Count without any hints
    InitialCount,
    /// Ask for description, direct hint and indirect hint
    GenerateHints,
    /// Count with the hint fields selected by the variant
    CountWithHints(HintVariant),
}

impl Stage {
    /// Column receiving this stage's result
    pub fn target_column(&self) -> String {
        match self {
            Stage::InitialCount => INITIAL_ANSWER.to_string(),
            Stage::GenerateHints => FULL_RESPONSE.to_string(),
            Stage::CountWithHints(variant) => variant.column_name(),
        }
    }

    /// Column receiving the raw answer text, for counting stages
    pub fn raw_column(&self) -> Option<String> {
        match self {
            Stage::GenerateHints => None,
            _ => Some(format!("{}{}", self.target_column(), RAW_SUFFIX)),
        }
    }

    fn required_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![FILENAME, CLASS];
        if let Stage::CountWithHints(variant) = self {
            columns.extend(variant.sections().into_iter().map(|s| s.as_str()));
        }
        columns
    }

    fn prompt(&self, table: &ResultTable, row: usize, object_name: &str) -> TableResult<String> {
        match self {
            Stage::InitialCount => Ok(prompts::basic_count_prompt(object_name)),
            Stage::GenerateHints => Ok(prompts::side_information_prompt(object_name)),
            Stage::CountWithHints(variant) => {
                // Disabled or unextracted hints become empty strings
                let hint = |section: Section| -> TableResult<String> {
                    if variant.enabled(section) {
                        Ok(table.get(row, section.as_str())?.unwrap_or_default().to_string())
                    } else {
                        Ok(String::new())
                    }
                };
                Ok(prompts::count_with_hint_prompt(
                    object_name,
                    &hint(Section::Description)?,
                    &hint(Section::DirectHint)?,
                    &hint(Section::IndirectHint)?,
                ))
            }
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::InitialCount => write!(f, "initial count"),
            Stage::GenerateHints => write!(f, "hint generation"),
            Stage::CountWithHints(variant) => write!(f, "count with hints ({})", variant),
        }
    }
}

/// Where a stage reads images and persists the table
#[derive(Debug, Clone)]
pub struct StageContext {
    pub image_dir: PathBuf,
    pub output: PathBuf,
    /// Clear the target columns and process every row
    pub force: bool,
}

/// Row tallies for one stage run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub column: String,
    pub rows: usize,
    /// Rows that reached the model and got an answer
    pub answered: usize,
    /// Rows left alone because they were already populated
    pub skipped: usize,
    pub missing_images: usize,
    pub failures: usize,
    /// Answers that did not normalize to an integer
    pub unparsed: usize,
}

impl StageReport {
    fn new(stage: &Stage, rows: usize) -> Self {
        Self {
            stage: stage.to_string(),
            column: stage.target_column(),
            rows,
            ..Default::default()
        }
    }

    fn record(&mut self, stage: &Stage, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::MissingImage => self.missing_images += 1,
            RowOutcome::Failed(_) => self.failures += 1,
            RowOutcome::Answered { count, .. } => {
                self.answered += 1;
                if stage.raw_column().is_some() && count.is_none() {
                    self.unparsed += 1;
                }
            }
        }
    }
}

/// Load the table a stage works on.
///
/// An existing output file wins over the input so that a rerun resumes
/// where the previous one stopped.
pub fn load_stage_table(input: &Path, output: &Path) -> TableResult<ResultTable> {
    if output.exists() {
        tracing::info!("Resuming from {}", output.display());
        ResultTable::read(output)
    } else {
        ResultTable::read(input)
    }
}

/// Run one stage over the table, persisting to `ctx.output` after every
/// processed row.
///
/// Only table-level problems (missing columns, unwritable output) are
/// returned as errors; per-row failures are counted in the report.
pub async fn run_stage(
    executor: &Executor,
    stage: Stage,
    table: &mut ResultTable,
    ctx: &StageContext,
    progress: &dyn ProgressCallback,
) -> TableResult<StageReport> {
    table.require_columns(&stage.required_columns())?;

    let target = stage.target_column();
    let raw = stage.raw_column();
    for column in std::iter::once(&target).chain(raw.as_ref()) {
        if ctx.force {
            table.clear_column(column);
        } else {
            table.ensure_column(column);
        }
    }

    tracing::info!(
        "Running {} with {} ({}) over {} rows",
        stage,
        executor.provider_name(),
        executor.model(),
        table.len()
    );

    let mut report = StageReport::new(&stage, table.len());
    let total = table.len();

    for row in 0..total {
        let filename = table.get(row, FILENAME)?.unwrap_or_default().to_string();

        let done = table.get(row, &target)?.is_some()
            || match &raw {
                Some(raw) => table.get(row, raw)?.is_some(),
                None => false,
            };

        let outcome = if done {
            RowOutcome::Skipped
        } else {
            let outcome = process_row(executor, &stage, table, row, &filename, ctx).await?;
            table.write(&ctx.output)?;
            outcome
        };

        report.record(&stage, &outcome);
        progress.on_row_complete(&filename, &outcome);
        progress.on_progress(row + 1, total);
    }

    // Also materializes new columns when every row was skipped
    table.write(&ctx.output)?;

    tracing::info!(
        "Finished {}: {} answered, {} skipped, {} missing images, {} failures, {} unparsed",
        stage,
        report.answered,
        report.skipped,
        report.missing_images,
        report.failures,
        report.unparsed
    );

    Ok(report)
}

async fn process_row(
    executor: &Executor,
    stage: &Stage,
    table: &mut ResultTable,
    row: usize,
    filename: &str,
    ctx: &StageContext,
) -> TableResult<RowOutcome> {
    let image_path = ctx.image_dir.join(filename);
    if filename.is_empty() || !image_path.is_file() {
        tracing::warn!("Image {} not found at {}", filename, image_path.display());
        return Ok(RowOutcome::MissingImage);
    }

    let image = match ImageAttachment::from_path(&image_path) {
        Ok(image) => image,
        Err(e) => {
            tracing::error!("Error reading {}: {}", image_path.display(), e);
            return Ok(RowOutcome::Failed(e.to_string()));
        }
    };

    let object_name = table.get(row, CLASS)?.unwrap_or_default().to_string();
    let prompt = stage.prompt(table, row, &object_name)?;

    let text = match executor.ask(&prompt, image).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Error processing {}: {}", image_path.display(), e);
            return Ok(RowOutcome::Failed(e.to_string()));
        }
    };
    tracing::debug!("{} -> {:?}", filename, text);

    let target = stage.target_column();
    let count = match stage.raw_column() {
        Some(raw) => {
            let count = normalize_count(Some(&text));
            if count.is_none() {
                tracing::warn!("Non-numeric answer for {}: {:?}", filename, text);
            }
            table.set(row, &raw, Some(&text))?;
            table.set(row, &target, format_count(count).as_deref())?;
            count
        }
        None => {
            table.set(row, &target, Some(&text))?;
            None
        }
    };

    Ok(RowOutcome::Answered { text, count })
}
