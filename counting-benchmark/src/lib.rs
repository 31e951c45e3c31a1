//! Object-counting evaluation harness for multimodal LLMs
//!
//! Measures how well a vision model counts objects in images, with and
//! without side information (a description, a direct hint and an indirect
//! hint) that the model generated about the same image beforehand.
//!
//! # Pipeline
//!
//! - select a reproducible image sample and its true counts
//! - ask for a plain count, then for the three hint fields
//! - split the hint response into per-section columns
//! - ask again with each hint combination
//! - score every method by RMSE within count buckets
//!
//! All stages share one CSV table keyed by `filename` and persist it after
//! each row, so a rerun picks up where an interrupted one stopped.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use counting_benchmark::{
//!     config::Config,
//!     providers::create_provider,
//!     runner::{run_stage, Executor, ExecutorConfig, NoOpProgress, Stage, StageContext},
//!     table::ResultTable,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default()?;
//!     let provider = create_provider(&config.provider)?;
//!     let executor = Executor::new(provider, ExecutorConfig::from(&config.run));
//!
//!     let mut table = ResultTable::read(&config.paths.labels_csv)?;
//!     let ctx = StageContext {
//!         image_dir: config.paths.image_dir.clone(),
//!         output: PathBuf::from("results/gpt4_evaluation.csv"),
//!         force: false,
//!     };
//!     let report = run_stage(&executor, Stage::InitialCount, &mut table, &ctx, &NoOpProgress).await?;
//!     println!("{} answered", report.answered);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod extract;
pub mod normalize;
pub mod prompts;
pub mod providers;
pub mod reporting;
pub mod runner;
pub mod table;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{score_methods, summarize_counts, Bucket, CountSummary, MethodRmse};
    pub use crate::config::Config;
    pub use crate::dataset::{DatasetError, DatasetSelector};
    pub use crate::extract::{extract_section, split_responses, HintBundle, Section};
    pub use crate::normalize::normalize_count;
    pub use crate::providers::{
        create_provider, CompletionRequest, CompletionResponse, ImageAttachment, LLMProvider,
        Message, ProviderError, ProviderResult,
    };
    pub use crate::reporting::{print_console_report, update_rmse_report, JsonSummary};
    pub use crate::runner::{
        run_stage, Executor, ExecutorConfig, HintVariant, Stage, StageContext, StageReport,
    };
    pub use crate::table::{ResultTable, TableError};
}
