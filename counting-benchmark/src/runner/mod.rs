//! Response generation engine

pub mod executor;
pub mod rate_limiter;
pub mod stages;
pub mod variant;

pub use executor::{ConsoleProgress, Executor, ExecutorConfig, NoOpProgress, ProgressCallback, RowOutcome};
pub use rate_limiter::RateLimiter;
pub use stages::{load_stage_table, run_stage, Stage, StageContext, StageReport, INITIAL_ANSWER};
pub use variant::HintVariant;
