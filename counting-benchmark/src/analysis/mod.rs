//! Error analysis of recorded counts

pub mod rmse;
pub mod summary;

pub use rmse::{
    calculate_rmse_for_ranges, model_methods, rmse, score_methods, Bucket, MethodRmse, Score,
    HUMAN_COLUMN, HUMAN_METHOD,
};
pub use summary::{summarize_counts, CountSummary, FiveNumber};
