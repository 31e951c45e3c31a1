//! Bucketed RMSE of predicted counts against true counts

use serde::{Deserialize, Serialize};

use crate::runner::{HintVariant, INITIAL_ANSWER};
use crate::table::{ResultTable, TableResult, OBJECT_COUNT};

/// Upper bound (exclusive) of the small bucket
pub const SMALL_LIMIT: f64 = 20.0;
/// Upper bound (exclusive) of the medium bucket
pub const MEDIUM_LIMIT: f64 = 100.0;

/// Method label for the human baseline
pub const HUMAN_METHOD: &str = "Human";
/// Column holding human counts in the human-evaluation table
pub const HUMAN_COLUMN: &str = "human";

/// Model methods reported in the RMSE table, as `(label, column)`
pub fn model_methods() -> Vec<(&'static str, String)> {
    vec![
        ("GPT initial", INITIAL_ANSWER.to_string()),
        ("GPT all hints", HintVariant::ALL_HINTS.column_name()),
        ("GPT description", HintVariant::DESCRIPTION_ONLY.column_name()),
        ("GPT direct", HintVariant::DIRECT_ONLY.column_name()),
        ("GPT indirect", HintVariant::INDIRECT_ONLY.column_name()),
    ]
}

/// True-count range used to stratify errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Small,
    Medium,
    Large,
}

impl Bucket {
    pub fn all() -> [Bucket; 3] {
        [Bucket::Small, Bucket::Medium, Bucket::Large]
    }

    /// Bucket of a true count
    pub fn of(count: f64) -> Bucket {
        if count < SMALL_LIMIT {
            Bucket::Small
        } else if count < MEDIUM_LIMIT {
            Bucket::Medium
        } else {
            Bucket::Large
        }
    }

    /// Column header in the RMSE report
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Small => "Count < 20 performance",
            Bucket::Medium => "20 <= Count < 100 performance",
            Bucket::Large => "Count >= 100 performance",
        }
    }

    fn index(&self) -> usize {
        match self {
            Bucket::Small => 0,
            Bucket::Medium => 1,
            Bucket::Large => 2,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let range = match self {
            Bucket::Small => "count < 20",
            Bucket::Medium => "20 <= count < 100",
            Bucket::Large => "count >= 100",
        };
        write!(f, "{}", range)
    }
}

/// Root-mean-square error over `(true, predicted)` pairs.
///
/// Pairs without a prediction are ignored; `NaN` when none remain.
pub fn rmse(pairs: impl IntoIterator<Item = (f64, Option<f64>)>) -> f64 {
    let (sum, n) = pairs
        .into_iter()
        .filter_map(|(truth, predicted)| predicted.map(|p| (truth - p).powi(2)))
        .fold((0.0, 0usize), |(sum, n), sq| (sum + sq, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        (sum / n as f64).sqrt()
    }
}

/// RMSE over one slice of rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// `NaN` when no row has a prediction
    pub rmse: f64,
    /// Rows in the slice
    pub rows: usize,
    /// Rows without a prediction
    pub missing: usize,
}

impl Score {
    fn from_pairs(pairs: &[(f64, Option<f64>)]) -> Self {
        Self {
            rmse: rmse(pairs.iter().copied()),
            rows: pairs.len(),
            missing: pairs.iter().filter(|(_, p)| p.is_none()).count(),
        }
    }
}

/// Bucketed and overall RMSE for one method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRmse {
    pub method: String,
    pub column: String,
    pub small: Score,
    pub medium: Score,
    pub large: Score,
    pub overall: Score,
    /// Null predictions over the whole table, rows without a true count included
    pub missing: usize,
}

impl MethodRmse {
    pub fn bucket(&self, bucket: Bucket) -> &Score {
        match bucket {
            Bucket::Small => &self.small,
            Bucket::Medium => &self.medium,
            Bucket::Large => &self.large,
        }
    }
}

/// RMSE of `predicted_column` against `true_column`, overall and per bucket.
///
/// Rows without a true count take part in no bucket and no RMSE.
pub fn calculate_rmse_for_ranges(
    table: &ResultTable,
    method: &str,
    true_column: &str,
    predicted_column: &str,
) -> TableResult<MethodRmse> {
    let truth = table.numeric_column(true_column)?;
    let predicted = table.numeric_column(predicted_column)?;
    let missing = predicted.iter().filter(|p| p.is_none()).count();

    let pairs: Vec<(f64, Option<f64>)> = truth
        .into_iter()
        .zip(predicted)
        .filter_map(|(t, p)| t.map(|t| (t, p)))
        .collect();

    let mut by_bucket: [Vec<(f64, Option<f64>)>; 3] = Default::default();
    for pair in &pairs {
        by_bucket[Bucket::of(pair.0).index()].push(*pair);
    }

    let [small, medium, large] = by_bucket.map(|rows| Score::from_pairs(&rows));
    Ok(MethodRmse {
        method: method.to_string(),
        column: predicted_column.to_string(),
        small,
        medium,
        large,
        overall: Score::from_pairs(&pairs),
        missing,
    })
}

/// Score the human baseline (when given) and every model method whose
/// column exists in the evaluation table.
pub fn score_methods(
    human: Option<&ResultTable>,
    evaluation: &ResultTable,
) -> TableResult<Vec<MethodRmse>> {
    let mut results = Vec::new();

    if let Some(human) = human {
        results.push(calculate_rmse_for_ranges(
            human,
            HUMAN_METHOD,
            OBJECT_COUNT,
            HUMAN_COLUMN,
        )?);
    }

    for (method, column) in model_methods() {
        if !evaluation.has_column(&column) {
            tracing::warn!("Skipping {}: column {} not in evaluation table", method, column);
            continue;
        }
        results.push(calculate_rmse_for_ranges(
            evaluation,
            method,
            OBJECT_COUNT,
            &column,
        )?);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> ResultTable {
        ResultTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_rmse_known_value() {
        let value = rmse([(12.0, Some(10.0)), (15.0, Some(15.0)), (18.0, Some(20.0))]);
        assert!((value - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((value - 1.633).abs() < 1e-3);
    }

    #[test]
    fn test_rmse_skips_missing_and_empty_is_nan() {
        assert_eq!(rmse([(10.0, Some(13.0)), (50.0, None)]), 3.0);
        assert!(rmse([(10.0, None)]).is_nan());
        assert!(rmse(std::iter::empty()).is_nan());
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(Bucket::of(0.0), Bucket::Small);
        assert_eq!(Bucket::of(19.0), Bucket::Small);
        assert_eq!(Bucket::of(20.0), Bucket::Medium);
        assert_eq!(Bucket::of(99.0), Bucket::Medium);
        assert_eq!(Bucket::of(100.0), Bucket::Large);
        assert_eq!(Bucket::Medium.label(), "20 <= Count < 100 performance");
    }

    #[test]
    fn test_ranges_with_missing_predictions() {
        let t = table(
            "filename,object_count,pred\n\
             a,10,12\n\
             b,15,\n\
             c,50,40\n\
             d,60,60\n\
             e,150,\n",
        );
        let result = calculate_rmse_for_ranges(&t, "m", OBJECT_COUNT, "pred").unwrap();

        assert_eq!(result.small.rmse, 2.0);
        assert_eq!(result.small.rows, 2);
        assert_eq!(result.small.missing, 1);
        assert!((result.medium.rmse - 50.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(result.medium.missing, 0);

        // Bucket with no predictions at all
        assert!(result.large.rmse.is_nan());
        assert_eq!(result.large.missing, 1);

        assert!((result.overall.rmse - (104.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(result.missing, 2);
    }

    #[test]
    fn test_rows_without_truth_are_excluded() {
        let t = table("filename,object_count,pred\na,,5\nb,10,10\nc,,\n");
        let result = calculate_rmse_for_ranges(&t, "m", OBJECT_COUNT, "pred").unwrap();
        assert_eq!(result.overall.rows, 1);
        assert_eq!(result.overall.rmse, 0.0);
        assert_eq!(result.missing, 1);
    }

    #[test]
    fn test_score_methods_skips_absent_columns() {
        let human = table("filename,object_count,human\na,10,11\nb,200,190\n");
        let evaluation = table(
            "filename,object_count,gpt_4_initial_answer,response_desc_false_direct_true_indirect_false\n\
             a,10,10,9\n\
             b,200,150,\n",
        );

        let results = score_methods(Some(&human), &evaluation).unwrap();
        let methods: Vec<&str> = results.iter().map(|r| r.method.as_str()).collect();
        assert_eq!(methods, vec!["Human", "GPT initial", "GPT direct"]);

        assert_eq!(results[0].small.rmse, 1.0);
        assert_eq!(results[0].large.rmse, 10.0);
        assert_eq!(results[1].large.rmse, 50.0);
        assert_eq!(results[2].missing, 1);
        assert!(results[2].bucket(Bucket::Large).rmse.is_nan());
    }

    #[test]
    fn test_score_methods_without_human() {
        let evaluation = table("filename,object_count,gpt_4_initial_answer\na,3,3\n");
        let results = score_methods(None, &evaluation).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].column, INITIAL_ANSWER);
    }

    #[test]
    fn test_non_numeric_prediction_is_error() {
        let t = table("filename,object_count,pred\na,10,twelve\n");
        assert!(calculate_rmse_for_ranges(&t, "m", OBJECT_COUNT, "pred").is_err());
    }
}
