//! Distribution of true counts in the label table

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::rmse::Bucket;
use crate::table::{ResultTable, TableResult, CLASS, OBJECT_COUNT};

/// Min, quartiles and max of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiveNumber {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl FiveNumber {
    /// Quartiles use linear interpolation between order statistics.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        Some(Self {
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Overview of the selected sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountSummary {
    pub images: usize,
    /// Images per bucket, in bucket order
    pub buckets: IndexMap<Bucket, usize>,
    pub distribution: Option<FiveNumber>,
    /// Images per class, most frequent first
    pub classes: IndexMap<String, usize>,
}

/// Tally the label table by bucket and class
pub fn summarize_counts(table: &ResultTable) -> TableResult<CountSummary> {
    table.require_columns(&[OBJECT_COUNT])?;
    let counts: Vec<f64> = table.numeric_column(OBJECT_COUNT)?.into_iter().flatten().collect();

    let mut buckets: IndexMap<Bucket, usize> = Bucket::all().into_iter().map(|b| (b, 0)).collect();
    for count in &counts {
        *buckets.entry(Bucket::of(*count)).or_default() += 1;
    }

    let mut classes: IndexMap<String, usize> = IndexMap::new();
    if table.has_column(CLASS) {
        for class in table.column(CLASS)?.into_iter().flatten() {
            *classes.entry(class.to_string()).or_default() += 1;
        }
        classes.sort_by(|a_name, a_n, b_name, b_n| b_n.cmp(a_n).then_with(|| a_name.cmp(b_name)));
    }

    Ok(CountSummary {
        images: table.len(),
        buckets,
        distribution: FiveNumber::from_values(&counts),
        classes,
    })
}
