//! Row sampling and category truncation applied before charting.

use std::collections::HashMap;

use polars::prelude::*;
use rand::prelude::*;
use serde::Serialize;

/// Seed for every sampled view, so a page renders the same points twice.
pub const SAMPLE_SEED: u64 = 42;

/// Label for categories outside the top K.
pub const OTHER_LABEL: &str = "Other";

/// Keep at most `limit` rows, chosen with [`SAMPLE_SEED`]. A limit of 0
/// disables sampling. Kept rows stay in their original order.
pub fn sample_rows(df: &DataFrame, limit: usize) -> PolarsResult<DataFrame> {
    if limit == 0 || df.height() <= limit {
        return Ok(df.clone());
    }
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let mut picked: Vec<IdxSize> = rand::seq::index::sample(&mut rng, df.height(), limit)
        .into_iter()
        .map(|i| i as IdxSize)
        .collect();
    picked.sort_unstable();
    df.take(&IdxCa::from_vec("sample".into(), picked))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Non-null values as display labels. Dates render as `YYYY-MM-DD`.
pub fn labels(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Counts of each distinct non-null value, most frequent first. Ties keep the
/// order of first appearance.
pub fn value_counts(series: &Series) -> PolarsResult<Vec<CategoryCount>> {
    Ok(count_labels(labels(series)?.iter().flatten().map(String::as_str)))
}

pub fn count_labels<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<CategoryCount> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        let entry = counts.entry(value).or_insert(0);
        if *entry == 0 {
            order.push(value);
        }
        *entry += 1;
    }
    let mut result: Vec<CategoryCount> = order
        .into_iter()
        .map(|v| CategoryCount {
            category: v.to_string(),
            count: counts[v],
        })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count));
    result
}

/// Keep the `k` most frequent categories and fold the rest into
/// [`OTHER_LABEL`]. The result is re-sorted by count.
pub fn truncate_top_k(counts: Vec<CategoryCount>, k: usize) -> Vec<CategoryCount> {
    if counts.len() <= k {
        return counts;
    }
    let mut iter = counts.into_iter();
    let mut kept: Vec<CategoryCount> = iter.by_ref().take(k).collect();
    let rest: usize = iter.map(|c| c.count).sum();

    match kept.iter_mut().find(|c| c.category == OTHER_LABEL) {
        Some(other) => other.count += rest,
        None => kept.push(CategoryCount {
            category: OTHER_LABEL.to_string(),
            count: rest,
        }),
    }
    kept.sort_by(|a, b| b.count.cmp(&a.count));
    kept
}

/// Replace every label outside the `k` most frequent with [`OTHER_LABEL`].
pub fn collapse_to_top_k(values: &mut [String], k: usize) {
    let counts = count_labels(values.iter().map(String::as_str));
    if counts.len() <= k {
        return;
    }
    let top: Vec<String> = counts.into_iter().take(k).map(|c| c.category).collect();
    for value in values.iter_mut() {
        if !top.contains(value) {
            *value = OTHER_LABEL.to_string();
        }
    }
}
