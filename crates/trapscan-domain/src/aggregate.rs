//! Multi-pass aggregation
//!
//! Reduces the outcomes of several independent oracle passes per category
//! into one `AggregatedCount` per category plus an image-level completeness
//! rating. Failed passes are simply excluded from their category's value
//! list; a category with zero usable values is omitted entirely — absence
//! means "unknown", not "none observed".

use std::collections::BTreeMap;

use trapscan_types::{AggregatedCount, Category, Completeness, Consistency, PassOutcome};

/// Result of aggregating one image's pass outcomes
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// One entry per category that kept at least one usable value
    pub counts: Vec<AggregatedCount>,
    pub completeness: Completeness,
}

/// Median of a list of pass values.
///
/// Odd length: the middle value. Even length: the average of the two middle
/// values rounded to the nearest integer, halves rounding up. Returns `None`
/// for an empty list.
pub fn median(values: &[u32]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let a = u64::from(sorted[mid - 1]);
        let b = u64::from(sorted[mid]);
        Some(((a + b + 1) / 2) as u32)
    }
}

/// Classify pass agreement from the spread of the values around the median.
///
/// Spread bounds are `ceil(count / 10)` for high and `ceil(3 * count / 10)`
/// for medium. A zero median is `High` only when every pass reported zero.
pub fn consistency(count: u32, values: &[u32]) -> Consistency {
    let max = values.iter().copied().max().unwrap_or(0);
    let min = values.iter().copied().min().unwrap_or(0);
    let spread = max - min;

    if count == 0 {
        return if max == 0 {
            Consistency::High
        } else {
            Consistency::Low
        };
    }

    // Bounds in u64: 3 * count would overflow u32 for counts near the top
    // of the range.
    let count = u64::from(count);
    let spread = u64::from(spread);
    let high_bound = (count + 9) / 10;
    let medium_bound = (3 * count + 9) / 10;
    if spread <= high_bound {
        Consistency::High
    } else if spread <= medium_bound {
        Consistency::Medium
    } else {
        Consistency::Low
    }
}

/// Reduce one image's pass outcomes to aggregated counts.
///
/// Pure reduction: call it once after every pass has resolved or timed out.
/// The order of a category's outcomes does not affect the result.
pub fn aggregate(passes_by_category: &BTreeMap<Category, Vec<PassOutcome>>) -> Aggregation {
    let mut counts = Vec::new();
    let mut any_failure = false;
    let mut any_category_lost = false;

    for (&category, outcomes) in passes_by_category {
        let mut values: Vec<u32> = Vec::new();
        let mut confidences: Vec<f64> = Vec::new();

        for outcome in outcomes {
            match outcome {
                PassOutcome::Counted {
                    raw_count,
                    confidence,
                } => {
                    values.push(*raw_count);
                    if let Some(c) = confidence {
                        confidences.push(*c);
                    }
                }
                PassOutcome::Failed(_) => any_failure = true,
            }
        }

        let Some(count) = median(&values) else {
            // No usable value for this category: omit it, never default to 0
            any_category_lost = true;
            continue;
        };

        let confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        };

        counts.push(AggregatedCount {
            category,
            count,
            confidence,
            consistency: consistency(count, &values),
            pass_values: values,
        });
    }

    let completeness = if any_category_lost {
        Completeness::Failed
    } else if any_failure {
        Completeness::Degraded
    } else {
        Completeness::Complete
    };

    Aggregation {
        counts,
        completeness,
    }
}
