//! Alert classification
//!
//! Maps aggregated counts through per-category threshold configuration into
//! severity tiers, then reduces a scan's categories to one overall level.
//! Pure over its inputs, so a stored scan can be re-derived later against
//! any threshold snapshot without touching history.

use std::collections::BTreeMap;

use trapscan_types::{AggregatedCount, AlertLevel, Category, ThresholdConfig};

/// Classification of one scan's aggregated counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub per_category: BTreeMap<Category, AlertLevel>,
    /// Maximum tier across the categories present in the scan
    pub scan_level: AlertLevel,
}

/// Severity tier for a count under one config. Monotonic non-decreasing in
/// the count.
pub fn tier(count: u32, config: &ThresholdConfig) -> AlertLevel {
    if count >= config.critical {
        AlertLevel::Critical
    } else if count >= config.action {
        AlertLevel::Action
    } else if count >= config.watch {
        AlertLevel::Watch
    } else {
        AlertLevel::Safe
    }
}

/// Classify a scan's counts against a threshold snapshot.
///
/// A category with no matching config defaults to `Safe`; an empty count
/// set yields an overall `Safe`.
pub fn classify(counts: &[AggregatedCount], thresholds: &[ThresholdConfig]) -> Classification {
    let mut per_category = BTreeMap::new();
    let mut scan_level = AlertLevel::Safe;

    for aggregated in counts {
        let level = thresholds
            .iter()
            .find(|t| t.category == aggregated.category)
            .map(|t| tier(aggregated.count, t))
            .unwrap_or(AlertLevel::Safe);
        scan_level = scan_level.max(level);
        per_category.insert(aggregated.category, level);
    }

    Classification {
        per_category,
        scan_level,
    }
}
