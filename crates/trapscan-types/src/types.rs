//! Core data model for scan monitoring

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{OracleError, ThresholdError};

/// A counted category: a pest species on a sticky trap, or a cell class
/// on a germination tray. Fixed set, stable identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Aphid,
    Whitefly,
    Thrips,
    FungusGnat,
    SpiderMite,
    Germinated,
    Ungerminated,
    AbnormalSprout,
}

impl Category {
    /// Get display label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Aphid => "aphid",
            Category::Whitefly => "whitefly",
            Category::Thrips => "thrips",
            Category::FungusGnat => "fungus gnat",
            Category::SpiderMite => "spider mite",
            Category::Germinated => "germinated",
            Category::Ungerminated => "ungerminated",
            Category::AbnormalSprout => "abnormal sprout",
        }
    }

    /// Whether this category is a trap pest (as opposed to a tray cell class)
    pub fn is_pest(&self) -> bool {
        matches!(
            self,
            Category::Aphid
                | Category::Whitefly
                | Category::Thrips
                | Category::FungusGnat
                | Category::SpiderMite
        )
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Why a single oracle pass produced no usable count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassFailure {
    /// Pass exceeded its timeout
    Timeout,
    /// Response payload could not be parsed into an observation
    Malformed,
    /// Oracle process/network failure
    Unavailable,
}

impl From<&OracleError> for PassFailure {
    fn from(err: &OracleError) -> Self {
        match err {
            OracleError::Timeout => PassFailure::Timeout,
            OracleError::Malformed(_) => PassFailure::Malformed,
            OracleError::Unavailable(_) => PassFailure::Unavailable,
        }
    }
}

/// Outcome of one oracle pass for one category on one image.
///
/// Ephemeral: exists only between fan-out and aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Counted {
        raw_count: u32,
        #[serde(default)]
        confidence: Option<f64>,
    },
    Failed(PassFailure),
}

impl PassOutcome {
    pub fn counted(raw_count: u32) -> Self {
        PassOutcome::Counted {
            raw_count,
            confidence: None,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, PassOutcome::Counted { .. })
    }
}

/// Qualitative agreement level among a category's passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    High,
    Medium,
    Low,
}

impl Consistency {
    pub fn label(&self) -> &'static str {
        match self {
            Consistency::High => "high",
            Consistency::Medium => "medium",
            Consistency::Low => "low",
        }
    }
}

/// Whether all, some, or none of an image's configured passes succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Every configured pass across every category succeeded
    Complete,
    /// Some passes failed, but every affected category kept at least one value
    Degraded,
    /// At least one category has zero usable values
    Failed,
}

impl Completeness {
    pub fn label(&self) -> &'static str {
        match self {
            Completeness::Complete => "complete",
            Completeness::Degraded => "degraded",
            Completeness::Failed => "failed",
        }
    }
}

/// Robust count for one category, reduced from multiple oracle passes.
///
/// Created once per scan per category at analysis time; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCount {
    pub category: Category,
    /// Median of the usable pass values
    pub count: u32,
    /// Mean of the confidences the usable passes reported, if any did
    #[serde(default)]
    pub confidence: Option<f64>,
    pub consistency: Consistency,
    /// Raw pass values actually used for the median
    pub pass_values: Vec<u32>,
}

/// Severity tier, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Safe,
    Watch,
    Action,
    Critical,
}

impl AlertLevel {
    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::Safe => "safe",
            AlertLevel::Watch => "watch",
            AlertLevel::Action => "action",
            AlertLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-category alert thresholds with `watch <= action <= critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub category: Category,
    pub watch: u32,
    pub action: u32,
    pub critical: u32,
}

impl ThresholdConfig {
    /// Build a config, rejecting non-monotonic bounds
    pub fn new(
        category: Category,
        watch: u32,
        action: u32,
        critical: u32,
    ) -> std::result::Result<Self, ThresholdError> {
        let config = Self {
            category,
            watch,
            action,
            critical,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the monotonicity invariant
    pub fn validate(&self) -> std::result::Result<(), ThresholdError> {
        if self.watch <= self.action && self.action <= self.critical {
            Ok(())
        } else {
            Err(ThresholdError::NonMonotonic {
                category: self.category,
                watch: self.watch,
                action: self.action,
                critical: self.critical,
            })
        }
    }
}

/// Kind of monitored subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// Sticky pest trap
    Trap,
    /// Seed tray / germination lot
    SeedTray,
}

impl SubjectKind {
    pub fn label(&self) -> &'static str {
        match self {
            SubjectKind::Trap => "trap",
            SubjectKind::SeedTray => "seed tray",
        }
    }
}

/// A monitored trap or seed tray
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// Unique identifier
    pub id: String,
    /// Display name (e.g., "Greenhouse 2, bench A")
    pub name: String,
    pub kind: SubjectKind,
    /// Free-text location
    #[serde(default)]
    pub location: Option<String>,
    /// Notes/memo
    #[serde(default)]
    pub notes: Option<String>,
    /// When registered
    pub registered_at: DateTime<Utc>,
}

impl SubjectRecord {
    pub fn new(name: String, kind: SubjectKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            kind,
            location: None,
            notes: None,
            registered_at: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: String) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }
}

/// One stored scan of one subject.
///
/// `alert_level` is a capture-time snapshot against the thresholds in effect
/// when the scan was saved; later threshold edits never rewrite it. Only
/// `notes` may change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Unique identifier
    pub id: String,
    /// Trap or seed-tray id
    pub subject_id: String,
    /// SHA256 of the scanned image, when known
    #[serde(default)]
    pub image_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub aggregated_counts: Vec<AggregatedCount>,
    /// Sum of the aggregated counts
    pub total_count: u32,
    /// Alert level computed at save time
    pub alert_level: AlertLevel,
    pub completeness: Completeness,
    /// Free-text notes, the only mutable field
    #[serde(default)]
    pub notes: Option<String>,
}

impl ScanRecord {
    pub fn new(
        subject_id: String,
        timestamp: DateTime<Utc>,
        aggregated_counts: Vec<AggregatedCount>,
        alert_level: AlertLevel,
        completeness: Completeness,
    ) -> Self {
        let total_count = aggregated_counts.iter().map(|c| c.count).sum();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject_id,
            image_hash: None,
            timestamp,
            aggregated_counts,
            total_count,
            alert_level,
            completeness,
            notes: None,
        }
    }

    pub fn with_image_hash(mut self, hash: String) -> Self {
        self.image_hash = Some(hash);
        self
    }

    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Count for one category, if it was usable in this scan
    pub fn count_for(&self, category: Category) -> Option<u32> {
        self.aggregated_counts
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.count)
    }
}

/// Range specifier for trend queries. The unit doubles as the bucket
/// granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSpec {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
}

impl RangeSpec {
    /// Number of buckets the range spans
    pub fn bucket_count(&self) -> u32 {
        match self {
            RangeSpec::Days(n)
            | RangeSpec::Weeks(n)
            | RangeSpec::Months(n)
            | RangeSpec::Years(n) => *n,
        }
    }
}

/// One fixed, non-overlapping trend window with summed counts.
///
/// Ephemeral: recomputed on demand from a scan collection. `window_end` is
/// exclusive; the newest bucket's end is the query's `now` and may make it a
/// partial window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub per_category: BTreeMap<Category, u64>,
    pub total: u64,
}

impl TrendBucket {
    /// Empty bucket over a window
    pub fn empty(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Self {
        Self {
            window_start,
            window_end,
            per_category: BTreeMap::new(),
            total: 0,
        }
    }

    /// Whether a timestamp falls inside this bucket's half-open window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.window_start && at < self.window_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_monotonic_accepted() {
        let cfg = ThresholdConfig::new(Category::Aphid, 5, 15, 30).unwrap();
        assert_eq!(cfg.watch, 5);
        assert_eq!(cfg.critical, 30);
    }

    #[test]
    fn test_threshold_equal_bounds_accepted() {
        assert!(ThresholdConfig::new(Category::Thrips, 10, 10, 10).is_ok());
    }

    #[test]
    fn test_threshold_non_monotonic_rejected() {
        let err = ThresholdConfig::new(Category::Aphid, 15, 5, 30);
        assert!(err.is_err());
        assert!(ThresholdConfig::new(Category::Aphid, 5, 31, 30).is_err());
    }

    #[test]
    fn test_alert_level_ordering() {
        assert!(AlertLevel::Safe < AlertLevel::Watch);
        assert!(AlertLevel::Watch < AlertLevel::Action);
        assert!(AlertLevel::Action < AlertLevel::Critical);
    }

    #[test]
    fn test_scan_record_total() {
        let counts = vec![
            AggregatedCount {
                category: Category::Aphid,
                count: 12,
                confidence: None,
                consistency: Consistency::High,
                pass_values: vec![12, 12, 12],
            },
            AggregatedCount {
                category: Category::Thrips,
                count: 3,
                confidence: None,
                consistency: Consistency::High,
                pass_values: vec![3, 3, 3],
            },
        ];
        let record = ScanRecord::new(
            "trap-1".to_string(),
            Utc::now(),
            counts,
            AlertLevel::Watch,
            Completeness::Complete,
        );
        assert_eq!(record.total_count, 15);
        assert_eq!(record.count_for(Category::Aphid), Some(12));
        assert_eq!(record.count_for(Category::Whitefly), None);
    }
}
