//! Query Service - Read-Only Access to Stored Data
//!
//! - scan history, per subject or global
//! - trend building over stored scans
//! - what-if reclassification of a stored scan under the current thresholds
//!   (never mutates the record; the stored alert level stays a capture-time
//!   snapshot)
//! - subject and threshold management

use chrono::{DateTime, Utc, Weekday};
use thiserror::Error;

use trapscan_domain::{build_trend, classify, Classification};
use trapscan_store::{ScanStore, SubjectStore, ThresholdStore};
use trapscan_types::{
    Category, RangeSpec, ScanRecord, SubjectRecord, ThresholdConfig, ThresholdError, TrendBucket,
};

use crate::config::Config;

/// Errors specific to the query service
#[derive(Debug, Error)]
pub enum QueryServiceError {
    #[error("Store not accessible: {0}")]
    StoreError(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Invalid threshold configuration: {0}")]
    InvalidThresholds(ThresholdError),
}

impl From<trapscan_types::Error> for QueryServiceError {
    fn from(err: trapscan_types::Error) -> Self {
        match err {
            trapscan_types::Error::Threshold(e) => {
                QueryServiceError::InvalidThresholds(e)
            }
            other => QueryServiceError::StoreError(other.to_string()),
        }
    }
}

// ============================================================================
// Scan history
// ============================================================================

/// Get scan history, most recent first, optionally per subject
pub fn get_scan_history(
    config: &Config,
    subject_id: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<ScanRecord>, QueryServiceError> {
    let store = open_scan_store(config)?;
    let scans: Vec<ScanRecord> = match subject_id {
        Some(id) => store.scans_for_subject(id).into_iter().cloned().collect(),
        None => store.all_scans().into_iter().cloned().collect(),
    };

    Ok(match limit {
        Some(n) => scans.into_iter().take(n).collect(),
        None => scans,
    })
}

/// Get a scan by id
pub fn get_scan(config: &Config, id: &str) -> Result<ScanRecord, QueryServiceError> {
    let store = open_scan_store(config)?;
    store
        .get_scan(id)
        .cloned()
        .ok_or_else(|| QueryServiceError::NotFound(format!("scan {id}")))
}

/// Update a scan's notes, the only permitted mutation of stored history
pub fn update_scan_notes(
    config: &Config,
    id: &str,
    notes: Option<String>,
) -> Result<(), QueryServiceError> {
    let mut store = open_scan_store(config)?;
    store.update_notes(id, notes).map_err(Into::into)
}

// ============================================================================
// Trends
// ============================================================================

/// Build a trend for one subject over a range ending at `now`.
///
/// `now` is explicit for reproducibility; callers wanting wall-clock trends
/// pass `Utc::now()` themselves.
pub fn trend_for_subject(
    config: &Config,
    subject_id: &str,
    range: RangeSpec,
    now: DateTime<Utc>,
    week_start: Weekday,
) -> Result<Vec<TrendBucket>, QueryServiceError> {
    let store = open_scan_store(config)?;
    let scans: Vec<ScanRecord> = store
        .scans_for_subject(subject_id)
        .into_iter()
        .cloned()
        .collect();
    Ok(build_trend(&scans, range, now, week_start))
}

/// Build a trend across every stored scan
pub fn trend_all(
    config: &Config,
    range: RangeSpec,
    now: DateTime<Utc>,
    week_start: Weekday,
) -> Result<Vec<TrendBucket>, QueryServiceError> {
    let store = open_scan_store(config)?;
    let scans: Vec<ScanRecord> = store.all_scans().into_iter().cloned().collect();
    Ok(build_trend(&scans, range, now, week_start))
}

// ============================================================================
// Reclassification (what-if)
// ============================================================================

/// Classify a stored scan under the thresholds configured right now.
///
/// Answers "what would this scan's alert be under today's thresholds"
/// without touching the stored capture-time snapshot.
pub fn reclassify_scan(
    config: &Config,
    scan_id: &str,
) -> Result<Classification, QueryServiceError> {
    let scan = get_scan(config, scan_id)?;
    let thresholds = open_threshold_store(config)?.snapshot();
    Ok(classify(&scan.aggregated_counts, &thresholds))
}

// ============================================================================
// Thresholds
// ============================================================================

/// Current threshold snapshot, ordered by category
pub fn get_thresholds(config: &Config) -> Result<Vec<ThresholdConfig>, QueryServiceError> {
    Ok(open_threshold_store(config)?.snapshot())
}

/// Set a category's thresholds; invalid configs block the write
pub fn set_thresholds(
    config: &Config,
    thresholds: ThresholdConfig,
) -> Result<(), QueryServiceError> {
    let mut store = open_threshold_store(config)?;
    store.set(thresholds).map_err(Into::into)
}

/// Remove a category's thresholds
pub fn remove_thresholds(
    config: &Config,
    category: Category,
) -> Result<bool, QueryServiceError> {
    let mut store = open_threshold_store(config)?;
    store.remove(category).map_err(Into::into)
}

// ============================================================================
// Subjects
// ============================================================================

/// All registered subjects sorted by name
pub fn get_subjects(config: &Config) -> Result<Vec<SubjectRecord>, QueryServiceError> {
    let store = open_subject_store(config)?;
    Ok(store.all_subjects().into_iter().cloned().collect())
}

/// Register a subject, returning its id
pub fn add_subject(
    config: &Config,
    subject: SubjectRecord,
) -> Result<String, QueryServiceError> {
    let mut store = open_subject_store(config)?;
    store.add_subject(subject).map_err(Into::into)
}

/// Remove a subject by id
pub fn remove_subject(config: &Config, id: &str) -> Result<bool, QueryServiceError> {
    let mut store = open_subject_store(config)?;
    store.remove_subject(id).map_err(Into::into)
}

// ============================================================================
// Helper functions
// ============================================================================

fn open_scan_store(config: &Config) -> Result<ScanStore, QueryServiceError> {
    let dir = config
        .store_dir()
        .map_err(|e| QueryServiceError::StoreError(e.to_string()))?;
    ScanStore::open(dir).map_err(|e| QueryServiceError::StoreError(e.to_string()))
}

fn open_threshold_store(config: &Config) -> Result<ThresholdStore, QueryServiceError> {
    let dir = config
        .store_dir()
        .map_err(|e| QueryServiceError::StoreError(e.to_string()))?;
    ThresholdStore::open(dir).map_err(|e| QueryServiceError::StoreError(e.to_string()))
}

fn open_subject_store(config: &Config) -> Result<SubjectStore, QueryServiceError> {
    let dir = config
        .store_dir()
        .map_err(|e| QueryServiceError::StoreError(e.to_string()))?;
    SubjectStore::open(dir).map_err(|e| QueryServiceError::StoreError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use trapscan_types::{
        AggregatedCount, AlertLevel, Completeness, Consistency, SubjectKind,
    };

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            store_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    fn stored_scan(config: &Config, subject: &str, count: u32) -> String {
        let mut store = open_scan_store(config).unwrap();
        let record = ScanRecord::new(
            subject.to_string(),
            Utc::now(),
            vec![AggregatedCount {
                category: Category::Aphid,
                count,
                confidence: None,
                consistency: Consistency::High,
                pass_values: vec![count],
            }],
            AlertLevel::Safe,
            Completeness::Complete,
        );
        store.add_scan(record).unwrap()
    }

    #[test]
    fn test_reclassify_does_not_mutate_history() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        // Saved while no thresholds existed: capture-time level is safe
        let id = stored_scan(&config, "trap-1", 20);

        set_thresholds(
            &config,
            ThresholdConfig::new(Category::Aphid, 5, 15, 30).unwrap(),
        )
        .unwrap();

        let what_if = reclassify_scan(&config, &id).unwrap();
        assert_eq!(what_if.scan_level, AlertLevel::Action);

        // Stored record keeps its capture-time snapshot
        let stored = get_scan(&config, &id).unwrap();
        assert_eq!(stored.alert_level, AlertLevel::Safe);
    }

    #[test]
    fn test_history_limit_and_subject_filter() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        stored_scan(&config, "trap-1", 1);
        stored_scan(&config, "trap-1", 2);
        stored_scan(&config, "trap-2", 3);

        assert_eq!(get_scan_history(&config, None, None).unwrap().len(), 3);
        assert_eq!(
            get_scan_history(&config, Some("trap-1"), None).unwrap().len(),
            2
        );
        assert_eq!(get_scan_history(&config, None, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_subject_roundtrip() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let id = add_subject(
            &config,
            SubjectRecord::new("bench A".to_string(), SubjectKind::Trap),
        )
        .unwrap();
        assert_eq!(get_subjects(&config).unwrap().len(), 1);
        assert!(remove_subject(&config, &id).unwrap());
        assert!(get_subjects(&config).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_thresholds_surface_distinctly() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let invalid = ThresholdConfig {
            category: Category::Aphid,
            watch: 9,
            action: 3,
            critical: 1,
        };
        let err = set_thresholds(&config, invalid).unwrap_err();
        assert!(matches!(err, QueryServiceError::InvalidThresholds(_)));
    }
}
