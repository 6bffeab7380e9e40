//! Scan Service - Core Use Case for Trap / Seed-Tray Image Analysis
//!
//! This service orchestrates the complete scan workflow:
//! 1. Validate the input image
//! 2. Verify the subject exists
//! 3. Fan out the configured oracle passes per category
//! 4. Aggregate pass outcomes into robust counts
//! 5. Classify against the current threshold snapshot
//! 6. Build and persist the scan record (capture-time alert level)
//! 7. Return the outcome
//!
//! A scan where every category lost every pass is a retryable error and
//! stores nothing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::info;
use thiserror::Error;

use trapscan_domain::{aggregate, classify};
use trapscan_oracle::{run_passes, CommandOracle, OracleClient, PassPlan};
use trapscan_store::{hash_image, ScanStore, SubjectStore, ThresholdStore};
use trapscan_types::{AlertLevel, Category, Error, ScanRecord, SubjectKind};

use crate::config::Config;
use crate::scanner::validate_image;

/// Errors specific to the scan service
#[derive(Debug, Error)]
pub enum ScanServiceError {
    #[error("Image validation failed: {0}")]
    InvalidImage(String),

    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("Oracle configuration error: {0}")]
    OracleConfig(String),

    /// Every category lost every pass; retry explicitly
    #[error("Scan failed, no usable oracle passes: {0}")]
    ScanFailed(String),

    #[error("Store error: {0}")]
    StoreError(String),
}

impl From<Error> for ScanServiceError {
    fn from(err: Error) -> Self {
        match err {
            Error::FileNotFound(msg) | Error::InvalidImageFormat(msg) => {
                ScanServiceError::InvalidImage(msg)
            }
            Error::ScanFailed(msg) => ScanServiceError::ScanFailed(msg),
            _ => ScanServiceError::StoreError(err.to_string()),
        }
    }
}

/// Options for one scan
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Categories to count; empty means all pest categories
    pub categories: Vec<Category>,

    /// Override the configured passes per category
    pub passes: Option<u32>,

    /// Seed the oracle with the previous scan's counts as hints
    pub use_hints: bool,

    /// Notes to attach to the stored record
    pub notes: Option<String>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_passes(mut self, passes: u32) -> Self {
        self.passes = Some(passes.max(1));
        self
    }

    pub fn with_hints(mut self, use_hints: bool) -> Self {
        self.use_hints = use_hints;
        self
    }

    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }
}

/// Progress callback for verbose output
pub type ProgressCallback = Box<dyn Fn(&str) + Send>;

/// Result of one completed scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// The stored record
    pub record: ScanRecord,
    /// Per-category tiers under the snapshot used at save time
    pub per_category: BTreeMap<Category, AlertLevel>,
}

/// Run a scan with the oracle client built from configuration
pub async fn run_scan(
    image_path: &Path,
    subject_id: &str,
    config: &Config,
    options: &ScanOptions,
    progress: Option<ProgressCallback>,
) -> Result<ScanOutcome, ScanServiceError> {
    let client = CommandOracle::new(&config.oracle_command, config.model.as_deref())
        .map_err(|e| ScanServiceError::OracleConfig(e.to_string()))?;
    run_scan_with_client(image_path, subject_id, config, options, Arc::new(client), progress).await
}

/// Run a scan with an explicit oracle client (injection point for tests)
pub async fn run_scan_with_client(
    image_path: &Path,
    subject_id: &str,
    config: &Config,
    options: &ScanOptions,
    client: Arc<dyn OracleClient>,
    progress: Option<ProgressCallback>,
) -> Result<ScanOutcome, ScanServiceError> {
    let notify = |msg: &str| {
        if let Some(ref cb) = progress {
            cb(msg);
        }
    };

    // Step 1: Validate image
    validate_image(image_path)?;

    // Step 2: Verify subject
    let store_dir = config
        .store_dir()
        .map_err(|e| ScanServiceError::StoreError(e.to_string()))?;
    let subject_store = SubjectStore::open(store_dir.clone())
        .map_err(|e| ScanServiceError::StoreError(e.to_string()))?;
    let subject_kind = subject_store
        .get_subject(subject_id)
        .map(|s| s.kind)
        .ok_or_else(|| ScanServiceError::UnknownSubject(subject_id.to_string()))?;

    let mut scan_store = ScanStore::open(store_dir.clone())
        .map_err(|e| ScanServiceError::StoreError(e.to_string()))?;

    // Step 3: Fan out passes
    let categories: Vec<Category> = if options.categories.is_empty() {
        default_categories(subject_kind)
    } else {
        options.categories.clone()
    };

    let hints: BTreeMap<Category, u32> = if options.use_hints {
        scan_store
            .latest_for_subject(subject_id)
            .map(|previous| {
                previous
                    .aggregated_counts
                    .iter()
                    .map(|c| (c.category, c.count))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        BTreeMap::new()
    };

    let plan = PassPlan {
        passes_per_category: options.passes.unwrap_or(config.passes_per_scan).max(1),
        pass_timeout: Duration::from_secs(config.pass_timeout_secs),
    };

    notify(&format!(
        "Running {} passes for {} categories...",
        plan.passes_per_category,
        categories.len()
    ));
    let outcomes = run_passes(client, image_path, &categories, &hints, &plan).await;

    // Step 4: Aggregate
    notify("Aggregating pass results...");
    let aggregation = aggregate(&outcomes);
    if aggregation.counts.is_empty() && !categories.is_empty() {
        return Err(ScanServiceError::ScanFailed(format!(
            "no usable oracle passes for {}",
            image_path.display()
        )));
    }

    // Step 5: Classify against the current threshold snapshot
    let threshold_store = ThresholdStore::open(store_dir)
        .map_err(|e| ScanServiceError::StoreError(e.to_string()))?;
    let snapshot = threshold_store.snapshot();
    let classification = classify(&aggregation.counts, &snapshot);

    // Step 6: Build and persist the record
    let mut record = ScanRecord::new(
        subject_id.to_string(),
        Utc::now(),
        aggregation.counts,
        classification.scan_level,
        aggregation.completeness,
    );
    if let Ok(hash) = hash_image(image_path) {
        record = record.with_image_hash(hash);
    }
    if let Some(ref notes) = options.notes {
        record = record.with_notes(notes.clone());
    }

    scan_store
        .add_scan(record.clone())
        .map_err(|e| ScanServiceError::StoreError(e.to_string()))?;

    info!(
        "scan {} for subject {}: total {} alert {} ({})",
        record.id,
        subject_id,
        record.total_count,
        record.alert_level,
        record.completeness.label()
    );

    Ok(ScanOutcome {
        record,
        per_category: classification.per_category,
    })
}

/// Categories counted when the caller does not name any
fn default_categories(kind: SubjectKind) -> Vec<Category> {
    match kind {
        SubjectKind::Trap => vec![
            Category::Aphid,
            Category::Whitefly,
            Category::Thrips,
            Category::FungusGnat,
            Category::SpiderMite,
        ],
        SubjectKind::SeedTray => vec![
            Category::Germinated,
            Category::Ungerminated,
            Category::AbnormalSprout,
        ],
    }
}
