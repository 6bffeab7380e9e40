//! End-to-end scan service tests with a mock oracle and temp stores

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use trapscan_app::{run_scan_with_client, Config, ScanOptions, ScanServiceError};
use trapscan_oracle::{OracleClient, OracleObservation, OracleRequest};
use trapscan_store::{ScanStore, SubjectStore, ThresholdStore};
use trapscan_types::{
    AlertLevel, Category, Completeness, OracleError, SubjectKind, SubjectRecord, ThresholdConfig,
};

/// Oracle returning scripted counts in call order
struct ScriptedOracle {
    counts: Vec<Result<u32, ()>>,
    next: AtomicUsize,
}

impl ScriptedOracle {
    fn new(counts: Vec<Result<u32, ()>>) -> Arc<Self> {
        Arc::new(Self {
            counts,
            next: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl OracleClient for ScriptedOracle {
    async fn count(&self, _request: &OracleRequest) -> Result<OracleObservation, OracleError> {
        let idx = self.next.fetch_add(1, Ordering::SeqCst) % self.counts.len();
        match self.counts[idx] {
            Ok(count) => Ok(OracleObservation {
                raw_count: count,
                locations: Vec::new(),
                confidence: Some(0.9),
            }),
            Err(()) => Err(OracleError::Unavailable("scripted outage".to_string())),
        }
    }
}

fn test_image(dir: &Path) -> PathBuf {
    let path = dir.join("trap.png");
    image::RgbImage::new(8, 8).save(&path).unwrap();
    path
}

fn setup() -> (TempDir, Config, String, PathBuf) {
    let dir = TempDir::new().unwrap();
    let config = Config {
        store_dir: Some(dir.path().join("store")),
        ..Default::default()
    };

    let mut subjects = SubjectStore::open(config.store_dir().unwrap()).unwrap();
    let subject_id = subjects
        .add_subject(SubjectRecord::new("bench A".to_string(), SubjectKind::Trap))
        .unwrap();

    let image = test_image(dir.path());
    (dir, config, subject_id, image)
}

#[tokio::test]
async fn scan_persists_record_with_capture_time_alert() {
    let (_dir, config, subject_id, image) = setup();

    let mut thresholds = ThresholdStore::open(config.store_dir().unwrap()).unwrap();
    thresholds
        .set(ThresholdConfig::new(Category::Aphid, 5, 15, 30).unwrap())
        .unwrap();

    let oracle = ScriptedOracle::new(vec![Ok(18), Ok(20), Ok(22)]);
    let options = ScanOptions::new().with_categories(vec![Category::Aphid]);

    let outcome = run_scan_with_client(&image, &subject_id, &config, &options, oracle, None)
        .await
        .unwrap();

    assert_eq!(outcome.record.count_for(Category::Aphid), Some(20));
    assert_eq!(outcome.record.alert_level, AlertLevel::Action);
    assert_eq!(outcome.record.completeness, Completeness::Complete);
    assert_eq!(outcome.per_category[&Category::Aphid], AlertLevel::Action);
    assert!(outcome.record.image_hash.is_some());

    let store = ScanStore::open(config.store_dir().unwrap()).unwrap();
    assert_eq!(store.count(), 1);
    assert_eq!(
        store.get_scan(&outcome.record.id).unwrap().alert_level,
        AlertLevel::Action
    );
}

#[tokio::test]
async fn degraded_scan_still_produces_a_count() {
    let (_dir, config, subject_id, image) = setup();

    // One of three passes fails: degraded, median of the survivors
    let oracle = ScriptedOracle::new(vec![Ok(18), Ok(22), Err(())]);
    let options = ScanOptions::new().with_categories(vec![Category::Whitefly]);

    let outcome = run_scan_with_client(&image, &subject_id, &config, &options, oracle, None)
        .await
        .unwrap();

    assert_eq!(outcome.record.completeness, Completeness::Degraded);
    assert_eq!(outcome.record.count_for(Category::Whitefly), Some(20));
}

#[tokio::test]
async fn total_failure_is_retryable_and_stores_nothing() {
    let (_dir, config, subject_id, image) = setup();

    let oracle = ScriptedOracle::new(vec![Err(())]);
    let options = ScanOptions::new().with_categories(vec![Category::Aphid]);

    let err = run_scan_with_client(&image, &subject_id, &config, &options, oracle, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanServiceError::ScanFailed(_)));

    let store = ScanStore::open(config.store_dir().unwrap()).unwrap();
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn unknown_subject_is_rejected_before_any_pass() {
    let (_dir, config, _subject_id, image) = setup();

    let oracle = ScriptedOracle::new(vec![Ok(1)]);
    let err = run_scan_with_client(
        &image,
        "no-such-subject",
        &config,
        &ScanOptions::new(),
        oracle,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ScanServiceError::UnknownSubject(_)));
}

#[tokio::test]
async fn unconfigured_categories_classify_safe() {
    let (_dir, config, subject_id, image) = setup();

    let oracle = ScriptedOracle::new(vec![Ok(500)]);
    let options = ScanOptions::new().with_categories(vec![Category::SpiderMite]);

    let outcome = run_scan_with_client(&image, &subject_id, &config, &options, oracle, None)
        .await
        .unwrap();
    assert_eq!(outcome.record.alert_level, AlertLevel::Safe);
}
