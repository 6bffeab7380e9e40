//! Multi-pass fan-out
//!
//! Issues the configured number of oracle passes per category concurrently,
//! one tokio task per pass with an independent timeout, then hands the
//! completed outcome set to the caller in one piece. No partial sets are
//! ever returned, and dropping the returned future aborts every in-flight
//! pass without producing a result.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinSet;

use trapscan_types::{Category, OracleError, PassFailure, PassOutcome};

use crate::{OracleClient, OracleRequest};

/// Fan-out configuration for one image
#[derive(Debug, Clone)]
pub struct PassPlan {
    /// Passes issued per category (typically 3)
    pub passes_per_category: u32,
    /// Independent timeout per pass
    pub pass_timeout: Duration,
}

impl Default for PassPlan {
    fn default() -> Self {
        Self {
            passes_per_category: 3,
            pass_timeout: Duration::from_secs(60),
        }
    }
}

/// Run all passes for one image and collect outcomes per category.
///
/// Per-pass failures are absorbed into `PassOutcome::Failed` values; this
/// function itself never fails. Timeouts and malformed responses are logged
/// distinctly so they can be told apart after the fact.
pub async fn run_passes(
    client: Arc<dyn OracleClient>,
    image_path: &Path,
    categories: &[Category],
    hints: &BTreeMap<Category, u32>,
    plan: &PassPlan,
) -> BTreeMap<Category, Vec<PassOutcome>> {
    let mut outcomes: BTreeMap<Category, Vec<PassOutcome>> =
        categories.iter().map(|&c| (c, Vec::new())).collect();

    let mut tasks: JoinSet<(Category, PassOutcome)> = JoinSet::new();
    // Task id -> category, so a panicked pass can still be booked against
    // the category that lost it.
    let mut spawned: HashMap<tokio::task::Id, Category> = HashMap::new();
    for &category in categories {
        for pass in 0..plan.passes_per_category {
            let client = Arc::clone(&client);
            let request = OracleRequest {
                image_path: image_path.to_path_buf(),
                category,
                expected_hint: hints.get(&category).copied(),
            };
            let timeout = plan.pass_timeout;
            let handle = tasks.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, client.count(&request)).await {
                    Ok(Ok(observation)) => {
                        debug!(
                            "pass {pass} for {category}: counted {} (confidence {:?})",
                            observation.raw_count, observation.confidence
                        );
                        PassOutcome::Counted {
                            raw_count: observation.raw_count,
                            confidence: observation.confidence,
                        }
                    }
                    Ok(Err(err)) => {
                        match &err {
                            OracleError::Malformed(detail) => {
                                warn!("pass {pass} for {category}: malformed response: {detail}")
                            }
                            OracleError::Unavailable(detail) => {
                                warn!("pass {pass} for {category}: oracle unavailable: {detail}")
                            }
                            OracleError::Timeout => {
                                warn!("pass {pass} for {category}: timed out")
                            }
                        }
                        PassOutcome::Failed(PassFailure::from(&err))
                    }
                    Err(_) => {
                        warn!(
                            "pass {pass} for {category}: timed out after {}s",
                            timeout.as_secs()
                        );
                        PassOutcome::Failed(PassFailure::Timeout)
                    }
                };
                (category, outcome)
            });
            spawned.insert(handle.id(), category);
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((category, outcome)) => {
                outcomes.entry(category).or_default().push(outcome);
            }
            // A panicked pass counts as an unavailable one: it must not
            // sink the whole image, and it must not silently shrink the
            // category's outcome list either, or completeness would lie.
            Err(err) if !err.is_cancelled() => {
                warn!("oracle pass task failed: {err}");
                if let Some(&category) = spawned.get(&err.id()) {
                    outcomes
                        .entry(category)
                        .or_default()
                        .push(PassOutcome::Failed(PassFailure::Unavailable));
                }
            }
            Err(_) => {}
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OracleObservation;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Mock oracle cycling through scripted per-call behaviors
    struct ScriptedOracle {
        script: Vec<Result<u32, OracleError>>,
        next: AtomicU32,
    }

    impl ScriptedOracle {
        fn new(script: Vec<Result<u32, OracleError>>) -> Arc<Self> {
            Arc::new(Self {
                script,
                next: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl OracleClient for ScriptedOracle {
        async fn count(
            &self,
            _request: &OracleRequest,
        ) -> Result<OracleObservation, OracleError> {
            let idx = self.next.fetch_add(1, Ordering::SeqCst) as usize % self.script.len();
            match &self.script[idx] {
                Ok(count) => Ok(OracleObservation {
                    raw_count: *count,
                    locations: Vec::new(),
                    confidence: None,
                }),
                Err(OracleError::Timeout) => Err(OracleError::Timeout),
                Err(OracleError::Malformed(m)) => Err(OracleError::Malformed(m.clone())),
                Err(OracleError::Unavailable(m)) => Err(OracleError::Unavailable(m.clone())),
            }
        }
    }

    fn plan(passes: u32) -> PassPlan {
        PassPlan {
            passes_per_category: passes,
            pass_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_all_passes_collected() {
        let oracle = ScriptedOracle::new(vec![Ok(18), Ok(20), Ok(22)]);
        let outcomes = run_passes(
            oracle,
            &PathBuf::from("trap.jpg"),
            &[Category::Aphid],
            &BTreeMap::new(),
            &plan(3),
        )
        .await;

        let aphid = &outcomes[&Category::Aphid];
        assert_eq!(aphid.len(), 3);
        assert!(aphid.iter().all(PassOutcome::is_usable));
    }

    #[tokio::test]
    async fn test_failures_become_outcomes_not_errors() {
        let oracle = ScriptedOracle::new(vec![
            Ok(18),
            Ok(22),
            Err(OracleError::Malformed("not json".to_string())),
        ]);
        let outcomes = run_passes(
            oracle,
            &PathBuf::from("trap.jpg"),
            &[Category::Whitefly],
            &BTreeMap::new(),
            &plan(3),
        )
        .await;

        let whitefly = &outcomes[&Category::Whitefly];
        assert_eq!(whitefly.len(), 3);
        let usable = whitefly.iter().filter(|o| o.is_usable()).count();
        assert_eq!(usable, 2);
        assert!(whitefly.contains(&PassOutcome::Failed(PassFailure::Malformed)));
    }

    #[tokio::test]
    async fn test_slow_pass_times_out() {
        struct SlowOracle;

        #[async_trait]
        impl OracleClient for SlowOracle {
            async fn count(
                &self,
                _request: &OracleRequest,
            ) -> Result<OracleObservation, OracleError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }
        }

        let outcomes = run_passes(
            Arc::new(SlowOracle),
            &PathBuf::from("trap.jpg"),
            &[Category::Thrips],
            &BTreeMap::new(),
            &PassPlan {
                passes_per_category: 2,
                pass_timeout: Duration::from_millis(20),
            },
        )
        .await;

        let thrips = &outcomes[&Category::Thrips];
        assert_eq!(thrips.len(), 2);
        assert!(thrips
            .iter()
            .all(|o| *o == PassOutcome::Failed(PassFailure::Timeout)));
    }

    #[tokio::test]
    async fn test_panicked_pass_recorded_as_unavailable() {
        struct PanickingOracle;

        #[async_trait]
        impl OracleClient for PanickingOracle {
            async fn count(
                &self,
                _request: &OracleRequest,
            ) -> Result<OracleObservation, OracleError> {
                panic!("backend blew up");
            }
        }

        let outcomes = run_passes(
            Arc::new(PanickingOracle),
            &PathBuf::from("trap.jpg"),
            &[Category::FungusGnat],
            &BTreeMap::new(),
            &plan(3),
        )
        .await;

        // The outcome list keeps the pass, as a lost one
        let fungus_gnat = &outcomes[&Category::FungusGnat];
        assert_eq!(fungus_gnat.len(), 3);
        assert!(fungus_gnat
            .iter()
            .all(|o| *o == PassOutcome::Failed(PassFailure::Unavailable)));
    }

    #[tokio::test]
    async fn test_every_category_gets_its_own_passes() {
        let oracle = ScriptedOracle::new(vec![Ok(4)]);
        let categories = [Category::Germinated, Category::Ungerminated];
        let outcomes = run_passes(
            oracle,
            &PathBuf::from("tray.jpg"),
            &categories,
            &BTreeMap::new(),
            &plan(3),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        for category in categories {
            assert_eq!(outcomes[&category].len(), 3);
        }
    }
}
