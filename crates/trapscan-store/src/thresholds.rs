//! Threshold configuration store

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use trapscan_types::{Category, Result, ThresholdConfig};

/// Persistent store for per-category alert thresholds, keyed by category.
///
/// Writes are validated: a non-monotonic config is rejected and the write
/// blocked, never reordered or clamped.
pub struct ThresholdStore {
    store_path: PathBuf,
    thresholds: HashMap<Category, ThresholdConfig>,
}

impl ThresholdStore {
    /// Create or load a threshold store
    pub fn open(store_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&store_dir)?;
        let store_path = store_dir.join("thresholds.json");

        let thresholds: HashMap<Category, ThresholdConfig> = if store_path.exists() {
            let file = File::open(&store_path)?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self {
            store_path,
            thresholds,
        })
    }

    /// Save store to disk
    fn save(&self) -> Result<()> {
        let file = File::create(&self.store_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.thresholds)?;
        Ok(())
    }

    /// Set the thresholds for a category, rejecting invalid configs
    pub fn set(&mut self, config: ThresholdConfig) -> Result<()> {
        config.validate()?;
        self.thresholds.insert(config.category, config);
        self.save()?;
        Ok(())
    }

    /// Thresholds for one category, if configured
    pub fn get(&self, category: Category) -> Option<&ThresholdConfig> {
        self.thresholds.get(&category)
    }

    /// Snapshot of every configured threshold, ordered by category
    pub fn snapshot(&self) -> Vec<ThresholdConfig> {
        let mut configs: Vec<_> = self.thresholds.values().copied().collect();
        configs.sort_by_key(|c| c.category);
        configs
    }

    /// Remove a category's thresholds
    pub fn remove(&mut self, category: Category) -> Result<bool> {
        let removed = self.thresholds.remove(&category).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_and_reload() {
        let dir = tempdir().unwrap();
        {
            let mut store = ThresholdStore::open(dir.path().to_path_buf()).unwrap();
            store
                .set(ThresholdConfig::new(Category::Aphid, 5, 15, 30).unwrap())
                .unwrap();
        }

        let store = ThresholdStore::open(dir.path().to_path_buf()).unwrap();
        let cfg = store.get(Category::Aphid).unwrap();
        assert_eq!((cfg.watch, cfg.action, cfg.critical), (5, 15, 30));
        assert!(store.get(Category::Thrips).is_none());
    }

    #[test]
    fn test_non_monotonic_write_blocked() {
        let dir = tempdir().unwrap();
        let mut store = ThresholdStore::open(dir.path().to_path_buf()).unwrap();

        let invalid = ThresholdConfig {
            category: Category::Aphid,
            watch: 30,
            action: 15,
            critical: 5,
        };
        assert!(store.set(invalid).is_err());
        assert!(store.get(Category::Aphid).is_none());
    }

    #[test]
    fn test_snapshot_ordered_by_category() {
        let dir = tempdir().unwrap();
        let mut store = ThresholdStore::open(dir.path().to_path_buf()).unwrap();
        store
            .set(ThresholdConfig::new(Category::Thrips, 2, 4, 8).unwrap())
            .unwrap();
        store
            .set(ThresholdConfig::new(Category::Aphid, 5, 15, 30).unwrap())
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].category, Category::Aphid);
        assert_eq!(snapshot[1].category, Category::Thrips);
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempdir().unwrap();
        let mut store = ThresholdStore::open(dir.path().to_path_buf()).unwrap();
        store
            .set(ThresholdConfig::new(Category::Aphid, 5, 15, 30).unwrap())
            .unwrap();
        store
            .set(ThresholdConfig::new(Category::Aphid, 10, 20, 40).unwrap())
            .unwrap();

        assert_eq!(store.get(Category::Aphid).unwrap().watch, 10);
    }
}
