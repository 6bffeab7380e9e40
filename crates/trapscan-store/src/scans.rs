//! Scan record store

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use trapscan_types::{Result, ScanRecord, StoreError};

/// Persistent store for scan records, keyed by scan id.
///
/// Records are immutable after creation except for their free-text notes.
pub struct ScanStore {
    store_path: PathBuf,
    scans: HashMap<String, ScanRecord>,
}

impl ScanStore {
    /// Create or load a scan store
    pub fn open(store_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&store_dir)?;
        let store_path = store_dir.join("scans.json");

        let scans = if store_path.exists() {
            let file = File::open(&store_path)?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self { store_path, scans })
    }

    /// Save store to disk
    fn save(&self) -> Result<()> {
        let file = File::create(&self.store_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.scans)?;
        Ok(())
    }

    /// Persist a new scan record
    pub fn add_scan(&mut self, record: ScanRecord) -> Result<String> {
        let id = record.id.clone();
        self.scans.insert(id.clone(), record);
        self.save()?;
        Ok(id)
    }

    /// Get a scan by id
    pub fn get_scan(&self, id: &str) -> Option<&ScanRecord> {
        self.scans.get(id)
    }

    /// All scans, most recent first
    pub fn all_scans(&self) -> Vec<&ScanRecord> {
        let mut scans: Vec<_> = self.scans.values().collect();
        scans.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        scans
    }

    /// Scans for one subject, most recent first
    pub fn scans_for_subject(&self, subject_id: &str) -> Vec<&ScanRecord> {
        let mut scans: Vec<_> = self
            .scans
            .values()
            .filter(|s| s.subject_id == subject_id)
            .collect();
        scans.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        scans
    }

    /// Most recent scan for one subject
    pub fn latest_for_subject(&self, subject_id: &str) -> Option<&ScanRecord> {
        self.scans
            .values()
            .filter(|s| s.subject_id == subject_id)
            .max_by_key(|s| s.timestamp)
    }

    /// Update a scan's notes, the only permitted record mutation
    pub fn update_notes(&mut self, id: &str, notes: Option<String>) -> Result<()> {
        let scan = self
            .scans
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("scan {id}")))?;
        scan.notes = notes;
        self.save()?;
        Ok(())
    }

    /// Remove a scan by id
    pub fn remove_scan(&mut self, id: &str) -> Result<bool> {
        let removed = self.scans.remove(id).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Total stored scans
    pub fn count(&self) -> usize {
        self.scans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use trapscan_types::{AlertLevel, Completeness};

    fn record(subject: &str) -> ScanRecord {
        ScanRecord::new(
            subject.to_string(),
            Utc::now(),
            Vec::new(),
            AlertLevel::Safe,
            Completeness::Complete,
        )
    }

    #[test]
    fn test_add_and_reload() {
        let dir = tempdir().unwrap();
        let id = {
            let mut store = ScanStore::open(dir.path().to_path_buf()).unwrap();
            store.add_scan(record("trap-1")).unwrap()
        };

        let store = ScanStore::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(store.get_scan(&id).unwrap().subject_id, "trap-1");
    }

    #[test]
    fn test_scans_for_subject_sorted_recent_first() {
        let dir = tempdir().unwrap();
        let mut store = ScanStore::open(dir.path().to_path_buf()).unwrap();

        let mut older = record("trap-1");
        older.timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut newer = record("trap-1");
        newer.timestamp = "2024-02-01T00:00:00Z".parse().unwrap();
        store.add_scan(older).unwrap();
        let newer_id = store.add_scan(newer).unwrap();
        store.add_scan(record("trap-2")).unwrap();

        let scans = store.scans_for_subject("trap-1");
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].id, newer_id);
        assert_eq!(store.latest_for_subject("trap-1").unwrap().id, newer_id);
    }

    #[test]
    fn test_update_notes_only() {
        let dir = tempdir().unwrap();
        let mut store = ScanStore::open(dir.path().to_path_buf()).unwrap();
        let id = store.add_scan(record("trap-1")).unwrap();

        store
            .update_notes(&id, Some("north corner, heavy rain".to_string()))
            .unwrap();
        assert_eq!(
            store.get_scan(&id).unwrap().notes.as_deref(),
            Some("north corner, heavy rain")
        );

        assert!(store.update_notes("missing", None).is_err());
    }
}
