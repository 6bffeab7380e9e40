//! Monitored subject store

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use trapscan_types::{Result, SubjectKind, SubjectRecord};

/// Persistent store for monitored traps and seed trays, keyed by subject id
pub struct SubjectStore {
    store_path: PathBuf,
    subjects: HashMap<String, SubjectRecord>,
}

impl SubjectStore {
    /// Create or load a subject store
    pub fn open(store_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&store_dir)?;
        let store_path = store_dir.join("subjects.json");

        let subjects = if store_path.exists() {
            let file = File::open(&store_path)?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self {
            store_path,
            subjects,
        })
    }

    /// Save store to disk
    fn save(&self) -> Result<()> {
        let file = File::create(&self.store_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.subjects)?;
        Ok(())
    }

    /// Register a new subject
    pub fn add_subject(&mut self, subject: SubjectRecord) -> Result<String> {
        let id = subject.id.clone();
        self.subjects.insert(id.clone(), subject);
        self.save()?;
        Ok(id)
    }

    /// Get a subject by id
    pub fn get_subject(&self, id: &str) -> Option<&SubjectRecord> {
        self.subjects.get(id)
    }

    /// All subjects sorted by name
    pub fn all_subjects(&self) -> Vec<&SubjectRecord> {
        let mut subjects: Vec<_> = self.subjects.values().collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        subjects
    }

    /// Subjects of one kind
    pub fn subjects_by_kind(&self, kind: SubjectKind) -> Vec<&SubjectRecord> {
        self.subjects.values().filter(|s| s.kind == kind).collect()
    }

    /// Remove a subject by id
    pub fn remove_subject(&mut self, id: &str) -> Result<bool> {
        let removed = self.subjects.remove(id).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Total registered subjects
    pub fn count(&self) -> usize {
        self.subjects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_get_and_reload() {
        let dir = tempdir().unwrap();
        let id = {
            let mut store = SubjectStore::open(dir.path().to_path_buf()).unwrap();
            let subject = SubjectRecord::new("Greenhouse 2, bench A".to_string(), SubjectKind::Trap)
                .with_location("north wall".to_string());
            store.add_subject(subject).unwrap()
        };

        let store = SubjectStore::open(dir.path().to_path_buf()).unwrap();
        let subject = store.get_subject(&id).unwrap();
        assert_eq!(subject.name, "Greenhouse 2, bench A");
        assert_eq!(subject.location.as_deref(), Some("north wall"));
    }

    #[test]
    fn test_subjects_by_kind() {
        let dir = tempdir().unwrap();
        let mut store = SubjectStore::open(dir.path().to_path_buf()).unwrap();
        store
            .add_subject(SubjectRecord::new("trap A".to_string(), SubjectKind::Trap))
            .unwrap();
        store
            .add_subject(SubjectRecord::new(
                "tray 7".to_string(),
                SubjectKind::SeedTray,
            ))
            .unwrap();

        assert_eq!(store.subjects_by_kind(SubjectKind::Trap).len(), 1);
        assert_eq!(store.subjects_by_kind(SubjectKind::SeedTray).len(), 1);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let mut store = SubjectStore::open(dir.path().to_path_buf()).unwrap();
        let id = store
            .add_subject(SubjectRecord::new("trap A".to_string(), SubjectKind::Trap))
            .unwrap();

        assert!(store.remove_subject(&id).unwrap());
        assert!(!store.remove_subject(&id).unwrap());
        assert_eq!(store.count(), 0);
    }
}
