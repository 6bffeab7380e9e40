//! Persistent record stores for trapscan
//!
//! Three keyed JSON-file stores with last-write-wins semantics: scans,
//! threshold configs, and monitored subjects. Each loads its file on open
//! and rewrites it on every mutation. No cross-record transactions exist or
//! are needed; the core treats these purely as load/save boundaries.

mod scans;
mod subjects;
mod thresholds;

pub use scans::ScanStore;
pub use subjects::SubjectStore;
pub use thresholds::ThresholdStore;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use sha2::{Digest, Sha256};

use trapscan_types::Result;

/// Compute the SHA256 hash of an image file, hex encoded
pub fn hash_image(image_path: &Path) -> Result<String> {
    let file = File::open(image_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    let hash = hasher.finalize();
    Ok(format!("{:x}", hash))
}
