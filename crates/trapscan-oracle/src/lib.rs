//! Vision oracle client for trap and seed-tray counting
//!
//! This crate owns the seam to the external vision oracle:
//! - the `OracleClient` trait and its request/response types
//! - counting prompts and strict response parsing
//! - a CLI-backed implementation shelling out to a configured vision tool
//! - the multi-pass fan-out that issues N concurrent passes per category

pub mod backend;
pub mod multipass;
pub mod parse;
pub mod prompts;

pub use backend::CommandOracle;
pub use multipass::{run_passes, PassPlan};
pub use parse::{extract_json_from_response, parse_observation};

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use trapscan_types::{Category, OracleError};

/// One image-analysis request for one category
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub image_path: PathBuf,
    pub category: Category,
    /// Optional expected-count hint; how the oracle uses it is its own concern
    pub expected_hint: Option<u32>,
}

/// Normalized point within the image, both axes in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

/// One pass's parsed oracle response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleObservation {
    pub raw_count: u32,
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Confidence in [0, 1], when the oracle reports one
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A vision oracle that can count one category in one image.
///
/// Implementations must be safe to call concurrently; every pass gets its
/// own invocation.
#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn count(&self, request: &OracleRequest) -> Result<OracleObservation, OracleError>;
}
