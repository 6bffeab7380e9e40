//! Application service layer for trapscan
//!
//! Use cases on top of the pure domain engines: running a scan end to end,
//! querying stored history and trends, and configuration.

pub mod config;
pub mod query_service;
pub mod scan_service;
pub mod scanner;

pub use config::Config;
pub use scan_service::{run_scan, run_scan_with_client, ScanOptions, ScanOutcome, ScanServiceError};
