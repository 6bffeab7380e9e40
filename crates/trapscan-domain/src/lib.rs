//! Domain services for trapscan
//!
//! The three pure engines of the system:
//! - `aggregate`: reduce repeated noisy oracle passes to one robust count
//! - `alert`: classify aggregated counts against threshold configuration
//! - `trend`: roll scan history into calendar-aligned time buckets
//!
//! Everything here is a synchronous, side-effect-free function over explicit
//! inputs; identical inputs always yield identical output.

pub mod aggregate;
pub mod alert;
pub mod trend;

pub use aggregate::{aggregate, median, Aggregation};
pub use alert::{classify, tier, Classification};
pub use trend::build_trend;
