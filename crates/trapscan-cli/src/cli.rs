//! CLI definition using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use trapscan_types::{Category, OutputFormat, RangeSpec, SubjectKind};

/// Bucket granularity and unit for trend queries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum RangeUnit {
    #[default]
    Days,
    Weeks,
    Months,
    Years,
}

impl RangeUnit {
    pub fn to_range(self, count: u32) -> RangeSpec {
        match self {
            RangeUnit::Days => RangeSpec::Days(count),
            RangeUnit::Weeks => RangeSpec::Weeks(count),
            RangeUnit::Months => RangeSpec::Months(count),
            RangeUnit::Years => RangeSpec::Years(count),
        }
    }
}

#[derive(Parser)]
#[command(name = "trapscan")]
#[command(version)]
#[command(about = "Pest trap and seed-tray photo monitoring using AI image analysis")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Model name override for the vision oracle
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Output format (json, table). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a single image for a subject
    Scan {
        /// Path to image file
        image: PathBuf,

        /// Subject (trap or seed tray) id
        #[arg(long, short = 's')]
        subject: String,

        /// Categories to count. Defaults to the subject kind's categories.
        #[arg(long, short = 'c', value_enum)]
        category: Vec<Category>,

        /// Number of oracle passes per category. Uses config value if not specified.
        #[arg(long, short = 'n')]
        passes: Option<u32>,

        /// Feed the previous scan's counts to the oracle as expected-count hints
        #[arg(long)]
        hints: bool,

        /// Free-text notes to attach to the scan
        #[arg(long)]
        notes: Option<String>,
    },

    /// Scan every image in a folder for a subject
    Batch {
        /// Path to folder containing images
        folder: PathBuf,

        /// Subject (trap or seed tray) id
        #[arg(long, short = 's')]
        subject: String,

        /// Categories to count. Defaults to the subject kind's categories.
        #[arg(long, short = 'c', value_enum)]
        category: Vec<Category>,

        /// Number of oracle passes per category. Uses config value if not specified.
        #[arg(long, short = 'n')]
        passes: Option<u32>,
    },

    /// Show stored scan history, most recent first
    History {
        /// Restrict to one subject id
        #[arg(long, short = 's')]
        subject: Option<String>,

        /// Maximum number of scans to show
        #[arg(long, short = 'l')]
        limit: Option<usize>,

        /// Write the history as CSV to this file instead of printing
        #[arg(long, short = 'o')]
        csv: Option<PathBuf>,
    },

    /// Show one stored scan in full
    Show {
        /// Scan id
        id: String,
    },

    /// Classify a stored scan under the thresholds configured right now
    Reclassify {
        /// Scan id
        id: String,
    },

    /// Edit a stored scan's notes
    Notes {
        /// Scan id
        id: String,

        /// New notes text
        #[arg(required_unless_present = "clear")]
        notes: Option<String>,

        /// Clear the notes instead of setting them
        #[arg(long, conflicts_with = "notes")]
        clear: bool,
    },

    /// Aggregate stored scans into calendar-aligned trend buckets
    Trend {
        /// Restrict to one subject id
        #[arg(long, short = 's')]
        subject: Option<String>,

        /// Number of buckets to cover
        #[arg(long, default_value_t = 7)]
        last: u32,

        /// Bucket granularity
        #[arg(long, value_enum, default_value = "days")]
        unit: RangeUnit,

        /// Week start weekday for weekly buckets (monday..sunday). Uses config value if not specified.
        #[arg(long)]
        week_start: Option<String>,

        /// Fixed end instant (RFC 3339) instead of the current time
        #[arg(long)]
        now: Option<String>,

        /// Write the trend as CSV to this file instead of printing
        #[arg(long, short = 'o')]
        csv: Option<PathBuf>,
    },

    /// Manage per-category alert thresholds
    Thresholds {
        #[command(subcommand)]
        command: ThresholdCommands,
    },

    /// Manage monitored subjects (traps and seed trays)
    Subjects {
        #[command(subcommand)]
        command: SubjectCommands,
    },

    /// Show or modify configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set the vision oracle command line
        #[arg(long)]
        set_oracle: Option<String>,

        /// Set the oracle model name (empty string clears it)
        #[arg(long)]
        set_model: Option<String>,

        /// Set the default passes per category per scan
        #[arg(long)]
        set_passes: Option<u32>,

        /// Set the per-pass timeout in seconds
        #[arg(long)]
        set_timeout: Option<u64>,

        /// Set the week start weekday (monday..sunday)
        #[arg(long)]
        set_week_start: Option<String>,

        /// Set the default output format
        #[arg(long, value_enum)]
        set_output: Option<OutputFormat>,

        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand)]
pub enum ThresholdCommands {
    /// Show the configured thresholds
    Show,

    /// Set one category's thresholds (watch <= action <= critical)
    Set {
        #[arg(value_enum)]
        category: Category,
        watch: u32,
        action: u32,
        critical: u32,
    },

    /// Remove one category's thresholds
    Remove {
        #[arg(value_enum)]
        category: Category,
    },
}

#[derive(Subcommand)]
pub enum SubjectCommands {
    /// Register a subject
    Add {
        /// Display name (e.g., "Greenhouse 2, bench A")
        name: String,

        /// Kind of subject
        #[arg(long, value_enum, default_value = "trap")]
        kind: SubjectKind,

        /// Free-text location
        #[arg(long)]
        location: Option<String>,

        /// Notes/memo
        #[arg(long)]
        notes: Option<String>,
    },

    /// List registered subjects
    List {
        /// Restrict to one kind
        #[arg(long, value_enum)]
        kind: Option<SubjectKind>,
    },

    /// Remove a subject by id
    Remove {
        /// Subject id
        id: String,
    },
}
