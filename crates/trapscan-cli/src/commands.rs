//! Command handlers

use std::path::PathBuf;

use chrono::{DateTime, Utc, Weekday};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use serde::Serialize;

use trapscan_app::config::{parse_weekday, Config};
use trapscan_app::query_service::{self, QueryServiceError};
use trapscan_app::scan_service::ProgressCallback;
use trapscan_app::scanner::scan_directory;
use trapscan_app::{run_scan, ScanOptions};
use trapscan_types::{
    Category, ConfigError, Error, OutputFormat, RangeSpec, Result, ScanRecord, StoreError,
    SubjectRecord, ThresholdConfig,
};

use crate::cli::{Cli, Commands, SubjectCommands, ThresholdCommands};
use crate::output::{
    output_history, output_reclassification, output_scan, output_stored_scan, output_subjects,
    output_thresholds, output_trend, write_history_csv, write_trend_csv,
};

pub fn execute(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(ref model) = cli.model {
        config.model = Some(model.clone());
    }
    let output_format = cli.format.unwrap_or(config.output_format);
    debug!(
        "oracle={} passes={} timeout={}s",
        config.oracle_command, config.passes_per_scan, config.pass_timeout_secs
    );

    match &cli.command {
        Commands::Scan {
            image,
            subject,
            category,
            passes,
            hints,
            notes,
        } => cmd_scan(
            &cli,
            &config,
            image.clone(),
            subject.clone(),
            category.clone(),
            *passes,
            *hints,
            notes.clone(),
            output_format,
        ),

        Commands::Batch {
            folder,
            subject,
            category,
            passes,
        } => cmd_batch(
            &cli,
            &config,
            folder.clone(),
            subject.clone(),
            category.clone(),
            *passes,
            output_format,
        ),

        Commands::History {
            subject,
            limit,
            csv,
        } => cmd_history(&config, subject.as_deref(), *limit, csv.clone(), output_format),

        Commands::Show { id } => {
            let record = query_service::get_scan(&config, id).map_err(query_err)?;
            output_stored_scan(output_format, &record)
        }

        Commands::Reclassify { id } => cmd_reclassify(&config, id, output_format),

        Commands::Notes { id, notes, clear } => {
            let new_notes = if *clear { None } else { notes.clone() };
            query_service::update_scan_notes(&config, id, new_notes).map_err(query_err)?;
            if *clear {
                println!("Cleared notes on scan {}", id);
            } else {
                println!("Updated notes on scan {}", id);
            }
            Ok(())
        }

        Commands::Trend {
            subject,
            last,
            unit,
            week_start,
            now,
            csv,
        } => cmd_trend(
            &config,
            subject.as_deref(),
            unit.to_range(*last),
            week_start.as_deref(),
            now.as_deref(),
            csv.clone(),
            output_format,
        ),

        Commands::Thresholds { command } => cmd_thresholds(&config, command, output_format),

        Commands::Subjects { command } => cmd_subjects(&config, command, output_format),

        Commands::Config {
            show,
            set_oracle,
            set_model,
            set_passes,
            set_timeout,
            set_week_start,
            set_output,
            reset,
        } => cmd_config(
            *show,
            set_oracle.clone(),
            set_model.clone(),
            *set_passes,
            *set_timeout,
            set_week_start.clone(),
            *set_output,
            *reset,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_scan(
    cli: &Cli,
    config: &Config,
    image: PathBuf,
    subject: String,
    categories: Vec<Category>,
    passes: Option<u32>,
    hints: bool,
    notes: Option<String>,
    output_format: OutputFormat,
) -> Result<()> {
    let mut options = ScanOptions::new()
        .with_categories(categories)
        .with_hints(hints);
    if let Some(n) = passes {
        options = options.with_passes(n);
    }
    if let Some(text) = notes {
        options = options.with_notes(text);
    }

    let progress = if cli.verbose {
        Some(Box::new(|msg: &str| eprintln!("  {}", msg)) as ProgressCallback)
    } else {
        None
    };

    if cli.verbose {
        eprintln!("Scanning image: {}", image.display());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime
        .block_on(run_scan(&image, &subject, config, &options, progress))
        .map_err(|e| Error::ScanFailed(e.to_string()))?;

    output_scan(output_format, &outcome.record, &outcome.per_category)
}

/// Result of one batch item; failures are recorded, not fatal
#[derive(Serialize)]
struct BatchEntry {
    image: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan: Option<ScanRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn cmd_batch(
    cli: &Cli,
    config: &Config,
    folder: PathBuf,
    subject: String,
    categories: Vec<Category>,
    passes: Option<u32>,
    output_format: OutputFormat,
) -> Result<()> {
    let images = scan_directory(&folder)?;
    if images.is_empty() {
        return Err(Error::FileNotFound(format!(
            "No images found in {}",
            folder.display()
        )));
    }

    if cli.verbose {
        eprintln!("Found {} images to scan", images.len());
    }

    let pb = ProgressBar::new(images.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut options = ScanOptions::new().with_categories(categories);
    if let Some(n) = passes {
        options = options.with_passes(n);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let mut entries = Vec::new();

    for image in images {
        let filename = image
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        pb.set_message(filename);

        let result = runtime.block_on(run_scan(&image, &subject, config, &options, None));
        match result {
            Ok(outcome) => entries.push(BatchEntry {
                image,
                scan: Some(outcome.record),
                error: None,
            }),
            Err(e) => entries.push(BatchEntry {
                image,
                scan: None,
                error: Some(e.to_string()),
            }),
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let successful = entries.iter().filter(|e| e.scan.is_some()).count();
    println!("\nBatch Result");
    println!("============");
    for entry in &entries {
        match (&entry.scan, &entry.error) {
            (Some(scan), _) => println!(
                "{:<30} total {:>5}  alert {:<10} ({})",
                entry.image.file_name().and_then(|n| n.to_str()).unwrap_or(""),
                scan.total_count,
                scan.alert_level.label(),
                scan.completeness.label()
            ),
            (None, Some(err)) => println!(
                "{:<30} FAILED: {}",
                entry.image.file_name().and_then(|n| n.to_str()).unwrap_or(""),
                err
            ),
            (None, None) => {}
        }
    }
    println!("\n{}/{} scans succeeded", successful, entries.len());

    Ok(())
}

fn cmd_history(
    config: &Config,
    subject: Option<&str>,
    limit: Option<usize>,
    csv: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let scans = query_service::get_scan_history(config, subject, limit).map_err(query_err)?;

    match csv {
        Some(path) => {
            write_history_csv(&path, &scans)?;
            println!("Wrote {} scan(s) to {}", scans.len(), path.display());
            Ok(())
        }
        None => output_history(output_format, &scans),
    }
}

fn cmd_reclassify(config: &Config, id: &str, output_format: OutputFormat) -> Result<()> {
    let record = query_service::get_scan(config, id).map_err(query_err)?;
    let classification = query_service::reclassify_scan(config, id).map_err(query_err)?;
    output_reclassification(output_format, &record, &classification)
}

fn cmd_trend(
    config: &Config,
    subject: Option<&str>,
    range: RangeSpec,
    week_start: Option<&str>,
    now: Option<&str>,
    csv: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let now: DateTime<Utc> = match now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| {
                Error::Config(ConfigError::ParseError(format!(
                    "Invalid --now timestamp '{}': {}",
                    raw, e
                )))
            })?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let week_start: Weekday = match week_start {
        Some(name) => parse_weekday(name).ok_or_else(|| {
            Error::Config(ConfigError::ParseError(format!(
                "Invalid week start '{}'",
                name
            )))
        })?,
        None => config.week_start_weekday(),
    };

    let buckets = match subject {
        Some(id) => query_service::trend_for_subject(config, id, range, now, week_start)
            .map_err(query_err)?,
        None => query_service::trend_all(config, range, now, week_start).map_err(query_err)?,
    };

    match csv {
        Some(path) => {
            write_trend_csv(&path, &buckets)?;
            println!("Wrote {} bucket(s) to {}", buckets.len(), path.display());
            Ok(())
        }
        None => output_trend(output_format, &buckets),
    }
}

fn cmd_thresholds(
    config: &Config,
    command: &ThresholdCommands,
    output_format: OutputFormat,
) -> Result<()> {
    match command {
        ThresholdCommands::Show => {
            let thresholds = query_service::get_thresholds(config).map_err(query_err)?;
            output_thresholds(output_format, &thresholds)
        }
        ThresholdCommands::Set {
            category,
            watch,
            action,
            critical,
        } => {
            let thresholds = ThresholdConfig::new(*category, *watch, *action, *critical)?;
            query_service::set_thresholds(config, thresholds).map_err(query_err)?;
            println!(
                "Set {} thresholds: watch {} / action {} / critical {}",
                category.label(),
                watch,
                action,
                critical
            );
            Ok(())
        }
        ThresholdCommands::Remove { category } => {
            let removed = query_service::remove_thresholds(config, *category).map_err(query_err)?;
            if removed {
                println!("Removed {} thresholds", category.label());
            } else {
                println!("No thresholds configured for {}", category.label());
            }
            Ok(())
        }
    }
}

fn cmd_subjects(
    config: &Config,
    command: &SubjectCommands,
    output_format: OutputFormat,
) -> Result<()> {
    match command {
        SubjectCommands::Add {
            name,
            kind,
            location,
            notes,
        } => {
            let mut subject = SubjectRecord::new(name.clone(), *kind);
            if let Some(loc) = location {
                subject = subject.with_location(loc.clone());
            }
            if let Some(text) = notes {
                subject = subject.with_notes(text.clone());
            }
            let id = query_service::add_subject(config, subject).map_err(query_err)?;
            println!("Registered {} '{}' with id {}", kind.label(), name, id);
            Ok(())
        }
        SubjectCommands::List { kind } => {
            let mut subjects = query_service::get_subjects(config).map_err(query_err)?;
            if let Some(kind) = kind {
                subjects.retain(|s| s.kind == *kind);
            }
            output_subjects(output_format, &subjects)
        }
        SubjectCommands::Remove { id } => {
            let removed = query_service::remove_subject(config, id).map_err(query_err)?;
            if removed {
                println!("Removed subject {}", id);
            } else {
                println!("No subject with id {}", id);
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_config(
    show: bool,
    set_oracle: Option<String>,
    set_model: Option<String>,
    set_passes: Option<u32>,
    set_timeout: Option<u64>,
    set_week_start: Option<String>,
    set_output: Option<OutputFormat>,
    reset: bool,
) -> Result<()> {
    if reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        return Ok(());
    }

    let mut config = Config::load()?;
    let mut changed = false;

    if let Some(oracle) = set_oracle {
        config.oracle_command = oracle;
        changed = true;
    }
    if let Some(model) = set_model {
        config.model = if model.is_empty() { None } else { Some(model) };
        changed = true;
    }
    if let Some(passes) = set_passes {
        config.passes_per_scan = passes.max(1);
        changed = true;
    }
    if let Some(timeout) = set_timeout {
        config.pass_timeout_secs = timeout.max(1);
        changed = true;
    }
    if let Some(week_start) = set_week_start {
        if parse_weekday(&week_start).is_none() {
            return Err(Error::Config(ConfigError::ParseError(format!(
                "Invalid week start '{}'",
                week_start
            ))));
        }
        config.week_start = week_start;
        changed = true;
    }
    if let Some(format) = set_output {
        config.output_format = format;
        changed = true;
    }

    if changed {
        config.save()?;
        println!("Configuration updated");
    }

    if show || !changed {
        println!("Oracle command: {}", config.oracle_command);
        println!("Model:          {}", config.model.as_deref().unwrap_or("(default)"));
        println!("Passes:         {}", config.passes_per_scan);
        println!("Pass timeout:   {}s", config.pass_timeout_secs);
        println!("Week start:     {}", config.week_start);
        println!("Output format:  {}", config.output_format);
    }

    Ok(())
}

fn query_err(err: QueryServiceError) -> Error {
    match err {
        QueryServiceError::NotFound(msg) => Error::Store(StoreError::NotFound(msg)),
        QueryServiceError::InvalidThresholds(e) => Error::Threshold(e),
        QueryServiceError::StoreError(msg) => Error::Store(StoreError::IoError(msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trapscan_types::ThresholdError;

    #[test]
    fn test_query_err_keeps_threshold_failures_distinct() {
        let invalid = ThresholdError::NonMonotonic {
            category: Category::Aphid,
            watch: 9,
            action: 3,
            critical: 1,
        };
        let mapped = query_err(QueryServiceError::InvalidThresholds(invalid));
        assert!(matches!(mapped, Error::Threshold(_)));

        let mapped = query_err(QueryServiceError::NotFound("scan x".to_string()));
        assert!(matches!(mapped, Error::Store(StoreError::NotFound(_))));
    }
}
