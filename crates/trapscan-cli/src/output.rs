//! Output formatting module

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use trapscan_domain::Classification;
use trapscan_types::{
    AlertLevel, Category, OutputFormat, Result, ScanRecord, SubjectRecord, ThresholdConfig,
    TrendBucket,
};

/// One scan plus the per-category tiers it was graded with
#[derive(Serialize)]
struct ScanReport<'a> {
    #[serde(flatten)]
    record: &'a ScanRecord,
    per_category_alerts: &'a BTreeMap<Category, AlertLevel>,
}

pub fn output_scan(
    output_format: OutputFormat,
    record: &ScanRecord,
    per_category: &BTreeMap<Category, AlertLevel>,
) -> Result<()> {
    if output_format == OutputFormat::Json {
        let report = ScanReport {
            record,
            per_category_alerts: per_category,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nScan Result");
    println!("===========");
    println!("Scan id:      {}", record.id);
    println!("Subject:      {}", record.subject_id);
    println!("Timestamp:    {}", record.timestamp.to_rfc3339());
    println!("Completeness: {}", record.completeness.label());

    println!("\n{:<16} {:>6} {:<12} {:<10} Passes", "Category", "Count", "Consistency", "Alert");
    for aggregated in &record.aggregated_counts {
        let level = per_category
            .get(&aggregated.category)
            .copied()
            .unwrap_or(AlertLevel::Safe);
        let values: Vec<String> = aggregated.pass_values.iter().map(u32::to_string).collect();
        println!(
            "{:<16} {:>6} {:<12} {:<10} [{}]",
            aggregated.category.label(),
            aggregated.count,
            aggregated.consistency.label(),
            level.label(),
            values.join(", ")
        );
    }

    println!("\nTotal:        {}", record.total_count);
    println!("Alert level:  {}", record.alert_level);
    if let Some(ref notes) = record.notes {
        println!("Notes:        {}", notes);
    }

    Ok(())
}

/// Print a stored record using its own per-category breakdown only.
///
/// The capture-time per-category tiers are not stored, so this shows counts
/// and the scan-level alert; `reclassify` shows today's tiers.
pub fn output_stored_scan(output_format: OutputFormat, record: &ScanRecord) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("\nScan {}", record.id);
    println!("Subject:      {}", record.subject_id);
    println!("Timestamp:    {}", record.timestamp.to_rfc3339());
    println!("Completeness: {}", record.completeness.label());
    if let Some(ref hash) = record.image_hash {
        println!("Image hash:   {}", hash);
    }

    println!("\n{:<16} {:>6} {:<12} Passes", "Category", "Count", "Consistency");
    for aggregated in &record.aggregated_counts {
        let values: Vec<String> = aggregated.pass_values.iter().map(u32::to_string).collect();
        println!(
            "{:<16} {:>6} {:<12} [{}]",
            aggregated.category.label(),
            aggregated.count,
            aggregated.consistency.label(),
            values.join(", ")
        );
    }

    println!("\nTotal:        {}", record.total_count);
    println!("Alert level:  {} (at capture time)", record.alert_level);
    if let Some(ref notes) = record.notes {
        println!("Notes:        {}", notes);
    }

    Ok(())
}

pub fn output_history(output_format: OutputFormat, scans: &[ScanRecord]) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(scans)?);
        return Ok(());
    }

    if scans.is_empty() {
        println!("No scans recorded.");
        return Ok(());
    }

    println!(
        "{:<36} {:<20} {:>6} {:<10} {:<9} {}",
        "Scan", "Timestamp", "Total", "Alert", "Complete", "Subject"
    );
    for scan in scans {
        println!(
            "{:<36} {:<20} {:>6} {:<10} {:<9} {}",
            scan.id,
            scan.timestamp.format("%Y-%m-%d %H:%M:%S"),
            scan.total_count,
            scan.alert_level.label(),
            scan.completeness.label(),
            scan.subject_id
        );
    }
    println!("\n{} scan(s)", scans.len());

    Ok(())
}

/// Write history as CSV, one row per scan per category
pub fn write_history_csv(path: &Path, scans: &[ScanRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_io)?;
    writer
        .write_record([
            "scan_id",
            "subject_id",
            "timestamp",
            "category",
            "count",
            "consistency",
            "scan_total",
            "alert_level",
            "completeness",
        ])
        .map_err(csv_io)?;

    for scan in scans {
        for aggregated in &scan.aggregated_counts {
            writer
                .write_record([
                    scan.id.as_str(),
                    scan.subject_id.as_str(),
                    &scan.timestamp.to_rfc3339(),
                    aggregated.category.label(),
                    &aggregated.count.to_string(),
                    aggregated.consistency.label(),
                    &scan.total_count.to_string(),
                    scan.alert_level.label(),
                    scan.completeness.label(),
                ])
                .map_err(csv_io)?;
        }
    }

    writer.flush()?;
    Ok(())
}

pub fn output_trend(output_format: OutputFormat, buckets: &[TrendBucket]) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(buckets)?);
        return Ok(());
    }

    if buckets.is_empty() {
        println!("No buckets in range.");
        return Ok(());
    }

    println!("{:<20} {:<20} {:>6}  Per category", "From", "To", "Total");
    for bucket in buckets {
        let breakdown: Vec<String> = bucket
            .per_category
            .iter()
            .map(|(category, count)| format!("{}={}", category.label(), count))
            .collect();
        println!(
            "{:<20} {:<20} {:>6}  {}",
            bucket.window_start.format("%Y-%m-%d %H:%M"),
            bucket.window_end.format("%Y-%m-%d %H:%M"),
            bucket.total,
            if breakdown.is_empty() {
                "-".to_string()
            } else {
                breakdown.join(" ")
            }
        );
    }

    Ok(())
}

/// Write a trend as CSV, one row per bucket per category plus a total row
pub fn write_trend_csv(path: &Path, buckets: &[TrendBucket]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_io)?;
    writer
        .write_record(["window_start", "window_end", "category", "count"])
        .map_err(csv_io)?;

    for bucket in buckets {
        for (category, count) in &bucket.per_category {
            writer
                .write_record([
                    bucket.window_start.to_rfc3339().as_str(),
                    &bucket.window_end.to_rfc3339(),
                    category.label(),
                    &count.to_string(),
                ])
                .map_err(csv_io)?;
        }
        writer
            .write_record([
                bucket.window_start.to_rfc3339().as_str(),
                &bucket.window_end.to_rfc3339(),
                "total",
                &bucket.total.to_string(),
            ])
            .map_err(csv_io)?;
    }

    writer.flush()?;
    Ok(())
}

/// What-if view of a stored scan under the current thresholds
#[derive(Serialize)]
struct ReclassifyReport<'a> {
    scan_id: &'a str,
    stored_alert_level: AlertLevel,
    current_alert_level: AlertLevel,
    per_category: &'a BTreeMap<Category, AlertLevel>,
}

pub fn output_reclassification(
    output_format: OutputFormat,
    record: &ScanRecord,
    classification: &Classification,
) -> Result<()> {
    if output_format == OutputFormat::Json {
        let report = ReclassifyReport {
            scan_id: &record.id,
            stored_alert_level: record.alert_level,
            current_alert_level: classification.scan_level,
            per_category: &classification.per_category,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nReclassification of {}", record.id);
    println!("Stored alert (capture time):   {}", record.alert_level);
    println!("Alert under today's thresholds: {}", classification.scan_level);

    println!("\n{:<16} {:>6} {:<10}", "Category", "Count", "Alert");
    for aggregated in &record.aggregated_counts {
        let level = classification
            .per_category
            .get(&aggregated.category)
            .copied()
            .unwrap_or(AlertLevel::Safe);
        println!(
            "{:<16} {:>6} {:<10}",
            aggregated.category.label(),
            aggregated.count,
            level.label()
        );
    }

    Ok(())
}

pub fn output_thresholds(
    output_format: OutputFormat,
    thresholds: &[ThresholdConfig],
) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(thresholds)?);
        return Ok(());
    }

    if thresholds.is_empty() {
        println!("No thresholds configured. All categories grade as safe.");
        return Ok(());
    }

    println!(
        "{:<16} {:>6} {:>7} {:>9}",
        "Category", "Watch", "Action", "Critical"
    );
    for config in thresholds {
        println!(
            "{:<16} {:>6} {:>7} {:>9}",
            config.category.label(),
            config.watch,
            config.action,
            config.critical
        );
    }

    Ok(())
}

pub fn output_subjects(output_format: OutputFormat, subjects: &[SubjectRecord]) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(subjects)?);
        return Ok(());
    }

    if subjects.is_empty() {
        println!("No subjects registered.");
        return Ok(());
    }

    println!(
        "{:<36} {:<10} {:<24} {}",
        "Id", "Kind", "Name", "Location"
    );
    for subject in subjects {
        println!(
            "{:<36} {:<10} {:<24} {}",
            subject.id,
            subject.kind.label(),
            subject.name,
            subject.location.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

fn csv_io(err: csv::Error) -> trapscan_types::Error {
    trapscan_types::Error::Io(std::io::Error::other(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use trapscan_types::{AggregatedCount, Completeness, Consistency};

    fn sample_record() -> ScanRecord {
        ScanRecord::new(
            "trap-1".to_string(),
            Utc.with_ymd_and_hms(2026, 3, 10, 8, 30, 0).unwrap(),
            vec![AggregatedCount {
                category: Category::Aphid,
                count: 12,
                confidence: Some(0.9),
                consistency: Consistency::High,
                pass_values: vec![11, 12, 12],
            }],
            AlertLevel::Watch,
            Completeness::Complete,
        )
    }

    #[test]
    fn test_history_csv_rows_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        write_history_csv(&path, &[sample_record()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("scan_id,subject_id,timestamp,category"));
        assert!(lines[1].contains("trap-1"));
        assert!(lines[1].contains("aphid"));
        assert!(lines[1].contains(",12,"));
    }

    #[test]
    fn test_trend_csv_has_total_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trend.csv");

        let mut bucket = TrendBucket::empty(
            Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap(),
        );
        bucket.per_category.insert(Category::Thrips, 7);
        bucket.total = 7;

        write_trend_csv(&path, &[bucket]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("thrips,7"));
        assert!(lines[2].contains("total,7"));
    }
}
