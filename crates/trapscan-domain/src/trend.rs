//! Trend bucketing
//!
//! Rolls an arbitrary collection of scan records into fixed, non-overlapping
//! time windows. Bucket boundaries are calendar-aligned in UTC: day buckets
//! run midnight to midnight, week buckets start on the configured weekday,
//! month and year buckets follow calendar boundaries. The newest bucket is
//! capped at the caller-supplied `now` and is the only one that may cover a
//! partial period.
//!
//! `now` is always an explicit argument; nothing here reads the system clock.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

use trapscan_types::{RangeSpec, ScanRecord, TrendBucket};

fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn first_of_month(year: i32, month: u32) -> DateTime<Utc> {
    // month is always in 1..=12 here
    NaiveDate::from_ymd_opt(year, month, 1)
        .expect("first day of month is a valid date")
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Largest calendar boundary `<= t` for the range's granularity
fn floor_boundary(t: DateTime<Utc>, range: RangeSpec, week_start: Weekday) -> DateTime<Utc> {
    match range {
        RangeSpec::Days(_) => start_of_day(t),
        RangeSpec::Weeks(_) => {
            let days_back = (7 + i64::from(t.weekday().num_days_from_monday())
                - i64::from(week_start.num_days_from_monday()))
                % 7;
            start_of_day(t) - Duration::days(days_back)
        }
        RangeSpec::Months(_) => first_of_month(t.year(), t.month()),
        RangeSpec::Years(_) => first_of_month(t.year(), 1),
    }
}

/// Boundary immediately preceding `boundary` on the same calendar grid
fn step_back(boundary: DateTime<Utc>, range: RangeSpec) -> DateTime<Utc> {
    match range {
        RangeSpec::Days(_) => boundary - Duration::days(1),
        RangeSpec::Weeks(_) => boundary - Duration::days(7),
        RangeSpec::Months(_) => {
            if boundary.month() == 1 {
                first_of_month(boundary.year() - 1, 12)
            } else {
                first_of_month(boundary.year(), boundary.month() - 1)
            }
        }
        RangeSpec::Years(_) => first_of_month(boundary.year() - 1, 1),
    }
}

/// Bucket a scan collection into an ordered trend, oldest first.
///
/// The buckets exactly and disjointly tile the span ending at `now`
/// (exclusive); every included scan falls into exactly one bucket, and
/// scans outside the span contribute to nothing. Buckets with no scans are
/// still emitted so charts get a continuous window sequence.
pub fn build_trend(
    scans: &[ScanRecord],
    range: RangeSpec,
    now: DateTime<Utc>,
    week_start: Weekday,
) -> Vec<TrendBucket> {
    let n = range.bucket_count() as usize;
    if n == 0 {
        return Vec::new();
    }

    // Newest boundary is the last grid point strictly before `now`, so a
    // `now` exactly on the grid yields only full windows.
    let mut boundary = floor_boundary(now, range, week_start);
    if boundary >= now {
        boundary = step_back(boundary, range);
    }

    let mut starts = Vec::with_capacity(n);
    for _ in 0..n {
        starts.push(boundary);
        boundary = step_back(boundary, range);
    }
    starts.reverse();

    let mut buckets: Vec<TrendBucket> = (0..n)
        .map(|i| {
            let end = if i + 1 < n { starts[i + 1] } else { now };
            TrendBucket::empty(starts[i], end)
        })
        .collect();

    for scan in scans {
        if scan.timestamp < starts[0] || scan.timestamp >= now {
            continue;
        }
        let idx = starts.partition_point(|s| *s <= scan.timestamp) - 1;
        let bucket = &mut buckets[idx];
        for aggregated in &scan.aggregated_counts {
            let amount = u64::from(aggregated.count);
            *bucket.per_category.entry(aggregated.category).or_insert(0) += amount;
            bucket.total += amount;
        }
    }

    buckets
}
