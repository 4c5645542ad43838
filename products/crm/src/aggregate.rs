//! Grouping and window helpers over already-fetched records.
//!
//! Everything here is a single pass over a slice and never fails: missing or
//! empty category values land in [`UNKNOWN_BUCKET`], missing numbers count as
//! zero.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone};
use serde::{Deserialize, Serialize};

use crate::{CLOSED_LOST, CLOSED_WON, MEETING, SCHEDULED};

pub const UNKNOWN_BUCKET: &str = "Unknown";

/// One bar or slice of a chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
}

impl ChartPoint {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Count records per category, in order of first appearance.
pub fn count_by<'a, T, K>(records: &'a [T], key: K) -> Vec<ChartPoint>
where
    K: Fn(&'a T) -> Option<&'a str>,
{
    sum_by(records, key, |_| Some(1.0))
}

/// Sum a numeric field per category, in order of first appearance.
pub fn sum_by<'a, T, K, V>(records: &'a [T], key: K, value: V) -> Vec<ChartPoint>
where
    K: Fn(&'a T) -> Option<&'a str>,
    V: Fn(&'a T) -> Option<f64>,
{
    let mut points: Vec<ChartPoint> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for record in records {
        let name = bucket_name(key(record));
        let amount = number_or_zero(value(record));
        match index.get(name).copied() {
            Some(slot) => points[slot].value += amount,
            None => {
                index.insert(name, points.len());
                points.push(ChartPoint::new(name, amount));
            }
        }
    }
    points
}

/// Total `value` of deals still in the pipeline.
pub fn open_deal_value<'a, T, S, V>(deals: &'a [T], stage: S, value: V) -> f64
where
    S: Fn(&'a T) -> Option<&'a str>,
    V: Fn(&'a T) -> Option<f64>,
{
    deals
        .iter()
        .filter(|&deal| is_open_stage(stage(deal)))
        .map(|deal| number_or_zero(value(deal)))
        .sum()
}

pub fn is_open_stage(stage: Option<&str>) -> bool {
    !matches!(stage, Some(CLOSED_WON) | Some(CLOSED_LOST))
}

/// Half-open `[start, end)` interval anchored at a local midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpcomingWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl UpcomingWindow {
    pub fn days_from_today(now: DateTime<FixedOffset>, days: i64) -> Self {
        let start = start_of_day(now);
        Self {
            start,
            end: start + Duration::days(days),
        }
    }

    pub fn next_seven_days(now: DateTime<FixedOffset>) -> Self {
        Self::days_from_today(now, 7)
    }

    pub fn contains(&self, at: &DateTime<FixedOffset>) -> bool {
        *at >= self.start && *at < self.end
    }
}

/// Midnight of `now`'s calendar day, in `now`'s own offset.
pub fn start_of_day(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let offset = now.offset().fix();
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    offset
        .from_local_datetime(&midnight)
        .single()
        .unwrap_or(now)
}

pub fn is_upcoming_meeting(
    kind: Option<&str>,
    status: Option<&str>,
    at: Option<&DateTime<FixedOffset>>,
    window: &UpcomingWindow,
) -> bool {
    kind == Some(MEETING)
        && status == Some(SCHEDULED)
        && at.is_some_and(|at| window.contains(at))
}

/// Zero-filled monthly totals for the `months` months ending with `last`'s
/// month, oldest first, keyed `YYYY-MM`. Records without a date are skipped.
pub fn monthly_series<'a, T, D, V>(
    records: &'a [T],
    date: D,
    value: V,
    last: NaiveDate,
    months: u32,
) -> Vec<ChartPoint>
where
    D: Fn(&'a T) -> Option<NaiveDate>,
    V: Fn(&'a T) -> Option<f64>,
{
    let keys = month_keys(last, months);
    let mut totals: HashMap<String, f64> = HashMap::new();
    for record in records {
        if let Some(day) = date(record) {
            *totals.entry(month_key(day)).or_default() += number_or_zero(value(record));
        }
    }
    keys.into_iter()
        .map(|key| {
            let value = totals.get(&key).copied().unwrap_or(0.0);
            ChartPoint::new(key, value)
        })
        .collect()
}

fn month_keys(last: NaiveDate, months: u32) -> Vec<String> {
    let mut cursor = (last.year(), last.month());
    let mut keys = Vec::with_capacity(months as usize);
    for _ in 0..months {
        keys.push(format!("{:04}-{:02}", cursor.0, cursor.1));
        cursor = previous_month(cursor);
    }
    keys.reverse();
    keys
}

fn previous_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn month_key(day: NaiveDate) -> String {
    format!("{:04}-{:02}", day.year(), day.month())
}

fn bucket_name(value: Option<&str>) -> &str {
    match value {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_BUCKET,
    }
}

fn number_or_zero(value: Option<f64>) -> f64 {
    value.filter(|n| n.is_finite()).unwrap_or(0.0)
}
