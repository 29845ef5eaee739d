//! Day-by-issue aggregation of worklog entries.

use crate::calendar::{week_days, week_start_date, weekday_label};
use crate::worklogs::WorklogEntry;
use chrono::{Local, NaiveDate, TimeZone, Weekday};
use std::collections::BTreeMap;

/// Seven-day by issue table of summed durations with row, column and grand totals.
/// Empty (no days, no issues) when built from no entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationMatrix {
    pub days: Vec<NaiveDate>,
    /// Distinct issue keys in lexicographic order.
    pub issues: Vec<String>,
    cells: BTreeMap<String, BTreeMap<NaiveDate, u64>>,
    row_totals: BTreeMap<String, u64>,
    column_totals: BTreeMap<NaiveDate, u64>,
    grand_total: u64,
}

impl AggregationMatrix {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn cell(&self, issue_key: &str, day: NaiveDate) -> u64 {
        self.cells
            .get(issue_key)
            .and_then(|row| row.get(&day))
            .copied()
            .unwrap_or(0)
    }

    pub fn row_total(&self, issue_key: &str) -> u64 {
        self.row_totals.get(issue_key).copied().unwrap_or(0)
    }

    pub fn column_total(&self, day: NaiveDate) -> u64 {
        self.column_totals.get(&day).copied().unwrap_or(0)
    }

    pub fn row_totals(&self) -> &BTreeMap<String, u64> {
        &self.row_totals
    }

    pub fn column_totals(&self) -> &BTreeMap<NaiveDate, u64> {
        &self.column_totals
    }

    pub fn grand_total(&self) -> u64 {
        self.grand_total
    }

    /// Column headers (`"Mon"`, `"Tue"`, ...) matching `days`.
    pub fn day_labels(&self) -> Vec<String> {
        self.days.iter().copied().map(weekday_label).collect()
    }
}

/// Builds the matrix in the local timezone with weeks starting on Monday.
pub fn build_matrix(entries: &[WorklogEntry]) -> AggregationMatrix {
    build_matrix_in(entries, &Local, Weekday::Mon)
}

/// Builds the matrix with calendar days taken in `tz`.
///
/// The seven days are the week (starting on `week_start`) that contains the earliest entry.
/// Entries whose day falls outside that week are left out of the matrix.
pub fn build_matrix_in<Tz: TimeZone>(
    entries: &[WorklogEntry],
    tz: &Tz,
    week_start: Weekday,
) -> AggregationMatrix {
    let local_day = |entry: &WorklogEntry| entry.started_at.with_timezone(tz).date_naive();

    let Some(earliest) = entries.iter().min_by_key(|entry| entry.started_at) else {
        return AggregationMatrix::default();
    };
    let days = week_days(week_start_date(local_day(earliest), week_start));

    let mut cells: BTreeMap<String, BTreeMap<NaiveDate, u64>> = BTreeMap::new();
    for entry in entries {
        let day = local_day(entry);
        if !days.contains(&day) {
            continue;
        }
        *cells
            .entry(entry.issue_key.clone())
            .or_default()
            .entry(day)
            .or_insert(0) += entry.duration_seconds;
    }

    let issues: Vec<String> = cells.keys().cloned().collect();
    let row_totals: BTreeMap<String, u64> = cells
        .iter()
        .map(|(issue, row)| (issue.clone(), row.values().sum()))
        .collect();
    let column_totals: BTreeMap<NaiveDate, u64> = days
        .iter()
        .map(|day| {
            let total = cells.values().filter_map(|row| row.get(day)).sum();
            (*day, total)
        })
        .collect();
    let grand_total = row_totals.values().sum();

    AggregationMatrix {
        days,
        issues,
        cells,
        row_totals,
        column_totals,
        grand_total,
    }
}

/// Compact duration for a grid cell: `-` under a minute, `3` for whole hours,
/// `3: 15` for hours and minutes, `0:45` for minutes only.
pub fn format_short_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    match (hours, minutes) {
        (0, 0) => "-".to_string(),
        (0, m) => format!("0:{m}"),
        (h, 0) => format!("{h}"),
        (h, m) => format!("{h}: {m}"),
    }
}
