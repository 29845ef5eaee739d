//! Calendar helpers shared by week windows and matrix anchoring.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

/// First day of the week (per `week_start`) that contains `date`.
pub fn week_start_date(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset =
        (date.weekday().num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7;
    date - Duration::days(i64::from(offset))
}

/// The seven consecutive dates of the week starting on `first`.
pub fn week_days(first: NaiveDate) -> Vec<NaiveDate> {
    first.iter_days().take(7).collect()
}

/// Start of `date` in `tz`. On a DST gap the first valid instant after midnight is used.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => (1..=3)
            .filter_map(|hours| {
                tz.from_local_datetime(&(midnight + Duration::hours(hours)))
                    .earliest()
            })
            .map(|local| local.with_timezone(&Utc))
            .next()
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}

/// Short weekday label used as a matrix column header.
pub fn weekday_label(date: NaiveDate) -> String {
    date.format("%a").to_string()
}
