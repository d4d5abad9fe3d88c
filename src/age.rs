//! age.rs
//!
//! Human-relative description of when an account was created, in the style
//! "3 years ago" / "1 month ago" / "a few seconds ago".
//!
//! Chrono does not provide a calendar-aware year/month/day diff, so the
//! borrowing rules are implemented here:
//!   • day underflow borrows from the previous month (28–31 days)
//!   • month underflow borrows from the year
//!   • leap years are honoured when February is borrowed

use chrono::{DateTime, Datelike, Utc};

pub const UNKNOWN: &str = "Unknown";

/// Returns e.g. `"5 years ago"` for an account created at `created_at`.
pub fn joined_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if created_at >= now {
        return "a few seconds ago".to_string();
    }

    let (years, months, days) = calendar_diff(created_at, now);
    if years > 0 {
        return ago(years, "year");
    }
    if months > 0 {
        return ago(months, "month");
    }
    if days >= 7 {
        return ago(days / 7, "week");
    }
    if days > 0 {
        return ago(days, "day");
    }

    let elapsed = now - created_at;
    match (elapsed.num_hours(), elapsed.num_minutes()) {
        (h, _) if h > 0 => ago(h as i32, "hour"),
        (_, m) if m > 0 => ago(m as i32, "minute"),
        _ => "a few seconds ago".to_string(),
    }
}

fn ago(n: i32, unit: &str) -> String {
    format!("{n} {unit}{} ago", plural(n))
}

/// Whole years, months and days between two instants (`from <= to`).
fn calendar_diff(from: DateTime<Utc>, to: DateTime<Utc>) -> (i32, i32, i32) {
    let start = from.date_naive();
    let mut end = to.date_naive();

    // A partial day does not count as a day.
    if to.time() < from.time() {
        end = end.pred_opt().unwrap_or(end);
    }

    let mut years = end.year() - start.year();
    let mut months = end.month() as i32 - start.month() as i32;
    let mut days = end.day() as i32 - start.day() as i32;

    // Fix day underflow: borrow the previous month, clamping the start day to
    // that month's length (Jan 31 + 1 month lands on the last day of February).
    if days < 0 {
        months -= 1;

        let (prev_year, prev_month) = if end.month() == 1 {
            (end.year() - 1, 12)
        } else {
            (end.year(), end.month() - 1)
        };
        let days_in_prev_month = days_in_month(prev_year, prev_month) as i32;
        days = days_in_prev_month - (start.day() as i32).min(days_in_prev_month)
            + end.day() as i32;
    }

    // Fix month underflow
    if months < 0 {
        years -= 1;
        months += 12;
    }

    (years, months, days)
}

fn plural(n: i32) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Returns number of days in a given year/month (handles leap years)
fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
