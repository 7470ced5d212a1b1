// Utility helpers for parsing and number formatting.
//
// All the forgiving CSV cell handling lives here so loaders can work with
// typed values.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

static THOUSANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid thousands pattern"));

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})").expect("valid year pattern"));

/// Parse a numeric cell, accepting thousands separators like `1,234.5`.
///
/// Commas are only stripped from well-formed groupings; a decimal comma
/// (`12,50`) or a stray one (`1,2,3`) returns `None` rather than a value
/// off by orders of magnitude. Also `None` for empty cells and cells
/// containing letters.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if s.contains(',') {
        if !THOUSANDS.is_match(s) {
            return None;
        }
        return s.replace(',', "").parse::<f64>().ok();
    }
    s.parse::<f64>().ok()
}

/// Parse a timestamp cell in any of the layouts the exports use.
///
/// Date-only values land at midnight. Offsets in RFC 3339 values are
/// dropped, keeping the local wall-clock time.
pub fn parse_timestamp_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    parse_date_safe(Some(s)).and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a `DD/MM` day cell, borrowing the year from elsewhere.
pub fn parse_day_month(s: &str, year: i32) -> Option<NaiveDate> {
    let (d, m) = s.trim().split_once('/')?;
    NaiveDate::from_ymd_opt(year, m.trim().parse().ok()?, d.trim().parse().ok()?)
}

/// First 4-digit run in a sheet or file name, e.g. `raw2024.csv` -> 2024.
pub fn year_from_name(name: &str) -> Option<i32> {
    YEAR.captures(name)?.get(1)?.as_str().parse().ok()
}

pub fn average(v: &[f64]) -> f64 {
    // Returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with `en` thousands separators, e.g. `1,234,567.89`.
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Percentage label with one decimal, e.g. `66.7%`.
pub fn format_pct(pct: f64) -> String {
    format!("{:.1}%", pct)
}
