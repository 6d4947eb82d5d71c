//! Lenient date parsing for the Date column.
//!
//! Accepts RFC 2822/3339 timestamps, numeric dates (`3/4/2024`, `2024-03-04`,
//! `04.03.24`, `20240304`, `3/4`) and free text containing a month name
//! (`Tuesday, March 4th 2025 at 10am`, `March 4, 25`). Numeric dates are read
//! month-first unless the first number cannot be a month. A missing year is
//! the current one. Unrecognised tokens are skipped.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local, NaiveDate};
use regex::Regex;

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,4})([/.\-])(\d{1,2})([/.\-])(\d{1,4})\b").unwrap()
});
static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})(\d{2})(\d{2})\b").unwrap());
static MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").unwrap());
static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}:\d{2}(:\d{2})?(\.\d+)?\s*([ap]\.?m\.?)?").unwrap()
});
static ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,2})(st|nd|rd|th)$").unwrap());

/// Render `value` as `M/D/YYYY`, or return it unchanged if no date is found.
pub fn normalize_mdy(value: &str) -> String {
    match parse_lenient(value) {
        Some(date) => format!("{}/{}/{}", date.month(), date.day(), date.year()),
        None => value.to_string(),
    }
}

/// Best-effort date extraction. `None` when the text holds no usable date.
pub fn parse_lenient(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    parse_numeric(trimmed).or_else(|| parse_textual(trimmed))
}

fn parse_numeric(text: &str) -> Option<NaiveDate> {
    let full = NUMERIC_DATE.captures_iter(text).find_map(|caps| {
        // Mixed separators ("3/4-2024") are not dates.
        if caps[2] != caps[4] {
            return None;
        }
        let first = &caps[1];
        let a: u32 = first.parse().ok()?;
        let b: u32 = caps[3].parse().ok()?;
        let c: u32 = caps[5].parse().ok()?;

        if first.len() == 4 {
            // Year-first: YYYY-MM-DD.
            return NaiveDate::from_ymd_opt(a as i32, b, c);
        }

        let year = expand_year(c, caps[5].len())?;
        month_first(year, a, b)
    });
    if full.is_some() {
        return full;
    }

    let compact = COMPACT_DATE.captures_iter(text).find_map(|caps| {
        let year: i32 = caps[1].parse().ok()?;
        NaiveDate::from_ymd_opt(year, caps[2].parse().ok()?, caps[3].parse().ok()?)
    });
    if compact.is_some() {
        return compact;
    }

    // "3/4" only when nothing in the text looked like a full numeric date,
    // so a rejected "13/13/2024" is not re-read as a month and day.
    if NUMERIC_DATE.is_match(text) {
        return None;
    }
    MONTH_DAY.captures_iter(text).find_map(|caps| {
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        month_first(Local::now().year(), a, b)
    })
}

/// `a/b` as month/day, or day/month when `a` cannot be a month.
fn month_first(year: i32, a: u32, b: u32) -> Option<NaiveDate> {
    if a > 12 {
        NaiveDate::from_ymd_opt(year, b, a)
    } else {
        NaiveDate::from_ymd_opt(year, a, b)
    }
}

fn parse_textual(text: &str) -> Option<NaiveDate> {
    let without_times = CLOCK_TIME.replace_all(text, " ");
    let tokens: Vec<String> = without_times
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect();

    let month = tokens.iter().find_map(|t| month_from_token(t))?;

    let mut day = None;
    let mut day_at = 0;
    let mut year = None;
    // A bare one- or two-digit number right after an adjacent month and day
    // ("March 4, 25", "4 Feb 99").
    let mut short_year = None;
    let is_month = |i: usize| tokens.get(i).is_some_and(|t| month_from_token(t).is_some());
    for (i, token) in tokens.iter().enumerate() {
        let numeric = token.chars().all(|c| c.is_ascii_digit());
        if numeric && token.len() == 4 {
            if year.is_none() {
                year = token.parse::<i32>().ok();
            }
            continue;
        }
        if day.is_none() {
            day = day_from_token(token);
            day_at = i;
            continue;
        }
        let after_pair = (i == day_at + 1 && day_at > 0 && is_month(day_at - 1))
            || (i == day_at + 2 && is_month(day_at + 1));
        if short_year.is_none() && numeric && token.len() <= 2 && after_pair {
            short_year = token
                .parse::<u32>()
                .ok()
                .and_then(|value| expand_year(value, token.len()));
        }
    }

    let year = year
        .or(short_year)
        .unwrap_or_else(|| Local::now().year());
    NaiveDate::from_ymd_opt(year, month, day.unwrap_or(1))
}

fn day_from_token(token: &str) -> Option<u32> {
    let digits = if token.chars().all(|c| c.is_ascii_digit()) && token.len() <= 2 {
        token
    } else {
        ORDINAL.captures(token)?.get(1)?.as_str()
    };
    digits.parse::<u32>().ok().filter(|d| (1..=31).contains(d))
}

fn month_from_token(token: &str) -> Option<u32> {
    let month = match token {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Two-digit years pivot at 70: `24` → 2024, `85` → 1985.
fn expand_year(value: u32, digits: usize) -> Option<i32> {
    match digits {
        1 | 2 if value < 70 => Some(2000 + value as i32),
        1 | 2 => Some(1900 + value as i32),
        4 => Some(value as i32),
        _ => None,
    }
}
