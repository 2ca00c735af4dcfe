use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

/// Number of days covered by the default window, inclusive of both ends.
pub const DEFAULT_WINDOW_DAYS: u64 = 7;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("Invalid body. Expected {{ startDate: 'YYYY-MM-DD', endDate: 'YYYY-MM-DD' }}.")]
    Malformed,
    #[error("Invalid date range.")]
    Invalid,
    #[error("Date range too large. At most {0} days are supported.")]
    TooLarge(u64),
}

/// An inclusive calendar window, serialized as `{ startDate, endDate }`.
///
/// `start_date <= end_date` holds for every constructed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl DateRange {
    /// Resolves optional caller input against `today`. Never fails.
    ///
    /// Anything that is not a `YYYY-MM-DD` calendar date counts as absent.
    /// A missing end defaults to `today`; a missing start defaults to six days
    /// before the end. A start after the end is ignored.
    pub fn resolve(start: Option<&str>, end: Option<&str>, today: NaiveDate) -> Self {
        let end_date = end.and_then(parse_ymd).unwrap_or(today);
        let start_date = start
            .and_then(parse_ymd)
            .filter(|start| *start <= end_date)
            .unwrap_or_else(|| window_start(end_date));

        DateRange {
            start_date,
            end_date,
        }
    }

    /// [`DateRange::resolve`] against the current UTC date.
    pub fn resolve_now(start: Option<&str>, end: Option<&str>) -> Self {
        Self::resolve(start, end, Utc::now().date_naive())
    }

    /// Both dates are required and must form a valid window.
    pub fn parse_strict(start: Option<&str>, end: Option<&str>) -> Result<Self, DateRangeError> {
        let (Some(start), Some(end)) = (start, end) else {
            return Err(DateRangeError::Malformed);
        };
        if !matches_ymd_pattern(start) || !matches_ymd_pattern(end) {
            return Err(DateRangeError::Malformed);
        }

        let (Some(start_date), Some(end_date)) = (parse_ymd(start), parse_ymd(end)) else {
            return Err(DateRangeError::Invalid);
        };
        if start_date > end_date {
            return Err(DateRangeError::Invalid);
        }

        Ok(DateRange {
            start_date,
            end_date,
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Number of days in the window, counting both ends.
    pub fn len_days(&self) -> u64 {
        (self.end_date - self.start_date).num_days().unsigned_abs() + 1
    }

    /// Rejects windows longer than `max_days`.
    pub fn limit(self, max_days: u64) -> Result<Self, DateRangeError> {
        if self.len_days() > max_days {
            return Err(DateRangeError::TooLarge(max_days));
        }
        Ok(self)
    }

    /// Every day of the window, formatted `YYYY-MM-DD`.
    pub fn days(&self) -> Vec<String> {
        let end = self.end_date;
        self.start_date
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| day.format("%Y-%m-%d").to_string())
            .collect()
    }
}

/// Six days before `end`, clamped so the result still formats as `YYYY-MM-DD`.
fn window_start(end: NaiveDate) -> NaiveDate {
    let start = end
        .checked_sub_days(Days::new(DEFAULT_WINDOW_DAYS - 1))
        .unwrap_or(NaiveDate::MIN);
    match NaiveDate::from_ymd_opt(0, 1, 1) {
        Some(earliest) => start.max(earliest),
        None => start,
    }
}

/// `^\d{4}-\d{2}-\d{2}$`
fn matches_ymd_pattern(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Parses a `YYYY-MM-DD` string that is also a real calendar date.
pub fn parse_ymd(s: &str) -> Option<NaiveDate> {
    if !matches_ymd_pattern(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
