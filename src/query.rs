//! SoQL query parameter builders
//!
//! Pure functions that turn an offset/limit page or a date window into the
//! query-string parameters understood by a SODA endpoint (`$offset`, `$limit`,
//! `$select`, `$where`, `$order`). Nothing here performs I/O.

use crate::DateWindow;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use tracing::warn;

/// Query-string parameters for one request, in deterministic key order
pub type QueryParams = BTreeMap<String, String>;

/// Column the `$where` date predicate applies to unless configured otherwise
pub const DEFAULT_DATE_COLUMN: &str = "date";

/// Query builder errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Malformed date string or out-of-range year/month/day
    #[error("invalid date {input:?}: {reason}")]
    InvalidDate {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Build `$offset` / `$limit` parameters, plus `$select` when given.
///
/// The column selection is passed through verbatim.
pub fn offset_params(offset: u64, limit: u64, select: Option<&str>) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("$offset".to_string(), offset.to_string());
    params.insert("$limit".to_string(), limit.to_string());
    if let Some(select) = select {
        params.insert("$select".to_string(), select.to_string());
    }
    params
}

/// Build the `$where` parameter for an inclusive date window, plus `$select`.
pub fn window_params(start: NaiveDate, end: NaiveDate, select: Option<&str>) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert(
        "$where".to_string(),
        window_clause(DEFAULT_DATE_COLUMN, start, end),
    );
    if let Some(select) = select {
        params.insert("$select".to_string(), select.to_string());
    }
    params
}

/// Inclusive day-granular predicate: `col >= 'startT00:00:00' AND col <= 'endT23:59:59'`
pub fn window_clause(column: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{column} >= '{}' AND {column} <= '{}'",
        day_start(start),
        day_end(end)
    )
}

/// Predicate for an optionally open-ended range (used by full mode filters).
///
/// Returns `None` when neither bound is given.
pub fn range_where(column: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<String> {
    match (start, end) {
        (Some(s), Some(e)) => Some(window_clause(column, s, e)),
        (Some(s), None) => Some(format!("{column} >= '{}'", day_start(s))),
        (None, Some(e)) => Some(format!("{column} <= '{}'", day_end(e))),
        (None, None) => None,
    }
}

/// Build a `count(1)` aggregate query over a window
pub fn count_params(column: &str, window: &DateWindow) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("$select".to_string(), "count(1)".to_string());
    params.insert(
        "$where".to_string(),
        window_clause(column, window.start(), window.end()),
    );
    params
}

fn day_start(d: NaiveDate) -> String {
    format!("{}T00:00:00", d.format("%Y-%m-%d"))
}

fn day_end(d: NaiveDate) -> String {
    format!("{}T23:59:59", d.format("%Y-%m-%d"))
}

/// Last valid day of a month, `None` if the month itself is invalid
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?;
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}

/// Parse a strict `YYYY-MM-DD` date.
///
/// A day past the end of the month is clamped to the month's last day
/// (`2020-04-31` → `2020-04-30`) with a warning. A malformed string, month
/// outside 1–12 or day 0 is rejected.
pub fn parse_date(input: &str) -> Result<NaiveDate, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidDate {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let bytes = input.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !well_formed {
        return Err(invalid("expected YYYY-MM-DD"));
    }

    let year: i32 = input[0..4].parse().map_err(|_| invalid("bad year"))?;
    let month: u32 = input[5..7].parse().map_err(|_| invalid("bad month"))?;
    let day: u32 = input[8..10].parse().map_err(|_| invalid("bad day"))?;

    let last = last_day_of_month(year, month).ok_or_else(|| invalid("month out of range"))?;
    if day == 0 {
        return Err(invalid("day out of range"));
    }
    let day = if day > last {
        warn!(
            "{} is out of range; using {:04}-{:02}-{:02} instead",
            input, year, month, last
        );
        last
    } else {
        day
    };

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid("date out of range"))
}

/// One page request: the ephemeral description of a single HTTP call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Rows to skip
    pub offset: u64,
    /// Rows to fetch (the configured chunk size)
    pub limit: u64,
    /// Verbatim `$select` column list
    pub select: Option<String>,
    /// Date window the page is scoped to
    pub window: Option<DateWindow>,
    /// Extra predicate used by full mode (`range_where`)
    pub filter: Option<String>,
    /// Optional `$order` clause
    pub order: Option<String>,
    /// Column the window predicate applies to
    pub date_column: String,
}

impl ChunkRequest {
    /// Page at `offset` with `limit` rows and no scoping
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            select: None,
            window: None,
            filter: None,
            order: None,
            date_column: DEFAULT_DATE_COLUMN.to_string(),
        }
    }

    /// Render the request as query parameters
    pub fn to_params(&self) -> QueryParams {
        let mut params = offset_params(self.offset, self.limit, self.select.as_deref());
        let predicate = match &self.window {
            Some(w) => Some(window_clause(&self.date_column, w.start(), w.end())),
            None => self.filter.clone(),
        };
        if let Some(predicate) = predicate {
            params.insert("$where".to_string(), predicate);
        }
        if let Some(order) = &self.order {
            params.insert("$order".to_string(), order.clone());
        }
        params
    }
}
