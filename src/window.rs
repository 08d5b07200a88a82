//! Date window generators
//!
//! Splits an inclusive `[start, end]` range into consecutive, non-overlapping
//! [`DateWindow`]s. Generators are lazy iterators and cheap to recreate.
//!
//! Edge windows are clipped to the requested range: the first weekly window
//! runs from `start` to the following Sunday, the first monthly window from
//! `start` to the end of that month, and the last window always ends at `end`.

use crate::{DateWindow, Mode};
use chrono::{Datelike, Days, Months, NaiveDate};

/// Calendar unit a generator steps by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One calendar day
    Day,
    /// Monday–Sunday week
    Week,
    /// Calendar month
    Month,
}

impl Granularity {
    /// Granularity for a windowed mode, `None` for full mode
    pub fn for_mode(mode: Mode) -> Option<Self> {
        match mode {
            Mode::Full => None,
            Mode::Daily => Some(Granularity::Day),
            Mode::Weekly => Some(Granularity::Week),
            Mode::Monthly => Some(Granularity::Month),
        }
    }

    /// Last day of the unit containing `date`
    fn unit_end(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                let to_sunday = 6 - u64::from(date.weekday().num_days_from_monday());
                date.checked_add_days(Days::new(to_sunday))
                    .unwrap_or(NaiveDate::MAX)
            }
            Granularity::Month => date
                .with_day(1)
                .and_then(|first| first.checked_add_months(Months::new(1)))
                .and_then(|next| next.pred_opt())
                .unwrap_or(NaiveDate::MAX),
        }
    }
}

/// Lazy, single-pass sequence of windows covering `[start, end]`
#[derive(Debug, Clone)]
pub struct Windows {
    next_start: Option<NaiveDate>,
    end: NaiveDate,
    granularity: Granularity,
}

impl Windows {
    /// Windows of the given granularity; empty when `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Self {
        Self {
            next_start: (start <= end).then_some(start),
            end,
            granularity,
        }
    }
}

impl Iterator for Windows {
    type Item = DateWindow;

    fn next(&mut self) -> Option<DateWindow> {
        let start = self.next_start?;
        let window_end = self.granularity.unit_end(start).min(self.end);
        self.next_start = window_end.succ_opt().filter(|d| *d <= self.end);
        Some(DateWindow {
            start,
            end: window_end,
        })
    }
}

/// One window per calendar day: `(d, d)` for each `d` in `[start, end]`
pub fn day_windows(start: NaiveDate, end: NaiveDate) -> Windows {
    Windows::new(start, end, Granularity::Day)
}

/// Monday–Sunday windows clipped to `[start, end]`
pub fn week_windows(start: NaiveDate, end: NaiveDate) -> Windows {
    Windows::new(start, end, Granularity::Week)
}

/// Calendar-month windows clipped to `[start, end]`
pub fn month_windows(start: NaiveDate, end: NaiveDate) -> Windows {
    Windows::new(start, end, Granularity::Month)
}
