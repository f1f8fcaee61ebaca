//! Inclusive date windows and the series the dashboard charts are built from.
//!
//! All arithmetic is day based. Windows never carry a time of day, so a
//! record dated `end` is inside the window.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::date::format_date;

/// Longest per-year series a caller may ask for.
pub const MAX_YEARS: u32 = 20;

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    #[serde(rename = "inicio")]
    pub start: NaiveDate,
    #[serde(rename = "fin")]
    pub end: NaiveDate,
}

/// A custom window whose start lies after its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvertedWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl std::fmt::Display for InvertedWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "window start {} is after its end {}",
            format_date(self.start),
            format_date(self.end)
        )
    }
}

impl std::error::Error for InvertedWindow {}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// `months` whole calendar months starting on `start`.
fn spanning(start: NaiveDate, months: u32) -> Window {
    let end = start
        .checked_add_months(Months::new(months))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    Window { start, end }
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvertedWindow> {
        if start > end {
            return Err(InvertedWindow { start, end });
        }
        Ok(Window { start, end })
    }

    pub fn day(date: NaiveDate) -> Self {
        Window {
            start: date,
            end: date,
        }
    }

    /// ISO week containing `date`, Monday through Sunday.
    pub fn week(date: NaiveDate) -> Self {
        let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        Window {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn month(date: NaiveDate) -> Self {
        spanning(first_of_month(date), 1)
    }

    /// Calendar quarter containing `date` (Jan-Mar, Apr-Jun, ...).
    pub fn quarter(date: NaiveDate) -> Self {
        let start = first_of_month(date);
        let start = start.with_month(date.month0() / 3 * 3 + 1).unwrap_or(start);
        spanning(start, 3)
    }

    pub fn year(date: NaiveDate) -> Self {
        spanning(date.with_ordinal(1).unwrap_or(date), 12)
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The window of equal length ending the day before this one starts.
    pub fn previous(&self) -> Self {
        Window {
            start: self.start - Duration::days(self.len_days()),
            end: self.start - Duration::days(1),
        }
    }
}

/// A labelled window inside a chart series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub label: String,
    pub window: Window,
}

/// One bucket per calendar year, oldest first, ending with the year of `today`.
pub fn years_back(today: NaiveDate, years: u32) -> Vec<Bucket> {
    let mut buckets = Vec::new();
    let mut window = Window::year(today);
    for _ in 0..years.clamp(1, MAX_YEARS) {
        buckets.push(Bucket {
            label: window.start.year().to_string(),
            window,
        });
        window = Window::year(window.start - Duration::days(1));
    }
    buckets.reverse();
    buckets
}

/// Twelve monthly buckets for the year of `today`.
pub fn months_of_year(today: NaiveDate) -> Vec<Bucket> {
    let year = Window::year(today);
    let mut buckets = Vec::with_capacity(12);
    let mut cursor = year.start;
    while cursor <= year.end {
        let window = Window::month(cursor);
        buckets.push(Bucket {
            label: window.start.format("%Y-%m").to_string(),
            window,
        });
        cursor = window.end + Duration::days(1);
    }
    buckets
}

/// One bucket per day of the month of `today`.
pub fn days_of_month(today: NaiveDate) -> Vec<Bucket> {
    let month = Window::month(today);
    month
        .start
        .iter_days()
        .take_while(|day| *day <= month.end)
        .map(|day| Bucket {
            label: format_date(day),
            window: Window::day(day),
        })
        .collect()
}

/// Seven-day buckets from the first day of the quarter of `today`; the last
/// bucket is clipped to the quarter end.
pub fn weeks_of_quarter(today: NaiveDate) -> Vec<Bucket> {
    let quarter = Window::quarter(today);
    let mut buckets = Vec::new();
    let mut start = quarter.start;
    while start <= quarter.end {
        let end = (start + Duration::days(6)).min(quarter.end);
        buckets.push(Bucket {
            label: format!("Semana {}", buckets.len() + 1),
            window: Window { start, end },
        });
        start = end + Duration::days(1);
    }
    buckets
}

/// Named "current" window relative to today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[serde(alias = "dia")]
    Day,
    #[serde(alias = "semana")]
    Week,
    #[default]
    #[serde(alias = "mes")]
    Month,
    #[serde(alias = "anio")]
    Year,
}

impl Period {
    pub fn window(self, today: NaiveDate) -> Window {
        match self {
            Period::Day => Window::day(today),
            Period::Week => Window::week(today),
            Period::Month => Window::month(today),
            Period::Year => Window::year(today),
        }
    }
}
