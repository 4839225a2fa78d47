//! Calendar periods and their UTC intervals.
//!
//! Weeks follow ISO-8601: they start on Monday and week 1 is the week that
//! contains the year's first Thursday. All intervals are computed in UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chart::{MONTHLY_CHART_SIZE, WEEKLY_CHART_SIZE, YEARLY_CHART_SIZE};
use crate::{ChartError, Result};

/// Chart granularity, from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Maximum number of entries in a chart of this granularity.
    pub fn chart_limit(self) -> usize {
        match self {
            Granularity::Week => WEEKLY_CHART_SIZE,
            Granularity::Month => MONTHLY_CHART_SIZE,
            Granularity::Year => YEARLY_CHART_SIZE,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        };
        f.write_str(name)
    }
}

/// A chart period: one ISO week, one calendar month, or one calendar year.
///
/// Use the validating constructors [`Period::week`] and [`Period::month`];
/// they reject out-of-range values with [`ChartError::InvalidPeriod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "granularity", rename_all = "lowercase")]
pub enum Period {
    Week { iso_year: i32, iso_week: u32 },
    Month { year: i32, month: u32 },
    Year { year: i32 },
}

impl Period {
    pub fn week(iso_year: i32, iso_week: u32) -> Result<Self> {
        validate_week(iso_year, iso_week)?;
        Ok(Period::Week { iso_year, iso_week })
    }

    pub fn month(year: i32, month: u32) -> Result<Self> {
        validate_month(month)?;
        Ok(Period::Month { year, month })
    }

    pub fn year(year: i32) -> Self {
        Period::Year { year }
    }

    /// The period of the given granularity that contains `instant`.
    pub fn containing(granularity: Granularity, instant: DateTime<Utc>) -> Self {
        match granularity {
            Granularity::Week => {
                let (iso_year, iso_week) = week_key_of(instant);
                Period::Week { iso_year, iso_week }
            }
            Granularity::Month => Period::Month {
                year: instant.year(),
                month: instant.month(),
            },
            Granularity::Year => Period::Year {
                year: instant.year(),
            },
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            Period::Week { .. } => Granularity::Week,
            Period::Month { .. } => Granularity::Month,
            Period::Year { .. } => Granularity::Year,
        }
    }

    /// UTC interval of the period.
    ///
    /// Week intervals end on their last second (inclusive); month and year
    /// intervals end on the first instant of the next period (exclusive).
    pub fn interval(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        match *self {
            Period::Week { iso_year, iso_week } => week_interval(iso_year, iso_week),
            Period::Month { year, month } => month_interval(year, month),
            Period::Year { year } => year_interval(year),
        }
    }

    /// First instant of the period.
    pub fn start(&self) -> Result<DateTime<Utc>> {
        self.interval().map(|(from, _)| from)
    }

    /// The period one step earlier.
    ///
    /// Week 1 steps back to the last ISO week of the previous year and
    /// January steps back to December.
    pub fn previous(&self) -> Self {
        match *self {
            Period::Week { iso_year, iso_week } if iso_week <= 1 => Period::Week {
                iso_year: iso_year - 1,
                iso_week: weeks_in_year(iso_year - 1),
            },
            Period::Week { iso_year, iso_week } => Period::Week {
                iso_year,
                iso_week: iso_week - 1,
            },
            Period::Month { year, month } if month <= 1 => Period::Month {
                year: year - 1,
                month: 12,
            },
            Period::Month { year, month } => Period::Month {
                year,
                month: month - 1,
            },
            Period::Year { year } => Period::Year { year: year - 1 },
        }
    }

    /// The period one step later.
    pub fn next(&self) -> Self {
        match *self {
            Period::Week { iso_year, iso_week } if iso_week >= weeks_in_year(iso_year) => {
                Period::Week {
                    iso_year: iso_year + 1,
                    iso_week: 1,
                }
            }
            Period::Week { iso_year, iso_week } => Period::Week {
                iso_year,
                iso_week: iso_week + 1,
            },
            Period::Month { year, month } if month >= 12 => Period::Month {
                year: year + 1,
                month: 1,
            },
            Period::Month { year, month } => Period::Month {
                year,
                month: month + 1,
            },
            Period::Year { year } => Period::Year { year: year + 1 },
        }
    }

    /// Step `steps` periods forward (positive) or backward (negative).
    pub fn offset(&self, steps: i32) -> Self {
        let mut period = *self;
        for _ in 0..steps.unsigned_abs() {
            period = if steps < 0 {
                period.previous()
            } else {
                period.next()
            };
        }
        period
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Week { iso_year, iso_week } => write!(f, "{iso_year}-W{iso_week:02}"),
            Period::Month { year, month } => write!(f, "{year}-{month:02}"),
            Period::Year { year } => write!(f, "{year}"),
        }
    }
}

/// ISO `(year, week)` of an instant.
pub fn week_key_of(instant: DateTime<Utc>) -> (i32, u32) {
    let week = instant.iso_week();
    (week.year(), week.week())
}

/// Number of ISO weeks in `year` (52 or 53).
///
/// 28 December always falls into the last ISO week of its year.
pub fn weeks_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 28)
        .map(|date| date.iso_week().week())
        .unwrap_or(52)
}

/// Monday 00:00:00 through Sunday 23:59:59 of an ISO week, both inclusive.
pub fn week_interval(iso_year: i32, iso_week: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    validate_week(iso_year, iso_week)?;
    let monday = NaiveDate::from_isoywd_opt(iso_year, iso_week, Weekday::Mon).ok_or_else(|| {
        ChartError::InvalidPeriod(format!("week {iso_week} of {iso_year} does not exist"))
    })?;
    let from = start_of_day(monday);
    let to = from + Duration::days(7) - Duration::seconds(1);
    Ok((from, to))
}

/// `[first instant of the month, first instant of the next month)`.
pub fn month_interval(year: i32, month: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    validate_month(month)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    Ok((first_of_month(year, month)?, first_of_month(next_year, next_month)?))
}

/// `[1 January 00:00:00, 1 January of the next year)`.
pub fn year_interval(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    Ok((first_of_month(year, 1)?, first_of_month(year + 1, 1)?))
}

/// ISO weeks whose interval intersects the calendar month, in calendar order.
///
/// The first and last entries may belong to a neighbouring ISO year, e.g.
/// January 2021 starts in week 53 of 2020.
pub fn weeks_overlapping_month(year: i32, month: u32) -> Result<Vec<(i32, u32)>> {
    let (from, to) = month_interval(year, month)?;
    let mut weeks: Vec<(i32, u32)> = Vec::new();
    let mut day = from;
    while day < to {
        let key = week_key_of(day);
        if weeks.last() != Some(&key) {
            weeks.push(key);
        }
        day += Duration::days(1);
    }
    Ok(weeks)
}

fn validate_week(iso_year: i32, iso_week: u32) -> Result<()> {
    if !(1..=53).contains(&iso_week) {
        return Err(ChartError::InvalidPeriod(format!(
            "week must be between 1 and 53, got {iso_week}"
        )));
    }
    if iso_week > weeks_in_year(iso_year) {
        return Err(ChartError::InvalidPeriod(format!(
            "{iso_year} has only {} ISO weeks, got week {iso_week}",
            weeks_in_year(iso_year)
        )));
    }
    Ok(())
}

fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ChartError::InvalidPeriod(format!(
            "month must be between 1 and 12, got {month}"
        )));
    }
    Ok(())
}

fn first_of_month(year: i32, month: u32) -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(start_of_day)
        .ok_or_else(|| ChartError::InvalidPeriod(format!("year {year} is out of range")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}
