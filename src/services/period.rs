use chrono::{Datelike, Local, Months, NaiveDate};
use std::fmt;

use crate::error::{AppError, AppResult};
use crate::models::PeriodRange;

/// Calendar month. Orders by year, then month, so "2024-6" and "2024-06"
/// compare equal once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> AppResult<Self> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(AppError::MalformedPeriod(format!("{}-{}", year, month)));
        }
        Ok(YearMonth { year, month })
    }

    /// Accepts `YYYY-MM` and the unpadded `YYYY-M`.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let malformed = || AppError::MalformedPeriod(raw.to_string());
        let (year, month) = raw.trim().split_once('-').ok_or_else(malformed)?;

        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if year.len() != 4 || !digits(year) || month.len() > 2 || !digits(month) {
            return Err(malformed());
        }

        let year = year.parse::<i32>().map_err(|_| malformed())?;
        let month = month.parse::<u32>().map_err(|_| malformed())?;
        YearMonth::new(year, month).map_err(|_| malformed())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        YearMonth::from_date(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn succ(&self) -> YearMonth {
        if self.month == 12 {
            YearMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Same month, one calendar year earlier. Year 1 has no earlier year and
    /// yields `MalformedPeriod`; aggregation treats that as an empty window.
    pub fn previous_year(&self) -> AppResult<YearMonth> {
        let shifted = self
            .first_day()
            .and_then(|d| d.checked_sub_months(Months::new(12)))
            .ok_or_else(|| AppError::MalformedPeriod(self.to_string()))?;
        YearMonth::new(shifted.year(), shifted.month())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

pub fn normalize_year_month(raw: &str) -> AppResult<String> {
    YearMonth::parse(raw).map(|ym| ym.to_string())
}

pub fn parse_period(period: &PeriodRange) -> AppResult<(YearMonth, YearMonth)> {
    Ok((YearMonth::parse(&period.from)?, YearMonth::parse(&period.to)?))
}

/// Every month from `from` through `to`, inclusive. Empty when `from > to`.
pub fn iter_months(from: YearMonth, to: YearMonth) -> impl Iterator<Item = YearMonth> {
    std::iter::successors(Some(from), |current| Some(current.succ())).take_while(move |m| *m <= to)
}

pub fn month_range(from: &str, to: &str) -> AppResult<Vec<YearMonth>> {
    let from = YearMonth::parse(from)?;
    let to = YearMonth::parse(to)?;
    Ok(iter_months(from, to).collect())
}

pub fn previous_year(period: &PeriodRange) -> AppResult<PeriodRange> {
    let (from, to) = parse_period(period)?;
    Ok(PeriodRange::new(
        from.previous_year()?.to_string(),
        to.previous_year()?.to_string(),
    ))
}

/// January of the current year through the current month.
pub fn default_period() -> PeriodRange {
    let now = YearMonth::current();
    PeriodRange::new(format!("{:04}-01", now.year()), now.to_string())
}
