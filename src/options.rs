use crate::error::Error;
use crate::result::Result;

use time::{Date, Duration, Month, OffsetDateTime};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Include the kids sections.
    pub kids: bool,
    /// Log each resolved section as a table.
    pub print_lists: bool,
    /// Platform names to run; empty runs all.
    pub platforms: Vec<String>,
    /// Day of the dated pages, `YYYY-MM-DD`. Defaults to yesterday.
    pub date: Option<String>,
}

impl RunOptions {
    pub fn includes(&self, platform: &str) -> bool {
        self.platforms.is_empty()
            || self
                .platforms
                .iter()
                .any(|name| name.eq_ignore_ascii_case(platform))
    }

    pub fn page_date(&self) -> String {
        match &self.date {
            Some(date) => date.clone(),
            None => format_date(OffsetDateTime::now_utc().date() - Duration::days(1)),
        }
    }
}

fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Checks a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<String> {
    let invalid = || Error::Config(format!("invalid date '{}', expected YYYY-MM-DD", value));

    let mut parts = value.splitn(3, '-');
    let (year, month, day) = match (parts.next(), parts.next(), parts.next()) {
        (Some(year), Some(month), Some(day)) if year.len() == 4 && month.len() == 2 && day.len() == 2 => {
            (year, month, day)
        }
        _ => return Err(invalid()),
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u8 = month.parse().map_err(|_| invalid())?;
    let day: u8 = day.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;

    Ok(format_date(date))
}
