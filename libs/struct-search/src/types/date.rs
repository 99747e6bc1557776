use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ColumnType;
use crate::{Error, Result};

/// Calendar dates stored as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateType {
    /// `chrono` format string used for display.
    pub format: String,
    pub prefilltoday: bool,
    pub pastonly: bool,
    pub futureonly: bool,
}

impl Default for DateType {
    fn default() -> Self {
        Self {
            format: "%Y/%m/%d".to_string(),
            prefilltoday: false,
            pastonly: false,
            futureonly: false,
        }
    }
}

impl DateType {
    /// Pre-filled input for editors: today when `prefilltoday` is set.
    pub fn prefill(&self) -> Option<String> {
        self.prefilltoday
            .then(|| Local::now().date_naive().format("%Y-%m-%d").to_string())
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.trim().splitn(3, '-');
    let year = parts.next()?.trim().parse().ok()?;
    let month = parts.next()?.trim().parse().ok()?;
    let day = parts.next()?.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

impl ColumnType for DateType {
    fn class(&self) -> &'static str {
        "Date"
    }

    fn validate(&self, raw: &str) -> Result<String> {
        let Some(date) = parse_date(raw) else {
            return Err(Error::Validation(format!(
                "'{}' is not a valid date, expected YYYY-MM-DD",
                raw.trim()
            )));
        };
        let today = Local::now().date_naive();
        if self.pastonly && date > today {
            return Err(Error::Validation(format!("{date} lies in the future")));
        }
        if self.futureonly && date < today {
            return Err(Error::Validation(format!("{date} lies in the past")));
        }
        Ok(date.format("%Y-%m-%d").to_string())
    }

    fn render(&self, raw: &str) -> String {
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date.format(&self.format).to_string(),
            Err(_) => raw.to_string(),
        }
    }

    fn default_comparator(&self) -> &'static str {
        "="
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_pads_and_checks_calendar() {
        let t = DateType::default();
        assert_eq!(t.validate("2016-3-7").unwrap(), "2016-03-07");
        assert!(t.validate("2016-02-30").is_err());
        assert!(t.validate("2016-02").is_err());
        assert!(t.validate("yesterday").is_err());
    }

    #[test]
    fn past_and_future_bounds() {
        let past = DateType {
            pastonly: true,
            ..Default::default()
        };
        assert!(past.validate("2999-01-01").is_err());
        assert!(past.validate("2000-01-01").is_ok());

        let future = DateType {
            futureonly: true,
            ..Default::default()
        };
        assert!(future.validate("2000-01-01").is_err());
    }

    #[test]
    fn renders_with_configured_format() {
        let t = DateType::default();
        assert_eq!(t.render("2016-03-07"), "2016/03/07");
        assert_eq!(t.render("garbage"), "garbage");
    }
}
