use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::date::parse_date;
use super::{compare_predicate, direction, join_titles, ColumnTarget, ColumnType};
use crate::query_builder::{Predicate, QueryBuilder};
use crate::schema::{Column, PseudoKind};
use crate::search::{Comparator, FilterValue};
use crate::{Error, Result};

/// Date and time stored as `YYYY-MM-DD HH:MM`.
///
/// Bound to `%lastupdate%` the cell is the page revision, a Unix timestamp
/// kept in `titles.lastrev`; it is converted to date-time text in the host's
/// local time for projection and filtering and sorted by the raw number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateTimeType {
    pub format: String,
    pub pastonly: bool,
    pub futureonly: bool,
}

impl Default for DateTimeType {
    fn default() -> Self {
        Self {
            format: "%Y/%m/%d %H:%M".to_string(),
            pastonly: false,
            futureonly: false,
        }
    }
}

fn is_revision(target: &ColumnTarget<'_>) -> bool {
    matches!(target.source, Column::Pseudo(p) if p.kind() == PseudoKind::LastUpdate)
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let (date, time) = raw.split_once(' ').unwrap_or((raw, "00:00"));
    let date = parse_date(date)?;
    let mut hm = time.trim().splitn(3, ':');
    let hour = hm.next()?.trim().parse().ok()?;
    let minute = hm.next().unwrap_or("0").trim().parse().ok()?;
    date.and_hms_opt(hour, minute, 0)
}

impl DateTimeType {
    fn revision_titles(qb: &mut QueryBuilder, target: &ColumnTarget<'_>) -> Result<String> {
        let page = format!("{}.pid", target.table_alias);
        join_titles(qb, target.table_alias, &page)
    }

    fn revision_expr(qb: &mut QueryBuilder, target: &ColumnTarget<'_>) -> Result<String> {
        let titles = Self::revision_titles(qb, target)?;
        Ok(format!("DATETIME({titles}.lastrev, 'unixepoch', 'localtime')"))
    }
}

impl ColumnType for DateTimeType {
    fn class(&self) -> &'static str {
        "DateTime"
    }

    fn select(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, alias: &str) -> Result<()> {
        let expr = if is_revision(target) {
            Self::revision_expr(qb, target)?
        } else {
            target.expr()
        };
        qb.add_select_statement(expr, alias);
        Ok(())
    }

    fn filter(
        &self,
        qb: &mut QueryBuilder,
        target: &ColumnTarget<'_>,
        comparator: Comparator,
        value: &FilterValue,
    ) -> Result<Predicate> {
        let expr = if is_revision(target) {
            Self::revision_expr(qb, target)?
        } else {
            target.expr()
        };
        Ok(compare_predicate(qb, &expr, comparator, value))
    }

    fn sort(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, ascending: bool) -> Result<()> {
        let expr = if is_revision(target) {
            format!("{}.lastrev", Self::revision_titles(qb, target)?)
        } else {
            target.expr()
        };
        qb.add_order_by(format!("{expr} {}", direction(ascending)));
        Ok(())
    }

    fn validate(&self, raw: &str) -> Result<String> {
        let Some(datetime) = parse_datetime(raw) else {
            return Err(Error::Validation(format!(
                "'{}' is not a valid date and time, expected YYYY-MM-DD HH:MM",
                raw.trim()
            )));
        };
        let now = Local::now().naive_local();
        if self.pastonly && datetime > now {
            return Err(Error::Validation(format!("{datetime} lies in the future")));
        }
        if self.futureonly && datetime < now {
            return Err(Error::Validation(format!("{datetime} lies in the past")));
        }
        Ok(datetime.format("%Y-%m-%d %H:%M").to_string())
    }

    fn render(&self, raw: &str) -> String {
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
            .map(|dt| dt.format(&self.format).to_string())
            .unwrap_or_else(|| raw.to_string())
    }

    fn default_comparator(&self) -> &'static str {
        "="
    }
}
