use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{compare_predicate, compare_predicate_with, direction, ColumnTarget, ColumnType};
use crate::query_builder::{Combinator, Predicate, QueryBuilder};
use crate::search::{Comparator, FilterValue};
use crate::{Error, Result};

/// Numbers, compared and sorted numerically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimalType {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub prefix: String,
    pub postfix: String,
}

fn parse(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

impl ColumnType for DecimalType {
    fn class(&self) -> &'static str {
        "Decimal"
    }

    /// Ordered comparators compare numerically and skip empty cells.
    fn filter(
        &self,
        qb: &mut QueryBuilder,
        target: &ColumnTarget<'_>,
        comparator: Comparator,
        value: &FilterValue,
    ) -> Result<Predicate> {
        let expr = target.expr();
        if !comparator.is_ordering() {
            return Ok(compare_predicate(qb, &expr, comparator, value));
        }
        let numeric = compare_predicate_with(
            qb,
            &format!("CAST({expr} AS NUMERIC)"),
            comparator,
            value,
            |ph| format!("CAST({ph} AS NUMERIC)"),
        );
        Ok(Predicate::group()
            .with(Combinator::And, Predicate::leaf(format!("{expr} != ''")))
            .with(Combinator::And, numeric))
    }

    fn sort(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, ascending: bool) -> Result<()> {
        qb.add_order_by(format!(
            "CAST({} AS NUMERIC) {}",
            target.expr(),
            direction(ascending)
        ));
        Ok(())
    }

    fn validate(&self, raw: &str) -> Result<String> {
        let Some(number) = parse(raw) else {
            return Err(Error::Validation(format!("'{}' is not a number", raw.trim())));
        };
        if let Some(min) = self.min {
            if number < min {
                return Err(Error::Validation(format!("{number} is smaller than {min}")));
            }
        }
        if let Some(max) = self.max {
            if number > max {
                return Err(Error::Validation(format!("{number} is larger than {max}")));
            }
        }
        Ok(number.normalize().to_string())
    }

    fn render(&self, raw: &str) -> String {
        format!("{}{raw}{}", self.prefix, self.postfix)
    }

    fn default_comparator(&self) -> &'static str {
        "="
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        match (parse(a), parse(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.cmp(b),
        }
    }
}
