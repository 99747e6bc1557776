use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{compare_predicate, direction, join_titles, ColumnTarget, ColumnType};
use crate::query_builder::{Predicate, QueryBuilder};
use crate::search::{Comparator, FilterValue};
use crate::Result;

/// Page ids.
///
/// With `usetitles` the cell is projected as a JSON pair `[pid, title]` and
/// filtered and sorted by the title, falling back to the page id for pages
/// without one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageType {
    pub usetitles: bool,
}

impl PageType {
    fn title_expr(qb: &mut QueryBuilder, target: &ColumnTarget<'_>) -> Result<String> {
        let titles = join_titles(qb, target.table_alias, &target.expr())?;
        Ok(format!(
            "COALESCE(NULLIF({titles}.title, ''), {})",
            target.expr()
        ))
    }

    /// The page id and title of a stored cell.
    pub fn split(raw: &str) -> (String, Option<String>) {
        if raw.starts_with('[') {
            if let Ok((pid, title)) = serde_json::from_str::<(String, Option<String>)>(raw) {
                return (pid, title.filter(|t| !t.is_empty()));
            }
        }
        (raw.to_string(), None)
    }
}

/// DokuWiki-style page id cleanup: lower case, no blanks, no outer colons.
fn clean_id(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches(':')
        .to_string()
}

impl ColumnType for PageType {
    fn class(&self) -> &'static str {
        "Page"
    }

    fn select(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, alias: &str) -> Result<()> {
        if !self.usetitles {
            qb.add_select_statement(target.expr(), alias);
            return Ok(());
        }
        let titles = join_titles(qb, target.table_alias, &target.expr())?;
        qb.add_select_statement(
            format!("json_array({}, {titles}.title)", target.expr()),
            alias,
        );
        Ok(())
    }

    fn filter(
        &self,
        qb: &mut QueryBuilder,
        target: &ColumnTarget<'_>,
        comparator: Comparator,
        value: &FilterValue,
    ) -> Result<Predicate> {
        let expr = if self.usetitles {
            Self::title_expr(qb, target)?
        } else {
            target.expr()
        };
        Ok(compare_predicate(qb, &expr, comparator, value))
    }

    fn sort(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, ascending: bool) -> Result<()> {
        let expr = if self.usetitles {
            Self::title_expr(qb, target)?
        } else {
            target.expr()
        };
        qb.add_order_by(format!("{expr} {}", direction(ascending)));
        Ok(())
    }

    fn validate(&self, raw: &str) -> Result<String> {
        Ok(clean_id(raw))
    }

    fn render(&self, raw: &str) -> String {
        let (pid, title) = Self::split(raw);
        title.unwrap_or(pid)
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        self.render(a).cmp(&self.render(b))
    }
}
