use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{direction, ColumnTarget, ColumnType};
use crate::query_builder::QueryBuilder;
use crate::Result;

/// Free text, optionally decorated with a prefix and postfix on display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextType {
    pub prefix: String,
    pub postfix: String,
}

impl ColumnType for TextType {
    fn class(&self) -> &'static str {
        "Text"
    }

    fn sort(&self, qb: &mut QueryBuilder, target: &ColumnTarget<'_>, ascending: bool) -> Result<()> {
        qb.add_order_by(format!(
            "{} COLLATE NOCASE {}",
            target.expr(),
            direction(ascending)
        ));
        Ok(())
    }

    fn render(&self, raw: &str) -> String {
        format!("{}{raw}{}", self.prefix, self.postfix)
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    }
}
