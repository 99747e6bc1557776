//! SQL query builder for struct searches.
//!
//! Builds a single SELECT statement incrementally:
//! - one FROM table plus aliased INNER / LEFT joins
//! - projected expressions in call order
//! - a WHERE predicate tree (see [`Predicate`])
//! - bound parameters with numbered `?N` placeholders
//! - GROUP BY, ORDER BY, LIMIT/OFFSET
//!
//! Building consumes the builder, so a statement is rendered exactly once.

use std::collections::HashSet;

use crate::{Error, Result};

mod bind;
mod predicate;

use bind::{placeholder, push_value};
pub use bind::BindValue;
pub use predicate::{Combinator, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT OUTER JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    alias: String,
    on: String,
}

/// Query builder for one SELECT statement.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    from: Option<(String, String)>,
    joins: Vec<Join>,
    aliases: HashSet<String>,
    select: Vec<(String, String)>,
    filters: Predicate,
    group_by: Vec<String>,
    order_by: Vec<String>,
    bind_params: Vec<BindValue>,
    limit: Option<u64>,
    offset: Option<u64>,
    alias_counter: usize,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the FROM table. Further tables must come in through a join.
    pub fn add_table(&mut self, table: &str, alias: &str) -> Result<()> {
        if let Some((existing, _)) = &self.from {
            return Err(Error::QueryBuilder(format!(
                "FROM table already set to {existing}, join {table} instead"
            )));
        }
        self.claim_alias(alias)?;
        self.from = Some((table.to_string(), alias.to_string()));
        Ok(())
    }

    pub fn add_left_join(
        &mut self,
        left_alias: &str,
        table: &str,
        alias: &str,
        on: &str,
    ) -> Result<()> {
        self.add_join(JoinKind::Left, left_alias, table, alias, on)
    }

    pub fn add_inner_join(
        &mut self,
        left_alias: &str,
        table: &str,
        alias: &str,
        on: &str,
    ) -> Result<()> {
        self.add_join(JoinKind::Inner, left_alias, table, alias, on)
    }

    fn add_join(
        &mut self,
        kind: JoinKind,
        left_alias: &str,
        table: &str,
        alias: &str,
        on: &str,
    ) -> Result<()> {
        if !self.aliases.contains(left_alias) {
            return Err(Error::QueryBuilder(format!(
                "cannot join {table} from unknown alias {left_alias}"
            )));
        }
        self.claim_alias(alias)?;
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            alias: alias.to_string(),
            on: on.to_string(),
        });
        Ok(())
    }

    fn claim_alias(&mut self, alias: &str) -> Result<()> {
        if !self.aliases.insert(alias.to_string()) {
            return Err(Error::QueryBuilder(format!(
                "table alias {alias} is already used in this query"
            )));
        }
        Ok(())
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.contains(alias)
    }

    /// A fresh alias `{prefix}{n}` that no table of this query uses yet.
    ///
    /// The counter only grows, so repeated calls never hand out the same name.
    pub fn generate_table_alias(&mut self, prefix: &str) -> String {
        loop {
            self.alias_counter += 1;
            let alias = format!("{prefix}{}", self.alias_counter);
            if !self.aliases.contains(&alias) {
                return alias;
            }
        }
    }

    /// Project `expr AS alias`. Re-using an alias replaces the expression in place.
    pub fn add_select_statement(&mut self, expr: impl Into<String>, alias: &str) {
        let expr = expr.into();
        match self.select.iter_mut().find(|(a, _)| a == alias) {
            Some(slot) => slot.1 = expr,
            None => self.select.push((alias.to_string(), expr)),
        }
    }

    pub fn add_select_column(&mut self, table_alias: &str, column: &str, alias: &str) {
        self.add_select_statement(format!("{table_alias}.{column}"), alias);
    }

    /// The expression currently projected under `alias`.
    pub fn select_statement(&self, alias: &str) -> Option<&str> {
        self.select
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, expr)| expr.as_str())
    }

    /// Register a bound parameter and return its placeholder.
    pub fn add_value(&mut self, value: impl Into<BindValue>) -> String {
        let idx = push_value(&mut self.bind_params, value.into());
        placeholder(idx)
    }

    /// Append a predicate to the top-level group.
    pub fn add_where(&mut self, op: Combinator, predicate: Predicate) {
        if predicate.is_empty() {
            return;
        }
        self.filters.push(op, predicate);
    }

    pub fn add_group_by_statement(&mut self, expr: impl Into<String>) {
        let expr = expr.into();
        if !self.group_by.contains(&expr) {
            self.group_by.push(expr);
        }
    }

    pub fn has_group_by(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// Append one ORDER BY term (expression including its direction).
    pub fn add_order_by(&mut self, expr: impl Into<String>) {
        self.order_by.push(expr.into());
    }

    pub fn order_by_terms(&self) -> &[String] {
        &self.order_by
    }

    /// `None` or `Some(0)` means no limit.
    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit.filter(|l| *l > 0);
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = (offset > 0).then_some(offset);
    }

    /// Finish the statement: SQL text plus bind values in placeholder order.
    pub fn build(self) -> Result<(String, Vec<BindValue>)> {
        let mut sql = self.render_base()?;

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite needs a LIMIT clause before OFFSET
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        Ok((sql, self.bind_params))
    }

    /// Finish the statement as a row count over the same FROM/WHERE/GROUP BY.
    ///
    /// ORDER BY, LIMIT and OFFSET are not rendered.
    pub fn build_count(self) -> Result<(String, Vec<BindValue>)> {
        let inner = self.render_base()?;
        Ok((
            format!("SELECT COUNT(*) FROM ({inner}) AS counted"),
            self.bind_params,
        ))
    }

    fn render_base(&self) -> Result<String> {
        let Some((table, alias)) = &self.from else {
            return Err(Error::QueryBuilder("no FROM table registered".to_string()));
        };
        if self.select.is_empty() {
            return Err(Error::QueryBuilder("nothing selected".to_string()));
        }

        let projection = self
            .select
            .iter()
            .map(|(alias, expr)| format!("{expr} AS {alias}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("SELECT {projection} FROM {table} AS {alias}");
        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} AS {} ON {}",
                join.kind.as_sql(),
                join.table,
                join.alias,
                join.on
            ));
        }

        if let Some(where_sql) = self.filters.render_children() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        Ok(sql)
    }
}
