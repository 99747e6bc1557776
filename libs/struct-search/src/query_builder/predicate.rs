//! WHERE clause trees.
//!
//! Predicates are plain values: a leaf holds one SQL condition, a group holds
//! children that are each joined to their preceding sibling by their own
//! combinator. The tree is only turned into text when the statement is built.

use std::fmt;

use crate::{Error, Result};

/// Boolean operator joining sibling predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    /// Parse `AND` / `OR`, ignoring case.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(Error::config(format!(
                "invalid filter combinator '{raw}', expected AND or OR"
            ))),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Leaf(String),
    Group(Vec<(Combinator, Predicate)>),
}

impl Default for Predicate {
    fn default() -> Self {
        Self::group()
    }
}

impl Predicate {
    pub fn leaf(expr: impl Into<String>) -> Self {
        Self::Leaf(expr.into())
    }

    pub fn group() -> Self {
        Self::Group(Vec::new())
    }

    /// Append `child`, joined to the previous sibling by `op`.
    ///
    /// A leaf receiving a sibling is promoted to a group first.
    pub fn with(mut self, op: Combinator, child: Predicate) -> Self {
        self.push(op, child);
        self
    }

    pub fn push(&mut self, op: Combinator, child: Predicate) {
        if let Self::Leaf(_) = self {
            let leaf = std::mem::replace(self, Self::group());
            if let Self::Group(children) = self {
                children.push((Combinator::And, leaf));
            }
        }
        if let Self::Group(children) = self {
            children.push((op, child));
        }
    }

    /// A group with no renderable leaves anywhere below it.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Leaf(expr) => expr.trim().is_empty(),
            Self::Group(children) => children.iter().all(|(_, c)| c.is_empty()),
        }
    }

    /// Render as SQL; `None` when nothing is left to render.
    ///
    /// Nested groups are parenthesised; siblings are emitted in order and
    /// the combinator of the first rendered sibling is dropped.
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::Leaf(expr) => {
                let expr = expr.trim();
                (!expr.is_empty()).then(|| expr.to_string())
            }
            Self::Group(_) => self.render_children().map(|inner| format!("({inner})")),
        }
    }

    /// Render a group's children without the enclosing parentheses.
    pub(crate) fn render_children(&self) -> Option<String> {
        let Self::Group(children) = self else {
            return self.to_sql();
        };

        let mut out = String::new();
        for (op, child) in children {
            let Some(sql) = child.to_sql() else {
                continue;
            };
            if !out.is_empty() {
                out.push(' ');
                out.push_str(op.as_sql());
                out.push(' ');
            }
            out.push_str(&sql);
        }
        (!out.is_empty()).then_some(out)
    }
}
