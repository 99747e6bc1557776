//! Row level read restrictions.

use crate::query_builder::{Combinator, Predicate, QueryBuilder};
use crate::schema::Schema;

/// Supplies an extra predicate limiting the rows a reader may see.
///
/// The engine calls it once per attached schema with the data table alias
/// and ANDs the result into the top-level predicate.
pub trait PermissionFilter: Send + Sync {
    fn restrict(&self, qb: &mut QueryBuilder, data_alias: &str, schema: &Schema) -> Option<Predicate>;
}

/// No restriction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionFilter for AllowAll {
    fn restrict(&self, _: &mut QueryBuilder, _: &str, _: &Schema) -> Option<Predicate> {
        None
    }
}

/// Page rows are readable when the page is, or lies below, one of the
/// readable namespaces. Lookup rows are always readable.
///
/// An empty namespace (`""`) or `"*"` grants access to everything.
#[derive(Debug, Clone, Default)]
pub struct NamespaceAcl {
    readable: Vec<String>,
}

impl NamespaceAcl {
    pub fn new<I, S>(readable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            readable: readable
                .into_iter()
                .map(|ns| ns.into().trim().trim_matches(':').to_string())
                .collect(),
        }
    }
}

impl PermissionFilter for NamespaceAcl {
    fn restrict(&self, qb: &mut QueryBuilder, data_alias: &str, schema: &Schema) -> Option<Predicate> {
        if schema.is_lookup() || self.readable.iter().any(|ns| ns.is_empty() || ns == "*") {
            return None;
        }
        if self.readable.is_empty() {
            return Some(Predicate::leaf("1 = 0"));
        }

        let group = self.readable.iter().fold(Predicate::group(), |group, ns| {
            let page = qb.add_value(ns.as_str());
            let prefix = qb.add_value(format!("{ns}:"));
            group
                .with(
                    Combinator::Or,
                    Predicate::leaf(format!("{data_alias}.pid = {page}")),
                )
                .with(
                    Combinator::Or,
                    Predicate::leaf(format!(
                        "substr({data_alias}.pid, 1, length({prefix})) = {prefix}"
                    )),
                )
        });
        Some(group)
    }
}
