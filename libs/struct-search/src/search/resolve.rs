use tracing::trace;

use super::{QueryColumn, Search};
use crate::schema::{Column, PseudoKind};

impl Search {
    /// Index of the schema ref named by `qualifier`: aliases first, then
    /// schema names.
    fn find_schema_ref(&self, qualifier: &str) -> Option<usize> {
        self.schemas
            .iter()
            .position(|s| s.alias.eq_ignore_ascii_case(qualifier))
            .or_else(|| {
                self.schemas
                    .iter()
                    .position(|s| s.schema.name().eq_ignore_ascii_case(qualifier))
            })
    }

    /// Schema refs a reference may bind to, in attachment order.
    fn candidate_refs(&self, qualifier: Option<&str>) -> Vec<usize> {
        match qualifier {
            Some(q) => self.find_schema_ref(q).into_iter().collect(),
            None => (0..self.schemas.len()).collect(),
        }
    }

    /// Resolve `label`, `qualifier.label`, `*`, `qualifier.*` or a pseudo
    /// column token into query columns. Unknown references yield nothing.
    pub(super) fn resolve_columns(&self, reference: &str) -> Vec<QueryColumn> {
        let reference = reference.trim();
        let (qualifier, label) = match reference.split_once('.') {
            Some((q, l)) => (Some(q.trim()), l.trim()),
            None => (None, reference),
        };
        let refs = self.candidate_refs(qualifier);

        if label == "*" {
            return refs
                .into_iter()
                .flat_map(|idx| {
                    let schema_ref = &self.schemas[idx];
                    schema_ref.schema.columns().map(move |c| {
                        QueryColumn::new(Column::Physical(c.clone()), idx, schema_ref)
                    })
                })
                .collect();
        }

        self.resolve_in(&refs, label).into_iter().collect()
    }

    /// Resolve a reference to exactly one column; wildcards never match.
    pub(super) fn resolve_column(&self, reference: &str) -> Option<QueryColumn> {
        let reference = reference.trim();
        let (qualifier, label) = match reference.split_once('.') {
            Some((q, l)) => (Some(q.trim()), l.trim()),
            None => (None, reference),
        };
        if label == "*" {
            return None;
        }
        self.resolve_in(&self.candidate_refs(qualifier), label)
    }

    fn resolve_in(&self, refs: &[usize], label: &str) -> Option<QueryColumn> {
        if let Some(kind) = PseudoKind::from_token(label) {
            let idx = *refs.first()?;
            return Some(QueryColumn::new(Column::pseudo(kind), idx, &self.schemas[idx]));
        }

        let found = refs.iter().find_map(|&idx| {
            let schema_ref = &self.schemas[idx];
            schema_ref
                .schema
                .find_column(label)
                .map(|c| QueryColumn::new(Column::Physical(c.clone()), idx, schema_ref))
        });
        if found.is_none() {
            trace!(label, "column not found in any attached schema");
        }
        found
    }
}
