//! Statement assembly.
//!
//! Every attached schema contributes its data table (first one as FROM, the
//! others inner joined on the row identity), a `latest = 1` condition, the
//! assignment check and the permission predicate. Multi-valued cells come
//! from left joins on the schema's multi table.

use super::{Filter, QueryColumn, Search};
use crate::query_builder::{BindValue, Combinator, Predicate, QueryBuilder};
use crate::schema::{Column, PseudoKind};
use crate::types::{ColumnTarget, ColumnType};
use crate::{Error, Result};

/// Alias of the projected row identity columns.
pub(super) const PID: &str = "PID";
pub(super) const RID: &str = "RID";
pub(super) const REV: &str = "REV";
/// Alias of the tallied value and its count in cloud statements.
pub(super) const TAG: &str = "TAG";
pub(super) const TAG_COUNT: &str = "CNT";

/// How a multi-valued cell is joined.
#[derive(Clone, Copy, PartialEq, Eq)]
enum MultiJoin {
    /// Every element, one joined row each.
    All,
    /// Only the first stored element.
    FirstRow,
}

struct Assembly<'a> {
    search: &'a Search,
    qb: QueryBuilder,
    data_aliases: Vec<String>,
    grouped: bool,
}

impl<'a> Assembly<'a> {
    fn new(search: &'a Search) -> Result<Self> {
        if search.schemas.is_empty() {
            return Err(Error::config("no schema was added to the search"));
        }

        let mut assembly = Self {
            search,
            qb: QueryBuilder::new(),
            data_aliases: Vec::with_capacity(search.schemas.len()),
            grouped: false,
        };
        assembly.add_schemas()?;
        Ok(assembly)
    }

    fn add_schemas(&mut self) -> Result<()> {
        let search = self.search;
        for schema_ref in &search.schemas {
            let schema = schema_ref.schema();
            let data = self.qb.generate_table_alias("D");

            match self.data_aliases.first() {
                None => self.qb.add_table(&schema.data_table(), &data)?,
                Some(first) => {
                    let mut on = format!("{data}.pid = {first}.pid");
                    if schema.is_lookup() {
                        on.push_str(&format!(" AND {data}.rid = {first}.rid"));
                    }
                    self.qb.add_inner_join(first, &schema.data_table(), &data, &on)?;
                }
            }
            self.qb
                .add_where(Combinator::And, Predicate::leaf(format!("{data}.latest = 1")));

            // page rows only count while the schema is assigned to the page
            let assignment = self.qb.generate_table_alias("A");
            let tbl = self.qb.add_value(schema.name());
            self.qb.add_left_join(
                &data,
                "schema_assignments",
                &assignment,
                &format!("{assignment}.pid = {data}.pid AND {assignment}.tbl = {tbl}"),
            )?;
            self.qb.add_where(
                Combinator::And,
                Predicate::leaf(format!("({data}.rid <> 0 OR {assignment}.assigned = 1)")),
            );

            if let Some(restriction) = search.permission.restrict(&mut self.qb, &data, schema) {
                self.qb.add_where(Combinator::And, restriction);
            }

            self.data_aliases.push(data);
        }
        Ok(())
    }

    fn first_data_alias(&self) -> &str {
        &self.data_aliases[0]
    }

    /// Table alias and column name holding the cell of `column`.
    fn cell(&mut self, column: &QueryColumn, multi: MultiJoin) -> Result<(String, String)> {
        let idx = column.schema_index();
        let data = self.data_aliases[idx].clone();

        let search = self.search;
        let cell = match column.column() {
            Column::Physical(c) if c.is_multi() => {
                let schema = search.schemas[idx].schema();
                let m = self.qb.generate_table_alias("M");
                let mut on = format!(
                    "{m}.pid = {data}.pid AND {m}.rid = {data}.rid AND {m}.rev = {data}.rev \
                     AND {m}.colref = {}",
                    c.colref()
                );
                if multi == MultiJoin::FirstRow {
                    on.push_str(&format!(" AND {m}.row = 1"));
                } else {
                    self.grouped = true;
                }
                self.qb.add_left_join(&data, &schema.multi_table(), &m, &on)?;
                (m, "value".to_string())
            }
            Column::Physical(c) => (data, c.data_column()),
            Column::Pseudo(p) => match p.kind() {
                PseudoKind::PageId | PseudoKind::Title => (data, "pid".to_string()),
                PseudoKind::LastUpdate => (data, "rev".to_string()),
                PseudoKind::RowId => (data, "rid".to_string()),
                PseudoKind::LastEditor | PseudoKind::LastSummary => {
                    let titles = self.qb.generate_table_alias("T");
                    self.qb.add_left_join(
                        &data,
                        "titles",
                        &titles,
                        &format!("{data}.pid = {titles}.pid"),
                    )?;
                    let name = if p.kind() == PseudoKind::LastEditor {
                        "lasteditor"
                    } else {
                        "lastsummary"
                    };
                    (titles, name.to_string())
                }
            },
        };
        Ok(cell)
    }

    fn add_identity(&mut self) {
        let first = self.first_data_alias().to_string();
        self.qb.add_select_column(&first, "pid", PID);
        self.qb.add_select_column(&first, "rid", RID);
        self.qb.add_select_column(&first, "rev", REV);
    }

    fn add_columns(&mut self) -> Result<()> {
        let search = self.search;
        for (n, column) in search.columns.iter().enumerate() {
            let alias = format!("C{n}");
            let (table_alias, name) = self.cell(column, MultiJoin::All)?;
            let target = ColumnTarget {
                table_alias: &table_alias,
                column: &name,
                source: column.column(),
            };
            column.column_type().select(&mut self.qb, &target, &alias)?;

            if column.is_multi() {
                let element = self.qb.select_statement(&alias).unwrap_or("NULL").to_string();
                self.qb.add_select_statement(
                    format!(
                        "json_group_object(CAST({table_alias}.row AS TEXT), {element}) \
                         FILTER (WHERE {table_alias}.row IS NOT NULL)"
                    ),
                    &alias,
                );
            }
        }
        Ok(())
    }

    fn add_filters(&mut self) -> Result<()> {
        let search = self.search;
        for filters in [&search.filters, &search.dynamic_filters] {
            let group = self.filter_group(filters)?;
            self.qb.add_where(Combinator::And, group);
        }
        Ok(())
    }

    fn filter_group(&mut self, filters: &[Filter]) -> Result<Predicate> {
        let mut group = Predicate::group();
        for filter in filters {
            let (table_alias, name) = self.cell(&filter.column, MultiJoin::All)?;
            let target = ColumnTarget {
                table_alias: &table_alias,
                column: &name,
                source: filter.column.column(),
            };
            let predicate = filter.column.column_type().filter(
                &mut self.qb,
                &target,
                filter.comparator,
                &filter.value,
            )?;
            group.push(filter.combinator, predicate);
        }
        Ok(group)
    }

    /// Project the first column as the tag and count the distinct rows
    /// carrying each value.
    fn add_tag(&mut self) -> Result<()> {
        let search = self.search;
        let Some(column) = search.columns.first() else {
            return Err(Error::config("a cloud needs a column to tally"));
        };
        let (table_alias, name) = self.cell(column, MultiJoin::All)?;
        let target = ColumnTarget {
            table_alias: &table_alias,
            column: &name,
            source: column.column(),
        };
        column.column_type().select(&mut self.qb, &target, TAG)?;

        let tag = self.qb.select_statement(TAG).unwrap_or("NULL").to_string();
        self.qb.add_where(
            Combinator::And,
            Predicate::leaf(format!("{tag} IS NOT NULL AND {tag} <> ''")),
        );

        let first = self.first_data_alias().to_string();
        self.qb.add_select_statement(
            format!("COUNT(DISTINCT {first}.pid || '#' || {first}.rid)"),
            TAG_COUNT,
        );
        self.qb.add_group_by_statement(TAG);
        self.qb.add_order_by(format!("{TAG_COUNT} DESC"));
        self.qb.add_order_by(format!("{TAG} ASC"));
        Ok(())
    }

    fn add_sorts(&mut self) -> Result<()> {
        let search = self.search;
        for sort in &search.sorts {
            let (table_alias, name) = self.cell(&sort.column, MultiJoin::FirstRow)?;
            let target = ColumnTarget {
                table_alias: &table_alias,
                column: &name,
                source: sort.column.column(),
            };
            sort.column
                .column_type()
                .sort(&mut self.qb, &target, sort.ascending)?;
        }

        // deterministic order for paging
        let first = self.first_data_alias().to_string();
        for key in [format!("{first}.pid"), format!("{first}.rid")] {
            let present = self
                .qb
                .order_by_terms()
                .iter()
                .any(|t| t.strip_prefix(key.as_str()).is_some_and(|rest| rest.starts_with(' ')));
            if !present {
                self.qb.add_order_by(format!("{key} ASC"));
            }
        }
        Ok(())
    }

    fn group_rows(&mut self) {
        let first = self.first_data_alias().to_string();
        self.qb.add_group_by_statement(format!("{first}.pid"));
        self.qb.add_group_by_statement(format!("{first}.rid"));
    }
}

impl Search {
    /// The paginated statement: row identity, one cell per column, filters,
    /// sorts, limit and offset.
    pub fn build_query(&self) -> Result<(String, Vec<BindValue>)> {
        if self.columns.is_empty() {
            return Err(Error::config("no columns were added to the search"));
        }

        let mut assembly = Assembly::new(self)?;
        assembly.add_identity();
        assembly.add_columns()?;
        assembly.add_filters()?;
        if assembly.grouped {
            assembly.group_rows();
        }
        assembly.add_sorts()?;

        let mut qb = assembly.qb;
        qb.set_limit(Some(self.limit));
        qb.set_offset(self.offset);
        qb.build()
    }

    /// The count statement: same schemas and filters, no columns, sorts or
    /// paging.
    pub fn build_count_query(&self) -> Result<(String, Vec<BindValue>)> {
        let mut assembly = Assembly::new(self)?;
        let first = assembly.first_data_alias().to_string();
        assembly.qb.add_select_column(&first, "pid", PID);
        assembly.add_filters()?;
        assembly.group_rows();
        assembly.qb.build_count()
    }

    /// The tag cloud statement: one row per distinct value of the first
    /// column with its row count, most frequent first. Offset does not apply.
    pub fn build_cloud_query(&self) -> Result<(String, Vec<BindValue>)> {
        let mut assembly = Assembly::new(self)?;
        assembly.add_tag()?;
        assembly.add_filters()?;

        let mut qb = assembly.qb;
        qb.set_limit(Some(self.limit));
        qb.build()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::Schema;
    use crate::types::TypeKind;

    fn schema1() -> Arc<Schema> {
        Arc::new(
            Schema::new("schema1", false)
                .unwrap()
                .with_column("first", false, TypeKind::text())
                .with_column("second", true, TypeKind::text()),
        )
    }

    fn lookup() -> Arc<Schema> {
        Arc::new(
            Schema::new("wikilookup", true)
                .unwrap()
                .with_column("name", false, TypeKind::text()),
        )
    }

    #[test]
    fn single_schema_statement() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_column("%pageid%");
        search.add_column("first");
        search.add_filter("first", "foo", "=", "AND").unwrap();
        search.set_limit(10).unwrap();

        let (sql, binds) = search.build_query().unwrap();
        assert_eq!(
            sql,
            "SELECT D1.pid AS PID, D1.rid AS RID, D1.rev AS REV, D1.pid AS C0, D1.col1 AS C1 \
             FROM data_schema1 AS D1 \
             LEFT OUTER JOIN schema_assignments AS A2 ON A2.pid = D1.pid AND A2.tbl = ?1 \
             WHERE D1.latest = 1 AND (D1.rid <> 0 OR A2.assigned = 1) AND (D1.col1 = ?2) \
             ORDER BY D1.pid ASC, D1.rid ASC LIMIT 10"
        );
        assert_eq!(
            binds,
            vec![BindValue::from("schema1"), BindValue::from("foo")]
        );
    }

    #[test]
    fn multi_columns_aggregate_and_group() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_column("second");

        let (sql, _) = search.build_query().unwrap();
        assert!(sql.contains(
            "json_group_object(CAST(M3.row AS TEXT), M3.value) \
             FILTER (WHERE M3.row IS NOT NULL) AS C0"
        ));
        assert!(sql.contains(
            "LEFT OUTER JOIN multi_schema1 AS M3 ON M3.pid = D1.pid AND M3.rid = D1.rid \
             AND M3.rev = D1.rev AND M3.colref = 2"
        ));
        assert!(sql.contains(" GROUP BY D1.pid, D1.rid "));
    }

    #[test]
    fn multi_sort_joins_the_first_element_only() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_column("first");
        search.add_sort("second", false);

        let (sql, _) = search.build_query().unwrap();
        assert!(sql.contains("AND M3.colref = 2 AND M3.row = 1"));
        assert!(!sql.contains("GROUP BY"));
        assert!(sql.ends_with("ORDER BY M3.value COLLATE NOCASE DESC, D1.pid ASC, D1.rid ASC"));
    }

    #[test]
    fn explicit_identity_sort_is_not_repeated() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_column("first");
        search.add_sort("%pageid%", false);

        let (sql, _) = search.build_query().unwrap();
        assert!(sql.ends_with("ORDER BY D1.pid DESC, D1.rid ASC"));
    }

    #[test]
    fn lookup_schemas_join_on_row_id() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_schema(lookup(), Some("l")).unwrap();
        search.add_column("l.name");

        let (sql, _) = search.build_query().unwrap();
        assert!(sql.contains(
            "INNER JOIN data_wikilookup AS D3 ON D3.pid = D1.pid AND D3.rid = D1.rid"
        ));
        assert!(sql.contains("D3.latest = 1"));
    }

    #[test]
    fn filters_fold_with_their_own_combinators() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_column("first");
        search.add_filter("first", "a", "=", "AND").unwrap();
        search.add_filter("first", "b", "=", "OR").unwrap();

        let (sql, _) = search.build_query().unwrap();
        assert!(sql.contains("AND (D1.col1 = ?2 OR D1.col1 = ?3)"));
    }

    #[test]
    fn dynamic_filters_narrow_the_authored_group() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_column("first");
        search.add_filter("first", "a", "=", "AND").unwrap();
        search.add_filter("first", "b", "=", "OR").unwrap();
        search.add_dynamic_filter("first", "c", "!=").unwrap();

        let (sql, _) = search.build_query().unwrap();
        assert!(sql.contains("AND (D1.col1 = ?2 OR D1.col1 = ?3) AND (D1.col1 != ?4)"));

        let (count, binds) = search.build_count_query().unwrap();
        assert!(count.contains("AND (D1.col1 != ?4)"));
        assert_eq!(binds.len(), 4);
    }

    #[test]
    fn cloud_groups_by_the_first_column() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_column("second");
        search.add_column("first");
        search.add_filter("first", "foo", "=", "AND").unwrap();
        search.set_limit(3).unwrap();
        search.set_offset(9).unwrap();

        let (sql, binds) = search.build_cloud_query().unwrap();
        assert!(sql.starts_with(
            "SELECT M3.value AS TAG, COUNT(DISTINCT D1.pid || '#' || D1.rid) AS CNT FROM data_schema1"
        ));
        assert!(sql.contains("AND M3.value IS NOT NULL AND M3.value <> '' AND (D1.col1 = ?2)"));
        assert!(sql.ends_with("GROUP BY TAG ORDER BY CNT DESC, TAG ASC LIMIT 3"));
        assert_eq!(binds.len(), 2);

        let mut empty = Search::default();
        empty.add_schema(schema1(), None).unwrap();
        assert!(empty.build_cloud_query().unwrap_err().is_config());
    }

    #[test]
    fn count_ignores_sorts_and_paging() {
        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        search.add_column("first");
        search.add_sort("first", true);
        search.add_filter("second", "x", "=", "AND").unwrap();
        search.set_limit(5).unwrap();
        search.set_offset(5).unwrap();

        let (sql, binds) = search.build_count_query().unwrap();
        assert!(sql.starts_with("SELECT COUNT(*) FROM (SELECT D1.pid AS PID FROM data_schema1"));
        assert!(sql.contains("M3.value = ?2"));
        assert!(sql.ends_with("GROUP BY D1.pid, D1.rid) AS counted"));
        assert!(!sql.contains("ORDER BY"));
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn empty_searches_are_config_errors() {
        let search = Search::default();
        assert!(search.build_count_query().unwrap_err().is_config());

        let mut search = Search::default();
        search.add_schema(schema1(), None).unwrap();
        assert!(search.build_query().unwrap_err().is_config());
        assert!(search.build_count_query().is_ok());
    }
}
