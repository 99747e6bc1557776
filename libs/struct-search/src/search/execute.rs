use tracing::debug;

use super::Search;
use crate::storage::Storage;
use crate::value::{Value, ValueData};
use crate::{Error, Result};

fn identity_number(cell: Option<String>, name: &str) -> Result<i64> {
    let raw = cell.unwrap_or_default();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse()
        .map_err(|_| Error::Decode(format!("{name} '{raw}' is not an integer")))
}

impl Search {
    /// Run the search and return one row of values per result.
    ///
    /// Also refreshes [`Search::pids`], [`Search::rids`] and
    /// [`Search::revs`], aligned with the returned rows.
    pub async fn execute(&mut self, storage: &dyn Storage) -> Result<Vec<Vec<Value>>> {
        let (sql, binds) = self.build_query()?;
        debug!(%sql, binds = binds.len(), "executing struct search");

        let rows = storage.fetch_rows(&sql, &binds).await?;

        self.pids.clear();
        self.rids.clear();
        self.revs.clear();

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = row.into_iter();
            self.pids.push(cells.next().flatten().unwrap_or_default());
            self.rids.push(identity_number(cells.next().flatten(), "row id")?);
            self.revs.push(identity_number(cells.next().flatten(), "revision")?);

            let values = self
                .columns
                .iter()
                .map(|column| Value::from_cell(column.clone(), cells.next().flatten()))
                .collect::<Result<Vec<_>>>()?;
            result.push(values);
        }

        debug!(rows = result.len(), "struct search finished");
        Ok(result)
    }

    /// Number of rows matching the filters, ignoring limit and offset.
    ///
    /// Runs a fresh count on every call, so it tracks writes made between
    /// calls and whichever `storage` is passed.
    pub async fn count(&self, storage: &dyn Storage) -> Result<u64> {
        let (sql, binds) = self.build_count_query()?;
        debug!(%sql, binds = binds.len(), "counting struct search rows");
        storage.fetch_count(&sql, &binds).await
    }

    /// Distinct values of the first column with the number of matching rows
    /// carrying each, most frequent first.
    ///
    /// Every element of a multi-valued column is tallied on its own. Empty
    /// values are skipped and the limit caps the number of tags.
    pub async fn cloud(&self, storage: &dyn Storage) -> Result<Vec<(Value, u64)>> {
        let (sql, binds) = self.build_cloud_query()?;
        debug!(%sql, binds = binds.len(), "tallying struct search values");

        let column = &self.columns[0];
        let rows = storage.fetch_rows(&sql, &binds).await?;
        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = row.into_iter();
            let tag = cells.next().flatten().unwrap_or_default();
            let count = identity_number(cells.next().flatten(), "tag count")?;
            let data = if column.is_multi() {
                ValueData::Multi(vec![tag])
            } else {
                ValueData::Single(tag)
            };
            tags.push((Value::new(column.clone(), data), u64::try_from(count).unwrap_or(0)));
        }
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_numbers() {
        assert_eq!(identity_number(None, "rid").unwrap(), 0);
        assert_eq!(identity_number(Some("42".into()), "rid").unwrap(), 42);
        assert!(matches!(
            identity_number(Some("x".into()), "rid"),
            Err(Error::Decode(_))
        ));
    }
}
