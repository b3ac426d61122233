use std::collections::HashSet;

use crate::{
    Database, Result, Row,
    store::database::get,
};

/// A unit of work against a [`Database`].
///
/// Writes are buffered and checked against committed rows (and the
/// transaction's own writes) as they are made, then checked again atomically
/// on [`Transaction::commit`], since another transaction may have committed
/// the same key in between. Dropping a transaction without committing rolls
/// it back. Ids reserved for rolled-back rows are never reclaimed.
#[derive(Debug)]
pub struct Transaction<'db> {
    db: &'db Database,
    pending: Vec<(String, Row)>,
    keys: HashSet<(String, i64)>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            pending: Vec::new(),
            keys: HashSet::new(),
        }
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// Buffers `row` for `table`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UnknownTable`] for unknown tables
    /// - [`crate::Error::ColumnMismatch`] if the row has the wrong arity
    /// - [`crate::Error::DuplicateKey`] if the id is already committed or
    ///   written by this transaction
    pub fn insert(&mut self, table: &str, row: Row) -> Result<()> {
        let tables = self.db.tables()?;
        let target = get(&tables, table)?;
        target.schema.check_arity(&row.values)?;

        let key = (table.to_owned(), row.id);
        if target.rows.contains_key(&row.id) || self.keys.contains(&key) {
            return Err(target.duplicate(row.id));
        }

        self.keys.insert(key);
        self.pending.push((table.to_owned(), row));
        Ok(())
    }

    /// Rows of `table` visible to this transaction (committed plus own
    /// writes) in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownTable`] for unknown tables.
    pub fn select(&self, table: &str) -> Result<Vec<Row>> {
        let mut rows = {
            let tables = self.db.tables()?;
            get(&tables, table)?
                .rows
                .iter()
                .map(|(id, values)| Row {
                    id: *id,
                    values: values.clone(),
                })
                .collect::<Vec<_>>()
        };

        rows.extend(
            self.pending
                .iter()
                .filter(|(name, _)| name == table)
                .map(|(_, row)| row.clone()),
        );
        rows.sort_unstable_by_key(|row| row.id);
        Ok(rows)
    }

    /// Number of rows of `table` visible to this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownTable`] for unknown tables.
    pub fn count(&self, table: &str) -> Result<usize> {
        let committed = {
            let tables = self.db.tables()?;
            get(&tables, table)?.rows.len()
        };
        Ok(committed + self.pending.iter().filter(|(name, _)| name == table).count())
    }

    /// Number of buffered writes.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Publishes every buffered row, or none of them.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateKey`] if a concurrent commit stored
    /// one of the ids first; nothing is written in that case.
    pub fn commit(self) -> Result<usize> {
        let mut tables = self.db.tables()?;

        for (table, row) in &self.pending {
            let target = get(&tables, table)?;
            if target.rows.contains_key(&row.id) {
                return Err(target.duplicate(row.id));
            }
        }

        let written = self.pending.len();
        for (table, row) in self.pending {
            if let Some(target) = tables.get_mut(&table) {
                target.rows.insert(row.id, row.values);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(rows = written, "committed transaction");
        Ok(written)
    }

    /// Discards every buffered row and returns how many there were.
    pub fn rollback(self) -> usize {
        #[cfg(feature = "tracing")]
        tracing::trace!(rows = self.pending.len(), "rolled back transaction");
        self.pending.len()
    }
}
