use std::collections::HashMap;

use crate::{
    Error, Result, Row, TableSchema, Transaction,
    mutex::{Mutex, MutexGuard, lock},
    store::table::Table,
};

/// A minimal in-memory row store with primary-key enforcement.
///
/// It exists to give both insert paths something real to write into: rows
/// are only visible to other transactions once committed, and a commit that
/// would store a primary key twice fails as a whole.
#[derive(Debug, Default)]
pub struct Database {
    tables: Mutex<HashMap<String, Table>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a table with this name exists.
    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = lock!(self.tables);
        if tables.contains_key(schema.name()) {
            return Err(Error::InvalidConfig {
                reason: format!("table `{}` already exists", schema.name()),
            });
        }
        tables.insert(schema.name().to_owned(), Table::new(schema));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownTable`] for unknown names.
    pub fn schema(&self, table: &str) -> Result<TableSchema> {
        let tables = lock!(self.tables);
        tables
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| Error::UnknownTable(table.to_owned()))
    }

    /// Committed rows of `table` in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTable`] for unknown names.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let tables = lock!(self.tables);
        let table = get(&tables, table)?;
        Ok(table
            .rows
            .iter()
            .map(|(id, values)| Row {
                id: *id,
                values: values.clone(),
            })
            .collect())
    }

    /// Committed ids of `table` in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTable`] for unknown names.
    pub fn ids(&self, table: &str) -> Result<Vec<i64>> {
        let tables = lock!(self.tables);
        Ok(get(&tables, table)?.rows.keys().copied().collect())
    }

    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Runs `f` in a fresh transaction, committing on `Ok` and rolling back
    /// on `Err`.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, or the commit failure.
    pub fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut tx = self.begin();
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    pub(crate) fn tables(&self) -> Result<MutexGuard<'_, HashMap<String, Table>>> {
        Ok(lock!(self.tables))
    }
}

pub(crate) fn get<'a>(tables: &'a HashMap<String, Table>, name: &str) -> Result<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| Error::UnknownTable(name.to_owned()))
}
