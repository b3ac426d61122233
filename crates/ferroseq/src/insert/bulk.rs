//! Insert-from-select executed as one statement with explicit ids.
//!
//! The protocol has two phases so the id range is known before any SQL is
//! produced:
//!
//! 1. **plan**: evaluate the select to learn the row count `N`, call
//!    `reserve(generator, N)` once, and pair the source rows (in ascending
//!    source key order) with `first_id ..= first_id + N - 1`;
//! 2. **execute**: write the planned rows.
//!
//! The range never comes from a "current max id + 1" shortcut: that value
//! ignores ids the generator's window has promised to other sessions but
//! which are not written yet.

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Dialect, GeneratorRegistry, IdReservation, Result, Row, SequenceSource, Transaction,
    sequence::checked_identifier,
};

/// `INSERT INTO target (columns) SELECT columns FROM source`.
///
/// `target_columns[i]` receives `source_columns[i]`; the target key column
/// is filled with generated ids and must not be listed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InsertSelect {
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub source_table: String,
    pub source_columns: Vec<String>,
}

impl InsertSelect {
    /// Copies `columns` from `source_table` into the same-named columns of
    /// `target_table`.
    pub fn copy<I, C>(target_table: impl Into<String>, source_table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self {
            target_table: target_table.into(),
            target_columns: columns.clone(),
            source_table: source_table.into(),
            source_columns: columns,
        }
    }
}

/// The CTE-based bulk insert strategy bound to one generator.
#[derive(Debug)]
pub struct BulkInsertStrategy<'r, S> {
    registry: &'r GeneratorRegistry<S>,
    generator: String,
}

impl<'r, S: SequenceSource> BulkInsertStrategy<'r, S> {
    pub fn new(registry: &'r GeneratorRegistry<S>, generator: impl Into<String>) -> Self {
        Self {
            registry,
            generator: generator.into(),
        }
    }

    pub fn generator(&self) -> &str {
        &self.generator
    }

    /// Phase one: count the source rows, reserve their ids in a single call
    /// and assign them in source order.
    ///
    /// No reservation is made when the select yields nothing.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UnknownTable`] / [`crate::Error::UnknownColumn`] /
    ///   [`crate::Error::ColumnMismatch`] if the statement does not fit the
    ///   tables
    /// - any reservation error, see [`GeneratorRegistry::reserve`]
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, tx), fields(generator = %self.generator))
    )]
    pub fn plan(&self, tx: &Transaction<'_>, statement: &InsertSelect) -> Result<BulkInsertPlan> {
        let db = tx.database();
        let source = db.schema(&statement.source_table)?;
        let target = db.schema(&statement.target_table)?;

        if statement.source_columns.len() != statement.target_columns.len() {
            return Err(crate::Error::ColumnMismatch {
                table: statement.target_table.clone(),
                expected: statement.target_columns.len(),
                actual: statement.source_columns.len(),
            });
        }
        if statement.target_columns.len() != target.columns().len() {
            return Err(crate::Error::ColumnMismatch {
                table: statement.target_table.clone(),
                expected: target.columns().len(),
                actual: statement.target_columns.len(),
            });
        }

        let source_positions = statement
            .source_columns
            .iter()
            .map(|c| source.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        let target_positions = statement
            .target_columns
            .iter()
            .map(|c| target.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        if let Some(column) = statement
            .target_columns
            .iter()
            .enumerate()
            .find(|&(i, c)| statement.target_columns[..i].contains(c))
            .map(|(_, c)| c)
        {
            return Err(crate::Error::InvalidConfig {
                reason: format!("column `{column}` listed twice in insert into `{}`", statement.target_table),
            });
        }

        let source_rows = tx.select(&statement.source_table)?;
        let count = i64::try_from(source_rows.len()).map_err(|_| crate::Error::IdOverflow {
            generator: self.generator.clone(),
        })?;

        if count == 0 {
            return Ok(BulkInsertPlan {
                statement: statement.clone(),
                key_column: target.key_column().to_owned(),
                source_key_column: source.key_column().to_owned(),
                reservation: None,
                rows: Vec::new(),
            });
        }

        let reservation = self.registry.reserve(&self.generator, count)?;
        let rows = source_rows
            .into_iter()
            .zip(reservation.ids())
            .map(|(source_row, id)| {
                let mut values = vec![String::new(); target_positions.len()];
                for (from, to) in source_positions.iter().zip(&target_positions) {
                    values[*to] = source_row.values[*from].clone();
                }
                Row { id, values }
            })
            .collect();

        Ok(BulkInsertPlan {
            statement: statement.clone(),
            key_column: target.key_column().to_owned(),
            source_key_column: source.key_column().to_owned(),
            reservation: Some(reservation),
            rows,
        })
    }

    /// Plans and executes `statement` in `tx`, returning the number of rows
    /// inserted.
    ///
    /// # Errors
    ///
    /// See [`Self::plan`] and [`BulkInsertPlan::execute`].
    pub fn insert_select(&self, tx: &mut Transaction<'_>, statement: &InsertSelect) -> Result<usize> {
        self.plan(tx, statement)?.execute(tx)
    }
}

/// Output of [`BulkInsertStrategy::plan`]: the reserved range and the rows
/// it was spliced into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkInsertPlan {
    statement: InsertSelect,
    key_column: String,
    source_key_column: String,
    reservation: Option<IdReservation>,
    rows: Vec<Row>,
}

impl BulkInsertPlan {
    /// `None` when the select produced no rows.
    pub fn reservation(&self) -> Option<IdReservation> {
        self.reservation
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Ids in the order they are assigned to source rows.
    pub fn ids(&self) -> Vec<i64> {
        self.rows.iter().map(|row| row.id).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Renders the statement with the reserved range spliced in: source rows
    /// are numbered in key order and row `rn` receives
    /// `first_id + rn - 1`.
    ///
    /// Returns `None` when there is nothing to insert.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if a table or column name is
    /// not a plain identifier.
    pub fn to_sql(&self, dialect: Dialect) -> Result<Option<String>> {
        let Some(reservation) = self.reservation else {
            return Ok(None);
        };
        let s = &self.statement;

        let source_table = checked_identifier(&s.source_table)?;
        let target_table = checked_identifier(&s.target_table)?;
        let key = checked_identifier(&self.key_column)?;
        let source_key = checked_identifier(&self.source_key_column)?;
        let source_columns = join_identifiers(&s.source_columns)?;
        let target_columns = join_identifiers(&s.target_columns)?;
        let aliases = (1..=s.source_columns.len())
            .map(|i| format!("c{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let cte = format!(
            "with source_rows ({aliases}, rn) as (select {source_columns}, \
             row_number() over (order by {source_key}) from {source_table})"
        );
        let insert = format!("insert into {target_table} ({key}, {target_columns})");
        let select = format!(
            "select {} + rn - 1, {aliases} from source_rows",
            reservation.first_id()
        );

        Ok(Some(match dialect {
            Dialect::PostgreSql => format!("{cte} {insert} {select}"),
            Dialect::Db2 => format!("{insert} {cte} {select}"),
        }))
    }

    /// Phase two: writes the planned rows into `tx`.
    ///
    /// # Errors
    ///
    /// Any write error, see [`Transaction::insert`]. Reserved ids are not
    /// returned to the generator on failure.
    pub fn execute(self, tx: &mut Transaction<'_>) -> Result<usize> {
        let written = self.rows.len();
        for row in self.rows {
            tx.insert(&self.statement.target_table, row)?;
        }
        Ok(written)
    }
}

fn join_identifiers(columns: &[String]) -> Result<String> {
    let checked = columns
        .iter()
        .map(|c| checked_identifier(c))
        .collect::<Result<Vec<_>>>()?;
    Ok(checked.join(", "))
}
