use std::collections::BTreeMap;

use crate::{Error, Result, sequence::checked_identifier};

/// Shape of a table: an `i64` primary key plus string columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableSchema {
    name: String,
    key_column: String,
    columns: Vec<String>,
}

impl TableSchema {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a name is not a plain identifier
    /// or a column is declared twice.
    pub fn new<I, C>(name: impl Into<String>, key_column: impl Into<String>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let schema = Self {
            name: name.into(),
            key_column: key_column.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        };

        checked_identifier(&schema.name)?;
        checked_identifier(&schema.key_column)?;
        for (i, column) in schema.columns.iter().enumerate() {
            checked_identifier(column)?;
            if *column == schema.key_column || schema.columns[..i].contains(column) {
                return Err(Error::InvalidConfig {
                    reason: format!("column `{column}` declared twice in `{}`", schema.name),
                });
            }
        }
        Ok(schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Non-key columns in declaration order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of `column` among the non-key columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if the table has no such column.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| Error::UnknownColumn {
                table: self.name.clone(),
                column: column.to_owned(),
            })
    }

    pub(crate) fn check_arity(&self, values: &[String]) -> Result<()> {
        if values.len() == self.columns.len() {
            Ok(())
        } else {
            Err(Error::ColumnMismatch {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: values.len(),
            })
        }
    }
}

/// A stored row: primary key plus one value per non-key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Row {
    pub id: i64,
    pub values: Vec<String>,
}

impl Row {
    pub fn new<I, V>(id: i64, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            id,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Committed rows of one table, keyed (and therefore ordered) by id.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub(crate) schema: TableSchema,
    pub(crate) rows: BTreeMap<i64, Vec<String>>,
}

impl Table {
    pub(crate) fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub(crate) fn duplicate(&self, id: i64) -> Error {
        Error::DuplicateKey {
            table: self.schema.name.clone(),
            id,
        }
    }
}
