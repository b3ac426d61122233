use core::{fmt, str::FromStr};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Error, Result, SequenceSource};

/// SQL flavours the sequence and bulk-insert statements are rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    #[default]
    PostgreSql,
    Db2,
}

impl Dialect {
    /// Statement fetching the next value of `sequence` in one round trip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `sequence` is not a plain
    /// (optionally schema-qualified) identifier.
    pub fn next_value_sql(&self, sequence: &str) -> Result<String> {
        let sequence = checked_identifier(sequence)?;
        Ok(match self {
            Self::PostgreSql => format!("select nextval('{sequence}')"),
            Self::Db2 => format!("values nextval for {sequence}"),
        })
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PostgreSql => "postgresql",
            Self::Db2 => "db2",
        })
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::PostgreSql),
            "db2" => Ok(Self::Db2),
            _ => Err(Error::InvalidConfig {
                reason: format!("unknown dialect `{s}` (expected postgresql or db2)"),
            }),
        }
    }
}

/// Accepts `name` or `schema.name` built from ASCII letters, digits and `_`,
/// not starting with a digit.
pub(crate) fn checked_identifier(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            part.chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidConfig {
            reason: format!("`{name}` is not a valid SQL identifier"),
        })
    }
}

/// The narrow slice of a database connection a [`SqlSequenceSource`] needs.
pub trait SqlExecutor {
    type Error: fmt::Display;

    /// Executes `sql` as its own statement and returns the single `bigint`
    /// it yields.
    fn query_i64(&self, sql: &str) -> core::result::Result<i64, Self::Error>;
}

/// A [`SequenceSource`] issuing one dialect-specific statement per value.
pub struct SqlSequenceSource<E> {
    executor: E,
    dialect: Dialect,
}

impl<E: SqlExecutor> SqlSequenceSource<E> {
    pub const fn new(executor: E, dialect: Dialect) -> Self {
        Self { executor, dialect }
    }

    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: SqlExecutor> SequenceSource for SqlSequenceSource<E> {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn next_value(&self, sequence: &str) -> Result<i64> {
        let sql = self.dialect.next_value_sql(sequence)?;
        self.executor
            .query_i64(&sql)
            .map_err(|e| Error::Sequence {
                sequence: sequence.to_owned(),
                reason: e.to_string(),
            })
    }
}
