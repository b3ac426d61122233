#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{GeneratorRegistry, Result, Row, SequenceSource, Transaction};

/// Single-row inserts: one `reserve(generator, 1)` per row, then the write.
///
/// Ids come from the generator's cached window, so most rows cost no
/// sequence round trip at all.
///
/// # Example
///
/// ```
/// use ferroseq::{Database, GeneratorConfig, GeneratorRegistry, IncrementalInsert, TableSchema};
///
/// let registry = GeneratorRegistry::in_memory([
///     GeneratorConfig::builder("dummy_seq").increment_size(5).build().unwrap(),
/// ])
/// .unwrap();
/// let db = Database::new();
/// db.create_table(TableSchema::new("dummy", "id", ["name"]).unwrap()).unwrap();
///
/// let persister = IncrementalInsert::new(&registry, "dummy", "dummy_seq");
/// let id = db.in_transaction(|tx| persister.persist(tx, ["d1"])).unwrap();
/// assert_eq!(id, 1);
/// ```
#[derive(Debug)]
pub struct IncrementalInsert<'r, S> {
    registry: &'r GeneratorRegistry<S>,
    table: String,
    generator: String,
}

impl<'r, S: SequenceSource> IncrementalInsert<'r, S> {
    pub fn new(
        registry: &'r GeneratorRegistry<S>,
        table: impl Into<String>,
        generator: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            table: table.into(),
            generator: generator.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn generator(&self) -> &str {
        &self.generator
    }

    /// Assigns the next id to a row made of `values` and writes it into
    /// `tx`. Returns the id.
    ///
    /// The table and the row's arity are checked first, so a rejected row
    /// consumes no id. Once reserved, the id stays consumed even if the
    /// write or the transaction fails.
    ///
    /// # Errors
    ///
    /// - [`UnknownTable`](crate::Error::UnknownTable) or
    ///   [`ColumnMismatch`](crate::Error::ColumnMismatch) before any
    ///   reservation.
    /// - Any reservation error (see [`GeneratorRegistry::reserve`]) or write
    ///   error (see [`Transaction::insert`]).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, tx, values), fields(table = %self.table))
    )]
    pub fn persist<I, V>(&self, tx: &mut Transaction<'_>, values: I) -> Result<i64>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        tx.database().schema(&self.table)?.check_arity(&values)?;

        let id = self.registry.next_id(&self.generator)?;
        tx.insert(&self.table, Row { id, values })?;
        Ok(id)
    }
}
