use std::sync::Arc;

use crate::Result;

/// A database sequence object, seen through its single operation.
///
/// Implementations perform a genuine round trip on every call: no caching,
/// no pooling, no retries. Values are strictly increasing per sequence for
/// the lifetime of the database. All windowing lives in the allocator.
pub trait SequenceSource {
    /// Fetches the next raw value of `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Sequence`] when the round trip fails
    /// (connectivity, permissions, missing sequence).
    fn next_value(&self, sequence: &str) -> Result<i64>;
}

impl<S: SequenceSource + ?Sized> SequenceSource for &S {
    fn next_value(&self, sequence: &str) -> Result<i64> {
        (**self).next_value(sequence)
    }
}

impl<S: SequenceSource + ?Sized> SequenceSource for Arc<S> {
    fn next_value(&self, sequence: &str) -> Result<i64> {
        (**self).next_value(sequence)
    }
}

/// What a sequence must look like for a generator to use it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceDefinition {
    pub name: String,
    /// First value the sequence returns (`start with`).
    pub initial_value: i64,
    /// Step between consecutive values (`increment by`).
    pub increment_by: i64,
}
