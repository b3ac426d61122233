/// A result type defaulting to the crate-wide [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `ferroseq` can emit.
///
/// Window races are not represented here: every reservation runs inside its
/// generator's critical section, so a duplicate grant is a bug, not a
/// recoverable runtime fault. Ids of rolled-back transactions are not errors
/// either; they stay as permanent gaps in the id space.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The lock guarding shared state was **poisoned**.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, mutexes do **not** poison, so this
    /// variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("lock poisoned")]
    LockPoisoned,

    /// A reservation asked for zero (or fewer) ids.
    #[error("invalid reservation count {count}: must be at least 1")]
    InvalidCount { count: i64 },

    /// The sequence round trip failed. Nothing was committed to the window.
    #[error("sequence `{sequence}` failed: {reason}")]
    Sequence { sequence: String, reason: String },

    /// The sequence returned a value that would overlap ids already handed
    /// out for the generator.
    #[error("sequence `{sequence}` went backwards: window starting at {lower} overlaps ids up to {fetched_up_to}")]
    SequenceRegression {
        sequence: String,
        lower: i64,
        fetched_up_to: i64,
    },

    /// A multi-id reservation kept receiving blocks that do not line up,
    /// usually because the sequence's step does not match the optimizer.
    #[error("sequence `{sequence}` yielded {restarts} non-adjacent blocks in one reservation")]
    NonAdjacentBlocks { sequence: String, restarts: u32 },

    /// Id arithmetic would leave the `i64` domain.
    #[error("id overflow in generator `{generator}`")]
    IdOverflow { generator: String },

    /// No generator with this name was registered.
    #[error("unknown generator `{0}`")]
    UnknownGenerator(String),

    /// A generator with this name is already registered.
    #[error("generator `{0}` is already registered")]
    DuplicateGenerator(String),

    /// A generator or sequence definition is not usable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// No table with this name exists in the store.
    #[error("unknown table `{0}`")]
    UnknownTable(String),

    /// A statement named a column the table does not have.
    #[error("unknown column `{column}` in table `{table}`")]
    UnknownColumn { table: String, column: String },

    /// A row carried a different number of values than the table has
    /// columns.
    #[error("table `{table}` expects {expected} values, got {actual}")]
    ColumnMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// Two rows claimed the same primary key.
    #[error("duplicate primary key {id} in table `{table}`")]
    DuplicateKey { table: String, id: i64 },
}

#[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
#[cfg(not(feature = "parking-lot"))]
use crate::mutex::{MutexGuard, PoisonError};
#[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
