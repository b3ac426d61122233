use std::collections::HashMap;

use portable_atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result, SequenceDefinition, SequenceSource,
    mutex::{Mutex, lock},
};

#[derive(Debug, Clone, Copy)]
struct SequenceCell {
    initial_value: i64,
    increment_by: i64,
    /// Value the next call returns.
    next: i64,
}

/// A process-local stand-in for database sequences.
///
/// Behaves like a real sequence: strictly increasing, one "round trip" per
/// call, never reused. Every call is counted so callers can verify how many
/// trips an allocation strategy costs.
///
/// # Example
///
/// ```
/// use ferroseq::{InMemorySequenceSource, SequenceDefinition, SequenceSource};
///
/// let source = InMemorySequenceSource::default();
/// source
///     .create_sequence(&SequenceDefinition { name: "s".into(), initial_value: 1, increment_by: 5 })
///     .unwrap();
///
/// assert_eq!(source.next_value("s").unwrap(), 1);
/// assert_eq!(source.next_value("s").unwrap(), 6);
/// assert_eq!(source.round_trips(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemorySequenceSource {
    sequences: Mutex<HashMap<String, SequenceCell>>,
    round_trips: AtomicU64,
    fail_next: AtomicBool,
}

impl InMemorySequenceSource {
    /// Creates `definition.name` unless it exists.
    ///
    /// Creating an existing sequence with the same shape is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the sequence exists with a
    /// different initial value or step, or the step is not positive.
    pub fn create_sequence(&self, definition: &SequenceDefinition) -> Result<()> {
        if definition.increment_by < 1 {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "sequence `{}` must increment by at least 1, got {}",
                    definition.name, definition.increment_by
                ),
            });
        }

        let mut sequences = lock!(self.sequences);
        match sequences.get(&definition.name) {
            Some(cell)
                if cell.initial_value == definition.initial_value
                    && cell.increment_by == definition.increment_by =>
            {
                Ok(())
            }
            Some(cell) => Err(Error::InvalidConfig {
                reason: format!(
                    "sequence `{}` already exists with start {} increment {}",
                    definition.name, cell.initial_value, cell.increment_by
                ),
            }),
            None => {
                sequences.insert(
                    definition.name.clone(),
                    SequenceCell {
                        initial_value: definition.initial_value,
                        increment_by: definition.increment_by,
                        next: definition.initial_value,
                    },
                );
                Ok(())
            }
        }
    }

    /// The last value handed out, or `None` if the sequence was never read
    /// (or does not exist).
    ///
    /// # Errors
    ///
    /// Fails only if the lock is poisoned.
    pub fn current_value(&self, sequence: &str) -> Result<Option<i64>> {
        let sequences = lock!(self.sequences);
        Ok(sequences
            .get(sequence)
            .filter(|cell| cell.next != cell.initial_value)
            .map(|cell| cell.next - cell.increment_by))
    }

    /// Total number of `next_value` calls, failed ones included.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Makes the next call fail as if the connection dropped.
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::Release);
    }
}

impl SequenceSource for InMemorySequenceSource {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn next_value(&self, sequence: &str) -> Result<i64> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);

        if self.fail_next.swap(false, Ordering::AcqRel) {
            return Err(Error::Sequence {
                sequence: sequence.to_owned(),
                reason: "connection reset".to_owned(),
            });
        }

        let mut sequences = lock!(self.sequences);
        let cell = sequences
            .get_mut(sequence)
            .ok_or_else(|| Error::Sequence {
                sequence: sequence.to_owned(),
                reason: "sequence does not exist".to_owned(),
            })?;

        let value = cell.next;
        cell.next = value
            .checked_add(cell.increment_by)
            .ok_or_else(|| Error::Sequence {
                sequence: sequence.to_owned(),
                reason: "sequence exhausted".to_owned(),
            })?;
        Ok(value)
    }
}
