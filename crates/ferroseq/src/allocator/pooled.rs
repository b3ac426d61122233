use core::ops::Range;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AllocatorWindow, Error, GeneratorConfig, IdReservation, Result, SequenceSource,
    mutex::{Mutex, lock},
};

/// Times a multi-id reservation may abandon its range because the next block
/// was not adjacent before giving up.
const MAX_BULK_RESTARTS: u32 = 4;

#[derive(Debug, Default)]
struct AllocatorState {
    /// Block cached for single-id requests.
    window: Option<AllocatorWindow>,
    /// Exclusive upper bound of the last block fetched from the sequence.
    fetched_up_to: Option<i64>,
}

/// The pooled block allocator of one generator.
///
/// Single-id requests are served from an in-memory [`AllocatorWindow`] and
/// only hit the sequence when it runs dry. Multi-id requests (bulk
/// statements) are served from blocks fetched fresh for that request, under
/// the same lock, so they can never be computed from a stale view of what the
/// window already promised to someone else.
///
/// ## Features
/// - ✅ Thread-safe: the whole read-check-update runs in one critical section
/// - ✅ Contiguous multi-id grants
/// - ✅ Any [`crate::OptimizerKind`]
///
/// ## See Also
/// - [`GeneratorRegistry`], which shares one allocator per generator between
///   every insert path
///
/// [`GeneratorRegistry`]: crate::GeneratorRegistry
#[derive(Debug)]
pub struct PooledAllocator {
    config: GeneratorConfig,
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<AllocatorState>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<AllocatorState>,
}

impl PooledAllocator {
    /// Creates an allocator with an empty window.
    ///
    /// Nothing is fetched until the first reservation; the sequence named by
    /// `config` must already exist in whatever [`SequenceSource`] is passed
    /// to [`Self::reserve`], created with
    /// [`GeneratorConfig::sequence_definition`].
    ///
    /// # Parameters
    ///
    /// - `config`: The generator definition: sequence name, increment size,
    ///   initial value and [`crate::OptimizerKind`]. It is validated again
    ///   here since deserialized configs bypass the builder.
    ///
    /// # Returns
    ///
    /// An allocator whose window is empty and that has never seen a block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(AllocatorState::default()).into(),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Reserves `count` consecutive ids.
    ///
    /// - `count == 1` takes the next cached id, replenishing the window from
    ///   `source` when it is exhausted.
    /// - `count > 1` fetches as many fresh blocks as needed and concatenates
    ///   them. The cached window is left untouched for later single-id
    ///   requests and whatever the last block holds beyond `count` is left
    ///   as a gap.
    ///
    /// State is only written after every round trip of the reservation
    /// succeeded.
    ///
    /// # Parameters
    ///
    /// - `source`: The [`SequenceSource`] the generator's sequence lives in.
    ///   Every call is one round trip; it is only called while the window
    ///   (for `count == 1`) or the requested range cannot be served otherwise.
    /// - `count`: Number of consecutive ids wanted. Must be at least 1.
    ///
    /// # Returns
    ///
    /// An [`IdReservation`] of exactly `count` consecutive ids that no other
    /// caller of this allocator will ever receive.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCount`] if `count < 1`, before anything is locked
    /// - [`Error::Sequence`] if a round trip fails
    /// - [`Error::SequenceRegression`] if the sequence hands out a value that
    ///   overlaps an earlier block
    /// - [`Error::NonAdjacentBlocks`] if a multi-id range had to restart more
    ///   than a few times, typically because the sequence was created with a
    ///   step the optimizer does not expect
    /// - [`Error::IdOverflow`] if a block would leave the `i64` domain
    /// - [`Error::LockPoisoned`] if the lock is poisoned
    ///
    /// # Example
    ///
    /// ```
    /// use ferroseq::{GeneratorConfig, InMemorySequenceSource, PooledAllocator};
    ///
    /// let config = GeneratorConfig::builder("dummy_seq").increment_size(5).build().unwrap();
    /// let source = InMemorySequenceSource::default();
    /// source.create_sequence(&config.sequence_definition()).unwrap();
    ///
    /// let allocator = PooledAllocator::new(config).unwrap();
    /// for expected in 1..=9 {
    ///     assert_eq!(allocator.reserve(&source, 1).unwrap().first_id(), expected);
    /// }
    /// let bulk = allocator.reserve(&source, 9).unwrap();
    /// assert_eq!((bulk.first_id(), bulk.last_id()), (12, 20));
    /// assert_eq!(allocator.reserve(&source, 1).unwrap().first_id(), 10);
    /// ```
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, source), fields(generator = %self.config.generator_name()))
    )]
    pub fn reserve<S>(&self, source: &S, count: i64) -> Result<IdReservation>
    where
        S: SequenceSource + ?Sized,
    {
        if count < 1 {
            return Err(Error::InvalidCount { count });
        }

        let mut state = lock!(self.state);
        if count == 1 {
            self.reserve_one(source, &mut state)
        } else {
            self.reserve_many(source, &mut state, count)
        }
    }

    fn reserve_one<S>(&self, source: &S, state: &mut AllocatorState) -> Result<IdReservation>
    where
        S: SequenceSource + ?Sized,
    {
        if let Some(id) = state.window.as_mut().and_then(AllocatorWindow::take_one) {
            return Ok(IdReservation::new(id, 1));
        }

        let block = self.fetch_block(source, state.fetched_up_to)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            generator = self.config.generator_name(),
            lower = block.start,
            upper = block.end,
            "replenished window"
        );

        let mut window = AllocatorWindow::from_block(block);
        let id = window
            .take_one()
            .ok_or_else(|| self.overflow())?;
        state.fetched_up_to = Some(window.upper_bound());
        state.window = Some(window);
        Ok(IdReservation::new(id, 1))
    }

    fn reserve_many<S>(
        &self,
        source: &S,
        state: &mut AllocatorState,
        count: i64,
    ) -> Result<IdReservation>
    where
        S: SequenceSource + ?Sized,
    {
        let mut fetched_up_to = state.fetched_up_to;
        let mut pending: Option<Range<i64>> = None;
        let mut restarts = 0;

        let run = loop {
            let block = self.fetch_block(source, fetched_up_to)?;
            fetched_up_to = Some(block.end);

            let next = match pending.take() {
                Some(current) if current.end == block.start => current.start..block.end,
                Some(_current) => {
                    // Someone outside this process drew from the sequence
                    // between two of our round trips.
                    restarts += 1;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        generator = self.config.generator_name(),
                        abandoned_lower = _current.start,
                        abandoned_upper = _current.end,
                        restarts,
                        "non-adjacent block, restarting bulk range"
                    );
                    if restarts > MAX_BULK_RESTARTS {
                        return Err(Error::NonAdjacentBlocks {
                            sequence: self.config.sequence_name().to_owned(),
                            restarts,
                        });
                    }
                    block
                }
                None => block,
            };

            if next.end - next.start >= count {
                break next;
            }
            pending = Some(next);
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            generator = self.config.generator_name(),
            first_id = run.start,
            count,
            gap = run.end - run.start - count,
            "reserved bulk range"
        );

        state.fetched_up_to = fetched_up_to;
        Ok(IdReservation::new(run.start, count))
    }

    /// One round trip, mapped through the optimizer and checked against the
    /// blocks seen so far.
    fn fetch_block<S>(&self, source: &S, fetched_up_to: Option<i64>) -> Result<Range<i64>>
    where
        S: SequenceSource + ?Sized,
    {
        let sequence = self.config.sequence_name();
        let raw = source.next_value(sequence)?;
        if raw < self.config.initial_value() {
            return Err(Error::Sequence {
                sequence: sequence.to_owned(),
                reason: format!(
                    "value {raw} is below the initial value {}",
                    self.config.initial_value()
                ),
            });
        }

        let block = self
            .config
            .optimizer()
            .block_for(
                raw,
                self.config.increment_size(),
                self.config.initial_value(),
            )
            .ok_or_else(|| self.overflow())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(sequence, raw, lower = block.start, upper = block.end, "fetched block");

        match fetched_up_to {
            Some(up_to) if block.start < up_to => Err(Error::SequenceRegression {
                sequence: sequence.to_owned(),
                lower: block.start,
                fetched_up_to: up_to,
            }),
            _ => Ok(block),
        }
    }

    /// Snapshot of the cached window, `None` while nothing was fetched.
    ///
    /// # Errors
    ///
    /// Fails only if the lock is poisoned.
    pub fn window(&self) -> Result<Option<AllocatorWindow>> {
        Ok(lock!(self.state).window)
    }

    /// Drops the cached window. Its unused ids become permanent gaps; the
    /// next single-id request fetches a fresh block.
    ///
    /// # Errors
    ///
    /// Fails only if the lock is poisoned.
    pub fn reset(&self) -> Result<()> {
        let mut state = lock!(self.state);
        #[cfg(feature = "tracing")]
        if let Some(window) = state.window {
            tracing::debug!(
                generator = self.config.generator_name(),
                dropped = window.remaining(),
                "window reset"
            );
        }
        state.window = None;
        Ok(())
    }

    fn overflow(&self) -> Error {
        Error::IdOverflow {
            generator: self.config.generator_name().to_owned(),
        }
    }
}
