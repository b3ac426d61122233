use core::{fmt, ops::Range};

/// A contiguous block of ids exclusively granted to one requester.
///
/// Ids `first_id ..= last_id()` will never be handed to any other request,
/// whether or not the requester ends up writing them.
///
/// # Example
///
/// ```
/// use ferroseq::{GeneratorConfig, GeneratorRegistry, OptimizerKind};
///
/// let registry = GeneratorRegistry::in_memory([GeneratorConfig::builder("dummy_seq")
///     .increment_size(5)
///     .optimizer(OptimizerKind::PooledLo)
///     .build()
///     .unwrap()])
/// .unwrap();
///
/// let reservation = registry.reserve("dummy_seq", 9).unwrap();
/// assert_eq!(reservation.first_id(), 1);
/// assert_eq!(reservation.last_id(), 9);
/// assert_eq!(reservation.ids().collect::<Vec<_>>(), (1..=9).collect::<Vec<_>>());
/// ```
///
/// Reservations only come from a generator:
///
/// ```compile_fail
/// let reservation = ferroseq::IdReservation::new(i64::MAX, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdReservation {
    first_id: i64,
    count: i64,
}

impl IdReservation {
    /// Creates a reservation of `count` ids starting at `first_id`.
    ///
    /// Callers must ensure `count >= 1` and that the range fits in `i64`.
    pub(crate) const fn new(first_id: i64, count: i64) -> Self {
        debug_assert!(count >= 1);
        Self { first_id, count }
    }

    pub const fn first_id(&self) -> i64 {
        self.first_id
    }

    pub const fn count(&self) -> i64 {
        self.count
    }

    /// The last (inclusive) id of the reservation.
    pub const fn last_id(&self) -> i64 {
        self.first_id + self.count - 1
    }

    /// The reservation as a half-open range.
    pub const fn range(&self) -> Range<i64> {
        self.first_id..self.first_id + self.count
    }

    pub const fn contains(&self, id: i64) -> bool {
        id >= self.first_id && id <= self.last_id()
    }

    /// Iterates the granted ids in ascending order.
    pub fn ids(&self) -> Range<i64> {
        self.range()
    }
}

impl fmt::Display for IdReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..={}]", self.first_id, self.last_id())
    }
}
