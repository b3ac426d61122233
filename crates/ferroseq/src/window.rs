use core::{fmt, ops::Range};

/// The in-memory block of ids a generator has reserved from its sequence but
/// not yet handed out.
///
/// Invariant: `lower_bound <= next_free <= upper_bound`. The window is
/// exhausted once `next_free == upper_bound`; the next single-id request then
/// replenishes it with a fresh block from the sequence.
///
/// An `AllocatorWindow` returned from the public API is a snapshot; the live
/// window is only ever mutated inside its generator's critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocatorWindow {
    lower_bound: i64,
    upper_bound: i64,
    next_free: i64,
}

/// Lifecycle of a generator's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// Nothing cached: the next single-id request goes to the sequence.
    Empty,
    /// Some ids of the current block are still available.
    PartiallyConsumed,
}

impl AllocatorWindow {
    /// A fresh, fully available window over `block`.
    pub fn from_block(block: Range<i64>) -> Self {
        debug_assert!(block.start < block.end);
        Self {
            lower_bound: block.start,
            upper_bound: block.end,
            next_free: block.start,
        }
    }

    pub const fn lower_bound(&self) -> i64 {
        self.lower_bound
    }

    /// Exclusive upper bound.
    pub const fn upper_bound(&self) -> i64 {
        self.upper_bound
    }

    pub const fn next_free(&self) -> i64 {
        self.next_free
    }

    /// Number of ids the block spans, consumed or not.
    pub const fn size(&self) -> i64 {
        self.upper_bound - self.lower_bound
    }

    pub const fn remaining(&self) -> i64 {
        self.upper_bound - self.next_free
    }

    pub const fn is_exhausted(&self) -> bool {
        self.next_free == self.upper_bound
    }

    pub const fn state(&self) -> WindowState {
        if self.is_exhausted() {
            WindowState::Empty
        } else {
            WindowState::PartiallyConsumed
        }
    }

    /// Hands out the next cached id, or `None` when exhausted.
    pub(crate) fn take_one(&mut self) -> Option<i64> {
        if self.is_exhausted() {
            return None;
        }
        let id = self.next_free;
        self.next_free += 1;
        debug_assert!(self.lower_bound <= self.next_free && self.next_free <= self.upper_bound);
        Some(id)
    }
}

impl fmt::Display for AllocatorWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}) next={}",
            self.lower_bound, self.upper_bound, self.next_free
        )
    }
}
