#[cfg(feature = "parking-lot")]
pub use parking_lot::{Mutex, MutexGuard, RwLock};
#[cfg(not(feature = "parking-lot"))]
pub use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

/// Locks a mutex, mapping poisoning to [`crate::Error::LockPoisoned`].
///
/// With `parking-lot` enabled the lock cannot poison and this never fails.
macro_rules! lock {
    ($m:expr) => {{
        #[cfg(feature = "parking-lot")]
        {
            $m.lock()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            $m.lock()?
        }
    }};
}

macro_rules! read_lock {
    ($m:expr) => {{
        #[cfg(feature = "parking-lot")]
        {
            $m.read()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            $m.read().map_err(|_| $crate::Error::LockPoisoned)?
        }
    }};
}

macro_rules! write_lock {
    ($m:expr) => {{
        #[cfg(feature = "parking-lot")]
        {
            $m.write()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            $m.write().map_err(|_| $crate::Error::LockPoisoned)?
        }
    }};
}

pub(crate) use {lock, read_lock, write_lock};
