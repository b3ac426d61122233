//! Optimizer flavours: how one raw sequence value turns into a block of ids.
//!
//! | kind        | sequence step | block for raw value `v`                    |
//! |-------------|---------------|--------------------------------------------|
//! | `none`      | 1             | `[v, v + 1)`                               |
//! | `pooled`    | `incr`        | `[max(v - incr + 1, initial), v + 1)`      |
//! | `pooled-lo` | `incr`        | `[v, v + incr)`                            |
//! | `hilo`      | 1             | `[(v - 1) * incr + 1, v * incr + 1)`       |
//!
//! `pooled` reads each value as the inclusive *high* end of its block. The
//! first value of a fresh sequence is its initial value, which has no block
//! below it, so that one block is clamped to the single id `initial`. Every
//! later block spans exactly `incr` ids and starts right after the previous
//! one.

use core::{fmt, ops::Range, str::FromStr};

use crate::{Error, Result};

/// Selects how raw sequence values are expanded into id blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OptimizerKind {
    /// One round trip per id; no windowing.
    None,
    /// Sequence value is the high end of a block of `increment_size` ids.
    #[default]
    Pooled,
    /// Sequence value is the low end of a block of `increment_size` ids.
    PooledLo,
    /// Sequence counts blocks; `increment_size` ids per step.
    Hilo,
}

impl OptimizerKind {
    /// Every setting string understood by [`FromStr`].
    pub const ALL: [Self; 4] = [Self::None, Self::Pooled, Self::PooledLo, Self::Hilo];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pooled => "pooled",
            Self::PooledLo => "pooled-lo",
            Self::Hilo => "hilo",
        }
    }

    /// Whether this flavour caches more than one id per round trip.
    pub const fn is_pooled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// The `increment by` the database sequence must be created with.
    pub const fn sequence_increment(&self, increment_size: i64) -> i64 {
        match self {
            Self::None | Self::Hilo => 1,
            Self::Pooled | Self::PooledLo => increment_size,
        }
    }

    /// Ids each raw value yields once the sequence is past its seeding
    /// value.
    pub const fn block_size(&self, increment_size: i64) -> i64 {
        match self {
            Self::None => 1,
            Self::Pooled | Self::PooledLo | Self::Hilo => increment_size,
        }
    }

    /// Maps the raw value `raw` to the half-open block of ids it grants.
    ///
    /// Returns `None` if the block would leave the `i64` domain or would be
    /// empty (a raw value below the sequence's initial value).
    pub fn block_for(&self, raw: i64, increment_size: i64, initial_value: i64) -> Option<Range<i64>> {
        let block = match self {
            Self::None => raw..raw.checked_add(1)?,
            Self::Pooled => {
                let lower = raw
                    .checked_sub(increment_size)?
                    .checked_add(1)?
                    .max(initial_value);
                lower..raw.checked_add(1)?
            }
            Self::PooledLo => raw..raw.checked_add(increment_size)?,
            Self::Hilo => {
                let lower = raw.checked_sub(1)?.checked_mul(increment_size)?.checked_add(1)?;
                lower..raw.checked_mul(increment_size)?.checked_add(1)?
            }
        };
        (block.start < block.end).then_some(block)
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::InvalidConfig {
                reason: format!(
                    "unknown optimizer `{s}` (expected one of: none, pooled, pooled-lo, hilo)"
                ),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_clamps_the_seeding_value_and_then_tiles() {
        let kind = OptimizerKind::Pooled;
        assert_eq!(kind.block_for(1, 5, 1), Some(1..2));
        assert_eq!(kind.block_for(6, 5, 1), Some(2..7));
        assert_eq!(kind.block_for(11, 5, 1), Some(7..12));
        assert_eq!(kind.block_for(26, 5, 1), Some(22..27));
    }

    #[test]
    fn pooled_lo_and_hilo_tile_from_the_first_value() {
        assert_eq!(OptimizerKind::PooledLo.block_for(1, 5, 1), Some(1..6));
        assert_eq!(OptimizerKind::PooledLo.block_for(6, 5, 1), Some(6..11));
        assert_eq!(OptimizerKind::Hilo.block_for(1, 5, 1), Some(1..6));
        assert_eq!(OptimizerKind::Hilo.block_for(2, 5, 1), Some(6..11));
        assert_eq!(OptimizerKind::None.block_for(7, 5, 1), Some(7..8));
    }

    #[test]
    fn rejects_blocks_outside_the_domain() {
        assert_eq!(OptimizerKind::PooledLo.block_for(i64::MAX - 2, 5, 1), None);
        assert_eq!(OptimizerKind::Hilo.block_for(i64::MAX, 5, 1), None);
        // below the initial value there is nothing left after clamping
        assert_eq!(OptimizerKind::Pooled.block_for(0, 5, 1), None);
    }

    #[test]
    fn parses_setting_strings() {
        for kind in OptimizerKind::ALL {
            assert_eq!(kind.as_str().parse::<OptimizerKind>().unwrap(), kind);
        }
        assert_eq!(" Pooled-LO ".parse::<OptimizerKind>().unwrap(), OptimizerKind::PooledLo);
        assert!("legacy-hilo".parse::<OptimizerKind>().is_err());
    }
}
