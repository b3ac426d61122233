#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod allocator;
mod config;
mod error;
mod insert;
mod mutex;
mod optimizer;
mod reservation;
mod sequence;
mod store;
mod window;

pub use crate::allocator::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::insert::*;
pub use crate::optimizer::*;
pub use crate::reservation::*;
pub use crate::sequence::*;
pub use crate::store::*;
pub use crate::window::*;
