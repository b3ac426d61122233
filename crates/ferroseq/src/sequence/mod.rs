mod interface;
mod memory;
mod sql;

pub use interface::*;
pub use memory::*;
pub use sql::*;
pub(crate) use sql::checked_identifier;
