mod database;
mod table;
mod transaction;

pub use database::*;
pub use table::{Row, TableSchema};
pub use transaction::*;
