mod bulk;
mod incremental;
#[cfg(test)]
mod tests;

pub use bulk::*;
pub use incremental::*;
