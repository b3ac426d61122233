mod pooled;
mod registry;

pub use pooled::*;
pub use registry::*;
