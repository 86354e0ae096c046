mod definitions;
mod loggers;
mod sink;

pub use definitions::*;
pub use loggers::*;
pub use sink::*;
