pub mod binding;
pub mod error;
pub mod frame;
pub mod framer;
pub mod mock;
pub mod msg;
mod parse;
pub mod prelude;
pub mod serialport;
