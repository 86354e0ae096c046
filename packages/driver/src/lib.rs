pub mod controller_command;
pub mod driver;
pub mod error;
pub mod manager;
pub mod node;
pub mod notify;
pub mod poll;
pub mod queue;
pub mod storage;
pub mod transaction;

pub use driver::{Driver, DriverCommand, DriverOptions};
pub use error::{Error, Result};
pub use manager::{Manager, ManagerOptions};
pub use notify::{WatcherCallback, Watchers};
