pub use crate::binding::{FrameListener, OpenPortBinding, PortBinding};
pub use crate::error::{Error, Result};
pub use crate::frame::{DataFrame, SerialControlByte, SerialFrame};
pub use crate::framer::{Framer, FramerEvent};
pub use crate::msg::{Msg, QueuePriority};
