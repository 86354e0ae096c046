use std::borrow::Cow;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Loglevel {
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
}

/// Whether an entry describes inbound traffic, outbound traffic, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
    None,
}

impl Direction {
    pub fn symbol(&self) -> &'static str {
        match self {
            Direction::Inbound => "« ",
            Direction::Outbound => "» ",
            Direction::None => "  ",
        }
    }
}

/// One log entry, produced by a component logger and rendered by a sink.
#[derive(Debug, Clone)]
pub struct LogInfo {
    pub timestamp: Instant,
    pub direction: Direction,
    /// Component tag: SERIAL, DRIVER, CNTRLR, or NODE
    pub label: &'static str,
    /// Qualifier such as the node id, rendered in brackets
    pub primary_tag: Option<String>,
    pub message: Cow<'static, str>,
}
