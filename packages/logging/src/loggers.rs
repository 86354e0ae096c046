use crate::{Direction, LogInfo, LogSink, Loglevel};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use zmesh_core::definitions::NodeId;

fn entry(
    label: &'static str,
    direction: Direction,
    primary_tag: Option<String>,
    message: Cow<'static, str>,
) -> LogInfo {
    LogInfo {
        timestamp: Instant::now(),
        direction,
        label,
        primary_tag,
        message,
    }
}

/// Raw wire traffic.
#[derive(Clone)]
pub struct SerialLogger {
    sink: Arc<dyn LogSink>,
}

impl SerialLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn data(&self, direction: Direction, bytes: &[u8]) {
        self.sink.log(
            entry(
                "SERIAL",
                direction,
                None,
                format!("0x{}", hex::encode(bytes)).into(),
            ),
            Loglevel::Debug,
        );
    }

    pub fn control(&self, direction: Direction, what: &'static str) {
        self.sink.log(
            entry("SERIAL", direction, None, what.into()),
            Loglevel::Debug,
        );
    }
}

/// Driver lifecycle and transaction events.
#[derive(Clone)]
pub struct DriverLogger {
    sink: Arc<dyn LogSink>,
}

impl DriverLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn message(&self, message: impl Into<Cow<'static, str>>) {
        self.sink.log(
            entry("DRIVER", Direction::None, None, message.into()),
            Loglevel::Info,
        );
    }

    pub fn verbose(&self, message: impl Into<Cow<'static, str>>) {
        self.sink.log(
            entry("DRIVER", Direction::None, None, message.into()),
            Loglevel::Verbose,
        );
    }

    pub fn error(&self, message: impl Into<Cow<'static, str>>) {
        self.sink.log(
            entry("DRIVER", Direction::None, None, message.into()),
            Loglevel::Error,
        );
    }
}

/// Controller-command progress.
#[derive(Clone)]
pub struct ControllerLogger {
    sink: Arc<dyn LogSink>,
}

impl ControllerLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn message(&self, message: impl Into<Cow<'static, str>>) {
        self.sink.log(
            entry("CNTRLR", Direction::None, None, message.into()),
            Loglevel::Info,
        );
    }
}

/// Per-node traffic and interrogation progress.
#[derive(Clone)]
pub struct NodeLogger {
    sink: Arc<dyn LogSink>,
}

impl NodeLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn message(&self, node_id: NodeId, message: impl Into<Cow<'static, str>>) {
        self.sink.log(
            entry(
                "NODE",
                Direction::None,
                Some(node_id.to_string()),
                message.into(),
            ),
            Loglevel::Info,
        );
    }

    pub fn command(&self, node_id: NodeId, direction: Direction, message: impl Into<Cow<'static, str>>) {
        self.sink.log(
            entry(
                "NODE",
                direction,
                Some(node_id.to_string()),
                message.into(),
            ),
            Loglevel::Verbose,
        );
    }

    pub fn error(&self, node_id: NodeId, message: impl Into<Cow<'static, str>>) {
        self.sink.log(
            entry(
                "NODE",
                Direction::None,
                Some(node_id.to_string()),
                message.into(),
            ),
            Loglevel::Error,
        );
    }
}
