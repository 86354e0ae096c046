use crate::{LogInfo, Loglevel};
use std::io::Write;
use std::sync::Mutex;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Consumes rendered log entries. Shared between all component loggers of a
/// driver, so entries from different threads interleave whole.
pub trait LogSink: Send + Sync {
    fn log(&self, info: LogInfo, level: Loglevel);
    fn log_level(&self) -> Loglevel;
}

/// Writes colorized entries to stdout.
pub struct ConsoleSink {
    stream: Mutex<StandardStream>,
    level: Loglevel,
}

impl ConsoleSink {
    pub fn new(level: Loglevel) -> Self {
        Self {
            stream: Mutex::new(StandardStream::stdout(ColorChoice::Auto)),
            level,
        }
    }

    fn color_for(label: &str) -> Color {
        match label {
            "SERIAL" => Color::Cyan,
            "DRIVER" => Color::Yellow,
            "CNTRLR" => Color::Green,
            _ => Color::Magenta,
        }
    }
}

impl LogSink for ConsoleSink {
    fn log(&self, info: LogInfo, level: Loglevel) {
        if level > self.level {
            return;
        }
        let Ok(mut stream) = self.stream.lock() else {
            return;
        };

        let _ = stream.set_color(ColorSpec::new().set_fg(Some(Self::color_for(info.label))));
        let _ = write!(stream, "{:6} ", info.label);
        let _ = stream.reset();

        let tag = info
            .primary_tag
            .map(|tag| format!("[{}] ", tag))
            .unwrap_or_default();
        let _ = writeln!(
            stream,
            "{}{}{}",
            info.direction.symbol(),
            tag,
            info.message
        );
    }

    fn log_level(&self) -> Loglevel {
        self.level
    }
}

/// Swallows everything. Default for tests.
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _info: LogInfo, _level: Loglevel) {}

    fn log_level(&self) -> Loglevel {
        Loglevel::Error
    }
}
