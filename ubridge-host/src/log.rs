// Log sink: the host's UE_LOG equivalent.
//
// Records are kept in memory so callers (and tests) can inspect them; `flush`
// echoes everything not yet flushed to stderr when echo is enabled.

use std::cell::{Cell, RefCell};

/// Log level constants shared with the bridge's `blog!` macro.
pub const LOG_DISPLAY: u8 = 0;
pub const LOG_WARNING: u8 = 1;
pub const LOG_ERROR: u8 = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub category: String,
    pub verbosity: u8,
    pub message: String,
}

#[derive(Default)]
pub struct LogSink {
    records: RefCell<Vec<LogRecord>>,
    flushed: Cell<usize>,
    flush_count: Cell<u32>,
    echo: Cell<bool>,
}

impl LogSink {
    pub fn log(&self, category: &str, verbosity: u8, message: impl Into<String>) {
        self.records.borrow_mut().push(LogRecord {
            category: category.to_string(),
            verbosity,
            message: message.into(),
        });
    }

    /// Write every record logged since the previous flush.
    pub fn flush(&self) {
        let records = self.records.borrow();
        if self.echo.get() {
            for record in &records[self.flushed.get()..] {
                eprintln!("{}: {}: {}", record.category, verbosity_label(record.verbosity), record.message);
            }
        }
        self.flushed.set(records.len());
        self.flush_count.set(self.flush_count.get() + 1);
    }

    pub fn set_echo(&self, echo: bool) {
        self.echo.set(echo);
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.borrow().clone()
    }

    /// Number of records not yet written by `flush`.
    pub fn pending(&self) -> usize {
        self.records.borrow().len() - self.flushed.get()
    }

    pub fn flush_count(&self) -> u32 {
        self.flush_count.get()
    }
}

fn verbosity_label(verbosity: u8) -> &'static str {
    match verbosity {
        LOG_WARNING => "Warning",
        LOG_ERROR => "Error",
        _ => "Display",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_clears_pending() {
        let sink = LogSink::default();
        sink.log("LogTest", LOG_DISPLAY, "one");
        sink.log("LogTest", LOG_ERROR, "two");
        assert_eq!(sink.pending(), 2);
        sink.flush();
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.flush_count(), 1);
        assert_eq!(sink.records()[1].verbosity, LOG_ERROR);
    }
}
