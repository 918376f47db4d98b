//! Diagnostics sink.
//!
//! Every component receives a [`Logger`] at construction (through
//! [`Settings`](crate::Settings)) instead of consulting a process-wide
//! function. The default logger discards everything.

use core::fmt;
use rand::{Rng, rng};
use std::sync::Arc;

/// One diagnostics event.
#[derive(Debug)]
pub struct LogRecord<'a> {
    /// Operation that emitted the record, e.g. `Executor::request`.
    pub method: &'a str,
    /// Correlates all records of one logical operation.
    pub request_tag: &'a str,
    pub message: fmt::Arguments<'a>,
}

type Sink = Arc<dyn Fn(&LogRecord<'_>) + Send + Sync>;

/// Cloneable handle to a diagnostics sink.
#[derive(Clone, Default)]
pub struct Logger {
    sink: Option<Sink>,
}

impl Logger {
    /// A logger that drops every record.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Routes records to an arbitrary closure.
    pub fn from_fn<F>(sink: F) -> Self
    where
        F: Fn(&LogRecord<'_>) + Send + Sync + 'static,
    {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// Forwards records as `tracing` debug events with `method` and
    /// `request_tag` fields.
    pub fn tracing() -> Self {
        Self::from_fn(|record| {
            tracing::debug!(
                method = record.method,
                request_tag = record.request_tag,
                "{}",
                record.message
            );
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn log(&self, method: &str, request_tag: &str, message: fmt::Arguments<'_>) {
        if let Some(sink) = &self.sink {
            sink(&LogRecord {
                method,
                request_tag,
                message,
            });
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Returns a random five-character hex tag identifying one logical
/// operation in the logs.
pub fn request_tag() -> String {
    let n: u32 = rng().random();
    format!("{:05x}", n & 0xF_FFFF)
}
