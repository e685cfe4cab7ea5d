//! Error reporting: one callback per arena plus a last-error slot.

use std::fmt;
use std::sync::Arc;

use crate::error::{ArenaError, ErrorCode};

/// Error callback: receives the code and a human-readable message.
///
/// Runs synchronously on the thread that hit the error.
pub type ErrorCallback = Arc<dyn Fn(ErrorCode, &str) + Send + Sync>;

/// Routes errors to the callback and remembers the most recent one.
#[derive(Default)]
pub struct ErrorReporter {
    callback: Option<ErrorCallback>,
    last: Option<ArenaError>,
}

impl ErrorReporter {
    /// Reporter with an optional callback.
    pub fn new(callback: Option<ErrorCallback>) -> Self {
        Self {
            callback,
            last: None,
        }
    }

    /// Log, invoke the callback, store the error, and hand it back for
    /// returning to the caller.
    pub fn report(&mut self, err: ArenaError) -> ArenaError {
        dispatch(self.callback.as_ref(), &err);
        self.last = Some(err.clone());
        err
    }

    /// Take the last error, clearing the slot.
    pub fn take_last(&mut self) -> Option<ArenaError> {
        self.last.take()
    }

    /// Look at the last error without clearing it.
    pub fn peek_last(&self) -> Option<&ArenaError> {
        self.last.as_ref()
    }

    /// The installed callback.
    pub fn callback(&self) -> Option<&ErrorCallback> {
        self.callback.as_ref()
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("callback", &self.callback.is_some())
            .field("last", &self.last)
            .finish()
    }
}

/// Report an error that has no arena to own it (construction failure,
/// scratch exhaustion).
pub(crate) fn report_detached(callback: Option<&ErrorCallback>, err: &ArenaError) {
    dispatch(callback, err);
}

fn dispatch(callback: Option<&ErrorCallback>, err: &ArenaError) {
    let code = err.code();
    let message = err.to_string();
    if code == ErrorCode::InitFailed {
        tracing::error!(%code, "{message}");
    } else {
        tracing::warn!(%code, "{message}");
    }
    if let Some(cb) = callback {
        cb(code, &message);
    }
}
