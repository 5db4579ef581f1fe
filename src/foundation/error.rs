/// Convenience result type used across the runtime.
pub type CineResult<T> = Result<T, CineError>;

/// Top-level error taxonomy used by runtime APIs.
#[derive(thiserror::Error, Debug)]
pub enum CineError {
    /// Invalid user-provided configuration or descriptor data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Script source failed to produce a callable.
    #[error("compile error: {0}")]
    Compile(String),

    /// A script or model callable failed while a frame was being drawn.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CineError {
    /// Build a [`CineError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CineError::Compile`] value.
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    /// Build a [`CineError::Runtime`] value.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}

/// Which stage produced a reported error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    /// Script source could not be compiled into a callable.
    Compile,
    /// A callable failed during frame execution.
    Runtime,
}

/// A host-visible error event produced while running a frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    /// Stage that failed.
    pub source: ErrorSource,
    /// Human-readable message, already naming the offending unit.
    pub message: String,
    /// Id of the script/asset that failed, when known.
    pub asset_id: Option<String>,
    /// Media time (seconds) at which the event was reported.
    pub at: f64,
}

impl ErrorEvent {
    /// Build a runtime-stage event.
    pub fn runtime(message: impl Into<String>, asset_id: Option<String>) -> Self {
        Self {
            source: ErrorSource::Runtime,
            message: message.into(),
            asset_id,
            at: 0.0,
        }
    }

    /// Build a compile-stage event.
    pub fn compile(message: impl Into<String>, asset_id: Option<String>) -> Self {
        Self {
            source: ErrorSource::Compile,
            message: message.into(),
            asset_id,
            at: 0.0,
        }
    }
}

/// Duplicate suppression window, in seconds of media time.
const DEDUP_WINDOW_SECS: f64 = 2.0;

/// Retained error events for host display.
///
/// Duplicate events (same source + message) reported within
/// [`DEDUP_WINDOW_SECS`] of each other are suppressed so a script that fails
/// on every frame does not flood the host UI.
#[derive(Debug, Default)]
pub struct ErrorLog {
    events: Vec<ErrorEvent>,
}

impl ErrorLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event at media time `now`, unless an identical one was seen
    /// within the suppression window. Returns whether the event was kept.
    pub fn report(&mut self, mut event: ErrorEvent, now: f64) -> bool {
        let duplicate = self.events.iter().any(|e| {
            e.source == event.source
                && e.message == event.message
                && (now - e.at).abs() < DEDUP_WINDOW_SECS
        });
        if duplicate {
            return false;
        }
        event.at = now;
        tracing::debug!(source = ?event.source, message = %event.message, "error event");
        self.events.push(event);
        true
    }

    /// Drop retained events, optionally only those from one source
    /// (e.g. compile errors after a successful recompile).
    pub fn clear(&mut self, source: Option<ErrorSource>) {
        match source {
            Some(s) => self.events.retain(|e| e.source != s),
            None => self.events.clear(),
        }
    }

    /// Events currently retained for display.
    pub fn events(&self) -> &[ErrorEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_taxonomy_prefix() {
        let e = CineError::runtime("boom");
        assert_eq!(e.to_string(), "runtime error: boom");
        let e = CineError::compile("bad token");
        assert_eq!(e.to_string(), "compile error: bad token");
    }

    #[test]
    fn log_suppresses_duplicates_within_window() {
        let mut log = ErrorLog::new();
        assert!(log.report(ErrorEvent::runtime("boom", None), 1.0));
        assert!(!log.report(ErrorEvent::runtime("boom", None), 2.5));
        assert!(log.report(ErrorEvent::runtime("boom", None), 3.5));
        assert_eq!(log.events().len(), 2);
    }

    #[test]
    fn log_keeps_distinct_messages_and_sources() {
        let mut log = ErrorLog::new();
        assert!(log.report(ErrorEvent::runtime("a", None), 0.0));
        assert!(log.report(ErrorEvent::runtime("b", None), 0.0));
        assert!(log.report(ErrorEvent::compile("a", None), 0.0));
        assert_eq!(log.events().len(), 3);
    }

    #[test]
    fn clear_by_source_keeps_others() {
        let mut log = ErrorLog::new();
        log.report(ErrorEvent::runtime("a", None), 0.0);
        log.report(ErrorEvent::compile("b", None), 0.0);
        log.clear(Some(ErrorSource::Compile));
        assert_eq!(log.events().len(), 1);
        assert_eq!(log.events()[0].source, ErrorSource::Runtime);
        log.clear(None);
        assert!(log.events().is_empty());
    }
}
