//! Command execution audit sink.
//!
//! Grounded on the original `logger.go`: a small `Start`/`Status`/`End`
//! lifecycle recording which user ran what command, with what parameters,
//! how long it took, and its outcome. The SQL-backed persistence in the
//! original is out of scope — only the interface and a small in-memory test
//! double are implemented here; a real deployment plugs in its own sink.

use std::time::Instant;

/// Implemented by whatever ultimately records command executions. `status`
/// may be called zero or more times before the handle is finished (only the
/// last call wins); if it is never called, the result defaults to `"Error"`,
/// matching the original's behaviour for a command that never explicitly
/// reported its outcome.
pub trait CommandLog: Send {
    fn status(&mut self, result: &str);
}

/// A `CommandLog` that does nothing. Used where no audit sink is configured.
pub struct NullCommandLog;

impl CommandLog for NullCommandLog {
    fn status(&mut self, _result: &str) {}
}

/// One recorded command execution, as captured by [`RecordingCommandLog`].
#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub user_id: i64,
    pub lobby_id: i64,
    pub command: String,
    pub params: String,
    pub result: String,
    pub duration: std::time::Duration,
}

/// An in-memory [`CommandLog`] sink, useful in tests and as a reference
/// implementation of the audit boundary.
#[derive(Default)]
pub struct RecordingCommandLog {
    pub records: std::sync::Mutex<Vec<CommandRecord>>,
}

impl RecordingCommandLog {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    /// Start timing one invocation; the returned handle finalises (computing
    /// elapsed duration and pushing a [`CommandRecord`]) on drop.
    pub fn start(
        self: &std::sync::Arc<Self>,
        user_id: i64,
        lobby_id: i64,
        command: impl Into<String>,
        params: impl Into<String>,
    ) -> RecordingHandle {
        RecordingHandle {
            sink: self.clone(),
            user_id,
            lobby_id,
            command: command.into(),
            params: params.into(),
            result: None,
            started_at: Instant::now(),
        }
    }
}

pub struct RecordingHandle {
    sink: std::sync::Arc<RecordingCommandLog>,
    user_id: i64,
    lobby_id: i64,
    command: String,
    params: String,
    result: Option<String>,
    started_at: Instant,
}

impl CommandLog for RecordingHandle {
    fn status(&mut self, result: &str) {
        self.result = Some(result.to_string());
    }
}

impl Drop for RecordingHandle {
    #[allow(clippy::expect_used)]
    fn drop(&mut self) {
        let record = CommandRecord {
            user_id: self.user_id,
            lobby_id: self.lobby_id,
            command: std::mem::take(&mut self.command),
            params: std::mem::take(&mut self.params),
            result: self.result.take().unwrap_or_else(|| "Error".to_string()),
            duration: self.started_at.elapsed(),
        };
        self.sink
            .records
            .lock()
            .expect("command log mutex poisoned")
            .push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_status_defaults_to_error() {
        let sink = RecordingCommandLog::new();
        {
            let _handle = sink.start(1, 0, "/kick", "bob");
        }
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result, "Error");
    }

    #[test]
    fn explicit_status_is_recorded() {
        let sink = RecordingCommandLog::new();
        {
            let mut handle = sink.start(1, 0, "/kick", "bob");
            handle.status("kicked bob");
        }
        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].result, "kicked bob");
    }
}
