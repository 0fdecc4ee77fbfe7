//! UI port.
//!
//! External collaborators (spinner, status bar, timeline renderer) run on
//! their own threads; the core talks to them only through this trait. The
//! default implementations do nothing, so headless and test runs need no
//! wiring.

use tracing::info;

/// Sink for status and timeline output from the loop.
///
/// Implementations must be cheap and non-blocking — they are called from
/// inside the loop between tool executions.
pub trait UiPort: Send + Sync {
    /// Publish the human-readable "current activity" line.
    fn publish_status(&self, _status: &str) {}

    /// Append one line to the run timeline.
    fn append_timeline_line(&self, _line: &str) {}
}

/// Ignores everything. For tests and one-shot runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPort;

impl UiPort for NoopPort {}

/// Routes status and timeline lines into `tracing` at INFO level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPort;

impl UiPort for LogPort {
    fn publish_status(&self, status: &str) {
        info!("[status] {status}");
    }

    fn append_timeline_line(&self, line: &str) {
        info!("[timeline] {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A port that records everything, for loop tests.
    #[derive(Default)]
    pub struct RecordingPort {
        pub statuses: Mutex<Vec<String>>,
        pub timeline: Mutex<Vec<String>>,
    }

    impl UiPort for RecordingPort {
        fn publish_status(&self, status: &str) {
            self.statuses.lock().unwrap().push(status.to_string());
        }
        fn append_timeline_line(&self, line: &str) {
            self.timeline.lock().unwrap().push(line.to_string());
        }
    }

    #[test]
    fn noop_port_accepts_everything() {
        let port = NoopPort;
        port.publish_status("busy");
        port.append_timeline_line("did a thing");
    }

    #[test]
    fn recording_port_captures_in_order() {
        let port = RecordingPort::default();
        port.publish_status("one");
        port.publish_status("two");
        port.append_timeline_line("line");
        assert_eq!(*port.statuses.lock().unwrap(), ["one", "two"]);
        assert_eq!(*port.timeline.lock().unwrap(), ["line"]);
    }
}
