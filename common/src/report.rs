//! Buffered status reporting for the serial link to the host.
//!
//! Status lines are produced from early bring-up on, but the host only sees
//! serial data after it has opened the port and asserted DTR. Until then,
//! messages are queued in a bounded backlog; the backlog is flushed as one
//! write on the not-ready to ready transition, and everything after that
//! goes out live. Every message is delivered at most once, in submission
//! order.

/// Receiver for status text, written best-effort.
///
/// The firmware implements this over the CDC serial port; tests implement it
/// over a plain buffer.
pub trait StatusSink {
    fn write_all(&mut self, data: &[u8]);
}

const OVERFLOW_NOTICE: &str = "[status backlog overflowed, messages were dropped]\r\n";

/// Status reporter with a `NotReady -> Ready` state machine.
///
/// `N` is the backlog capacity in bytes. A message that does not fit the
/// remaining backlog is dropped whole (no partial lines) and the loss is
/// announced once, right after the flush. The ready transition is one-way:
/// the host dropping DTR again does not restart buffering for this power
/// cycle.
pub struct StatusReporter<const N: usize> {
    backlog: heapless::String<N>,
    overflowed: bool,
    host_ready: bool,
}

impl<const N: usize> StatusReporter<N> {
    pub const fn new() -> Self {
        Self {
            backlog: heapless::String::new(),
            overflowed: false,
            host_ready: false,
        }
    }

    pub fn host_ready(&self) -> bool {
        self.host_ready
    }

    /// Submit one status message.
    ///
    /// Callers include their own line terminators; the reporter concatenates
    /// messages without inserting delimiters.
    pub fn report(&mut self, sink: &mut impl StatusSink, message: &str) {
        if self.host_ready {
            sink.write_all(message.as_bytes());
        } else if self.backlog.push_str(message).is_err() {
            self.overflowed = true;
        }
    }

    /// Feed the host's readiness line state (DTR) into the reporter.
    ///
    /// On the first transition to ready, the backlog is written to `sink` in
    /// one piece and cleared. Later calls, including `ready = false`, change
    /// nothing.
    pub fn host_ready_changed(&mut self, sink: &mut impl StatusSink, ready: bool) {
        if !ready || self.host_ready {
            return;
        }
        self.host_ready = true;
        if !self.backlog.is_empty() {
            sink.write_all(self.backlog.as_bytes());
            self.backlog.clear();
        }
        if self.overflowed {
            sink.write_all(OVERFLOW_NOTICE.as_bytes());
            self.overflowed = false;
        }
    }
}

impl<const N: usize> Default for StatusReporter<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::String;
    use std::vec::Vec;

    /// Records each `write_all` as a separate chunk.
    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<String>,
    }

    impl StatusSink for RecordingSink {
        fn write_all(&mut self, data: &[u8]) {
            self.writes.push(String::from_utf8(data.to_vec()).unwrap());
        }
    }

    #[test]
    fn backlog_flushes_once_in_submission_order() {
        let mut sink = RecordingSink::default();
        let mut reporter = StatusReporter::<64>::new();

        reporter.report(&mut sink, "A");
        reporter.report(&mut sink, "B");
        assert!(sink.writes.is_empty());

        reporter.host_ready_changed(&mut sink, true);
        assert_eq!(sink.writes, ["AB"]);

        reporter.report(&mut sink, "C");
        assert_eq!(sink.writes, ["AB", "C"]);
    }

    #[test]
    fn ready_with_empty_backlog_writes_nothing() {
        let mut sink = RecordingSink::default();
        let mut reporter = StatusReporter::<64>::new();

        reporter.host_ready_changed(&mut sink, true);
        assert!(sink.writes.is_empty());
        assert!(reporter.host_ready());
    }

    #[test]
    fn repeated_ready_does_not_replay_the_backlog() {
        let mut sink = RecordingSink::default();
        let mut reporter = StatusReporter::<64>::new();

        reporter.report(&mut sink, "boot\r\n");
        reporter.host_ready_changed(&mut sink, true);
        reporter.host_ready_changed(&mut sink, true);
        assert_eq!(sink.writes, ["boot\r\n"]);
    }

    #[test]
    fn dtr_drop_does_not_restart_buffering() {
        let mut sink = RecordingSink::default();
        let mut reporter = StatusReporter::<64>::new();

        reporter.host_ready_changed(&mut sink, true);
        reporter.host_ready_changed(&mut sink, false);
        reporter.report(&mut sink, "still live");
        assert_eq!(sink.writes, ["still live"]);
    }

    #[test]
    fn oversized_message_is_dropped_whole_and_flagged() {
        let mut sink = RecordingSink::default();
        let mut reporter = StatusReporter::<8>::new();

        reporter.report(&mut sink, "12345");
        reporter.report(&mut sink, "too long to fit");
        reporter.report(&mut sink, "678");

        reporter.host_ready_changed(&mut sink, true);
        assert_eq!(sink.writes[0], "12345678");
        assert_eq!(sink.writes[1], OVERFLOW_NOTICE);
        assert_eq!(sink.writes.len(), 2);
    }

    #[test]
    fn not_ready_before_transition_reports_nothing_live() {
        let mut sink = RecordingSink::default();
        let mut reporter = StatusReporter::<64>::new();

        reporter.host_ready_changed(&mut sink, false);
        reporter.report(&mut sink, "queued");
        assert!(!reporter.host_ready());
        assert!(sink.writes.is_empty());
    }
}
