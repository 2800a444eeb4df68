//! Progress and log events flowing from the pipeline to the presentation layer.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Capacity of the bounded progress channel.
///
/// When the consumer falls behind, further events are dropped rather than
/// blocking the pipeline; the log sink still records every line.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Ordered, append-only record of every log line produced during a run.
pub(crate) type LogSink = Arc<Mutex<Vec<String>>>;

/// One progress or log event.
///
/// Events with `fraction: None` are log-only: they carry a line for the
/// visible log without moving the progress bar. Within one phase, the
/// fractions of non-log-only events are monotonically non-decreasing and
/// the stream ends after a single terminal event (completion at 1.0,
/// or the first fatal error).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProgressEvent {
    /// Name of the step this event belongs to.
    pub step: String,

    /// Human-readable message.
    pub message: String,

    /// Overall completed fraction in `[0, 1]`, or `None` for log-only events.
    pub fraction: Option<f64>,

    /// Error text, present only on the terminal failure event.
    pub error: Option<String>,
}

impl ProgressEvent {
    /// True for events that only carry a log line.
    pub fn is_log_only(&self) -> bool {
        self.fraction.is_none() && self.error.is_none()
    }
}

/// Sending half of the event stream, shared by every component of a phase.
///
/// All sends are non-blocking: if the channel is full or the receiver is
/// gone, the event is dropped. Log lines are appended to the sink first,
/// so the durable log is complete even when the live stream is lossy.
#[derive(Clone)]
pub(crate) struct EventSender {
    tx: Option<mpsc::Sender<ProgressEvent>>,
    sink: LogSink,
    step: String,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::Sender<ProgressEvent>, sink: LogSink, step: &str) -> Self {
        Self {
            tx: Some(tx),
            sink,
            step: step.to_string(),
        }
    }

    /// A sender that records to the log sink without a live channel.
    ///
    /// Used by operations the GUI calls directly (restore, direct
    /// configure) where only the durable log matters.
    pub(crate) fn sink_only(sink: LogSink, step: &str) -> Self {
        Self {
            tx: None,
            sink,
            step: step.to_string(),
        }
    }

    /// Clone this sender scoped to a different step name.
    pub(crate) fn for_step(&self, step: &str) -> Self {
        Self {
            tx: self.tx.clone(),
            sink: self.sink.clone(),
            step: step.to_string(),
        }
    }

    /// Append a line to the log and emit a log-only event.
    pub(crate) fn log(&self, message: impl Into<String>) {
        let message = message.into();
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        self.send(ProgressEvent {
            step: self.step.clone(),
            message,
            fraction: None,
            error: None,
        });
    }

    /// Emit a progress event at the given fraction.
    pub(crate) fn progress(&self, step: &str, message: impl Into<String>, fraction: f64) {
        self.send(ProgressEvent {
            step: step.to_string(),
            message: message.into(),
            fraction: Some(fraction),
            error: None,
        });
    }

    /// Emit the terminal failure event for a phase.
    pub(crate) fn fail(&self, step: &str, fraction: f64, error: &dyn std::fmt::Display) {
        let text = error.to_string();
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{step} failed: {text}"));

        self.send(ProgressEvent {
            step: step.to_string(),
            message: format!("{step} failed: {text}"),
            fraction: Some(fraction),
            error: Some(text),
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // Full channel or dropped receiver: the pipeline never waits on
            // the UI, it only loses the live copy of the line.
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event) {
                tracing::debug!("progress channel full, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> LogSink {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_log_appends_to_sink_and_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sink = sink();
        let events = EventSender::new(tx, sink.clone(), "detect");

        events.log("checking PATH");

        assert_eq!(sink.lock().unwrap().as_slice(), ["checking PATH"]);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.step, "detect");
        assert!(event.is_log_only());
    }

    #[tokio::test]
    async fn test_full_channel_drops_events_but_keeps_log() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = sink();
        let events = EventSender::new(tx, sink.clone(), "install");

        for n in 0..10 {
            events.log(format!("line {n}"));
        }

        // Never blocked, and the durable log has every line.
        assert_eq!(sink.lock().unwrap().len(), 10);
    }

    #[test]
    fn test_sink_only_sender_records() {
        let sink = sink();
        let events = EventSender::sink_only(sink.clone(), "restore");
        events.log("removed config");
        assert_eq!(sink.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_carries_error_text() {
        let (tx, mut rx) = mpsc::channel(8);
        let events = EventSender::new(tx, sink(), "pipeline");

        events.fail("install Git", 0.45, &"exit code 1");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.step, "install Git");
        assert_eq!(event.fraction, Some(0.45));
        assert_eq!(event.error.as_deref(), Some("exit code 1"));
    }

    #[tokio::test]
    async fn test_for_step_rescopes_log_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let events = EventSender::new(tx, sink(), "pipeline");

        events.for_step("verify").log("all good");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.step, "verify");
    }
}
