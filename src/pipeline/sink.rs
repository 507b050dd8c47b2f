//! Progress sinks.
//!
//! A sink receives typed progress events during a run. It is purely for
//! observability and never affects control flow. [`TracingSink`] is the
//! default; [`ChannelSink`] forwards events to an async receiver, e.g. a
//! websocket writer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Stage progress.
    Logs,
    /// A piece of report text.
    Report,
    /// Location of a written output file.
    Path,
}

/// One progress message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Event category.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Payload.
    pub output: String,
}

/// Receives progress events.
pub trait ProgressSink: Send + Sync {
    /// Delivers one event. Must not block.
    fn emit(&self, event: ProgressEvent);

    /// Emits a `logs` event.
    fn log(&self, output: &str) {
        self.emit(ProgressEvent {
            kind: EventKind::Logs,
            output: output.to_string(),
        });
    }

    /// Emits a `report` event.
    fn report(&self, output: &str) {
        self.emit(ProgressEvent {
            kind: EventKind::Report,
            output: output.to_string(),
        });
    }

    /// Emits a `path` event.
    fn path(&self, output: &str) {
        self.emit(ProgressEvent {
            kind: EventKind::Path,
            output: output.to_string(),
        });
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event.kind {
            EventKind::Logs => tracing::info!(target: "research_rs::progress", "{}", event.output),
            EventKind::Report => tracing::debug!(target: "research_rs::progress", chars = event.output.len(), "report text"),
            EventKind::Path => tracing::info!(target: "research_rs::progress", path = %event.output, "output written"),
        }
    }
}

/// Forwards events to an unbounded channel. Events are dropped once the
/// receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("progress receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ProgressEvent {
            kind: EventKind::Logs,
            output: "retrieving".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert_eq!(json, r#"{"type":"logs","output":"retrieving"}"#);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.log("one");
        sink.report("two");
        sink.path("/tmp/report.md");
        assert_eq!(rx.recv().await.map(|e| e.kind), Some(EventKind::Logs));
        assert_eq!(rx.recv().await.map(|e| e.output), Some("two".to_string()));
        assert_eq!(rx.recv().await.map(|e| e.kind), Some(EventKind::Path));
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.log("nobody listening");
    }
}
