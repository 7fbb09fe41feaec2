use crate::config::types::OutputFormat;
use crate::rule::RenderedEvent;
use std::io::Write;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Where rendered events go. Delivery is fire-and-forget: a sink reports its
/// own failures and never blocks the pipeline on a consumer.
pub trait EventSink {
    fn deliver(&mut self, event: RenderedEvent);
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn deliver(&mut self, event: RenderedEvent) {
        (**self).deliver(event)
    }
}

/// Collects events in memory.
impl EventSink for Vec<RenderedEvent> {
    fn deliver(&mut self, event: RenderedEvent) {
        self.push(event);
    }
}

/// Reports each event through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver(&mut self, event: RenderedEvent) {
        info!(
            rule = %event.rule,
            event_type = %event.event_type,
            channel = %event.channel,
            source = ?event.source,
            payload = %event.payload,
            "Rendered event"
        );
    }
}

/// Writes one JSON object per event, newline-delimited.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn deliver(&mut self, event: RenderedEvent) {
        let result = serde_json::to_writer(&mut self.writer, &event)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());

        if let Err(e) = result {
            error!(event_id = %event.id, rule = %event.rule, error = %e, "Failed to write event");
        }
    }
}

/// Forwards events to an async consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RenderedEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<RenderedEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn deliver(&mut self, event: RenderedEvent) {
        if let Err(e) = self.tx.send(event) {
            error!(event_id = %e.0.id, "Event consumer dropped, discarding event");
        }
    }
}

/// The sink selected by the `output.format` setting.
pub fn sink_for(format: OutputFormat) -> Box<dyn EventSink + Send> {
    match format {
        OutputFormat::Log => Box::new(LogSink),
        OutputFormat::Json => Box::new(JsonLinesSink::stdout()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn make_event(payload: &str) -> RenderedEvent {
        RenderedEvent {
            id: Uuid::new_v4(),
            rule: "login".to_string(),
            event_type: "user_login".to_string(),
            channel: "auth".to_string(),
            payload: payload.to_string(),
            source: Some(PathBuf::from("/tmp/app.log")),
            rendered_at: Utc::now(),
        }
    }

    #[test]
    fn test_json_lines_sink() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.deliver(make_event("alice logged in"));
        sink.deliver(make_event("bob logged in"));

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["payload"], "alice logged in");
        assert_eq!(first["event_type"], "user_login");
        assert_eq!(first["channel"], "auth");
        assert_eq!(first["source"], "/tmp/app.log");
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);
        sink.deliver(make_event("alice logged in"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload, "alice logged in");
    }

    #[test]
    fn test_channel_sink_tolerates_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        sink.deliver(make_event("lost"));
    }
}
