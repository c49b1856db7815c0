//! Trace sinks
//!
//! `LogTraceSink` writes each finished turn span to the `intake::trace` log
//! target. `MemoryTraceSink` keeps spans in memory for tests and the
//! headless simulator.

use async_trait::async_trait;
use parking_lot::Mutex;

use intake_core::{Error, Result, TraceSink, TraceSpan};

/// Emits spans as structured log events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTraceSink;

#[async_trait]
impl TraceSink for LogTraceSink {
    async fn emit(&self, span: TraceSpan) -> Result<()> {
        let body = serde_json::to_string(&span)
            .map_err(|e| Error::ObservabilityFailure(e.to_string()))?;
        tracing::info!(
            target: "intake::trace",
            call_id = %span.call_id,
            turn = span.turn_id,
            name = %span.name,
            outcome = %span.outcome,
            duration_ms = span.duration_ms(),
            span = %body,
            "turn span"
        );
        Ok(())
    }

    async fn score(&self, call_id: &str, name: &str, value: f64) -> Result<()> {
        tracing::info!(target: "intake::trace", call_id = %call_id, score = name, value, "session score");
        Ok(())
    }
}

/// Collects spans and scores
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    spans: Mutex<Vec<TraceSpan>>,
    scores: Mutex<Vec<(String, String, f64)>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> Vec<TraceSpan> {
        self.spans.lock().clone()
    }

    pub fn scores(&self) -> Vec<(String, String, f64)> {
        self.scores.lock().clone()
    }
}

#[async_trait]
impl TraceSink for MemoryTraceSink {
    async fn emit(&self, span: TraceSpan) -> Result<()> {
        self.spans.lock().push(span);
        Ok(())
    }

    async fn score(&self, call_id: &str, name: &str, value: f64) -> Result<()> {
        self.scores
            .lock()
            .push((call_id.to_string(), name.to_string(), value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_keeps_spans() {
        let sink = MemoryTraceSink::new();
        let span = TraceSpan::start("call-1", 1, "conversation-turn").finish("advanced");
        sink.emit(span).await.unwrap();
        sink.score("call-1", "session_completed", 1.0).await.unwrap();

        assert_eq!(sink.spans().len(), 1);
        assert_eq!(sink.spans()[0].outcome, "advanced");
        assert_eq!(sink.scores()[0].2, 1.0);
    }

    #[tokio::test]
    async fn test_log_sink_never_fails_on_plain_span() {
        let span = TraceSpan::start("call-1", 2, "conversation-turn")
            .with_attribute("stage", "status")
            .finish("reprompt");
        assert!(LogTraceSink.emit(span).await.is_ok());
    }
}
