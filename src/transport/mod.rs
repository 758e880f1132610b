//! Delivery of normalized events
//!
//! Both surfaces consume the same [`EventStream`] through an [`EventSink`]:
//! - `terminal` - interactive line loop and one-shot questions
//! - `http` - one server-sent event stream per request
//!
//! `frames` holds the `data:` frame encoding shared by the HTTP surface and
//! its clients.

pub mod frames;
pub mod http;
pub mod terminal;

use async_trait::async_trait;
use futures::StreamExt;

use crate::agent::EventStream;
use crate::core::AgentEvent;

/// Whether a sink wants more events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFlow {
    Continue,
    /// The consumer is gone; stop reading the turn
    Stop,
}

/// A consumer of one turn's events
#[async_trait]
pub trait EventSink: Send {
    /// Deliver one event, in order
    async fn on_event(&mut self, event: &AgentEvent) -> SinkFlow;

    /// Called once after the last event
    async fn on_close(&mut self);

    /// Resolves when the consumer has gone away. Sinks that cannot tell
    /// never resolve.
    async fn closed(&mut self) {
        futures::future::pending::<()>().await
    }
}

/// What happened while pumping a turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PumpOutcome {
    pub delivered: usize,
    /// The `Done` or `Error` event that ended the turn
    pub terminal: Option<AgentEvent>,
    /// The sink asked to stop before the turn ended
    pub disconnected: bool,
}

impl PumpOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.terminal, Some(AgentEvent::Done { .. }))
    }
}

/// Forward `events` to `sink` until the terminal event or until the sink
/// stops. The stream is dropped on return, which stops the backend.
///
/// Waiting for the next event races the sink's `closed`, so a consumer that
/// leaves while the backend is busy (a slow tool, a long model call) stops
/// the turn right away rather than at the next event.
pub async fn pump(mut events: EventStream, sink: &mut dyn EventSink) -> PumpOutcome {
    let mut outcome = PumpOutcome::default();

    loop {
        let event = tokio::select! {
            next = events.next() => match next {
                Some(event) => event,
                None => break,
            },
            () = sink.closed() => {
                tracing::info!("[Pump] Consumer left after {} events", outcome.delivered);
                outcome.disconnected = true;
                break;
            }
        };

        let flow = sink.on_event(&event).await;
        outcome.delivered += 1;

        if event.is_terminal() {
            outcome.terminal = Some(event);
            break;
        }
        if flow == SinkFlow::Stop {
            tracing::info!("[Pump] Sink stopped after {} events", outcome.delivered);
            outcome.disconnected = true;
            break;
        }
    }

    sink.on_close().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Collecting {
        events: Vec<AgentEvent>,
        stop_after: Option<usize>,
        closed: bool,
    }

    #[async_trait]
    impl EventSink for Collecting {
        async fn on_event(&mut self, event: &AgentEvent) -> SinkFlow {
            self.events.push(event.clone());
            match self.stop_after {
                Some(n) if self.events.len() >= n => SinkFlow::Stop,
                _ => SinkFlow::Continue,
            }
        }

        async fn on_close(&mut self) {
            self.closed = true;
        }
    }

    /// Consumer already gone; never receives anything
    struct Departed {
        received: usize,
    }

    #[async_trait]
    impl EventSink for Departed {
        async fn on_event(&mut self, _event: &AgentEvent) -> SinkFlow {
            self.received += 1;
            SinkFlow::Continue
        }

        async fn on_close(&mut self) {}

        async fn closed(&mut self) {}
    }

    fn events(items: Vec<AgentEvent>) -> EventStream {
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn test_pump_stops_at_terminal() {
        let mut sink = Collecting {
            events: vec![],
            stop_after: None,
            closed: false,
        };
        let outcome = pump(
            events(vec![
                AgentEvent::text("a"),
                AgentEvent::done("s"),
                AgentEvent::text("never"),
            ]),
            &mut sink,
        )
        .await;

        assert_eq!(sink.events, vec![AgentEvent::text("a"), AgentEvent::done("s")]);
        assert!(sink.closed);
        assert!(outcome.succeeded());
        assert_eq!(outcome.delivered, 2);
    }

    #[tokio::test]
    async fn test_pump_stops_when_sink_gone() {
        let mut sink = Collecting {
            events: vec![],
            stop_after: Some(1),
            closed: false,
        };
        let outcome = pump(
            events(vec![
                AgentEvent::tool_start("vault_list", json!({})),
                AgentEvent::text("b"),
                AgentEvent::done("s"),
            ]),
            &mut sink,
        )
        .await;

        assert_eq!(sink.events.len(), 1);
        assert!(outcome.disconnected);
        assert_eq!(outcome.terminal, None);
        assert!(sink.closed);
    }

    #[tokio::test]
    async fn test_pump_returns_when_consumer_leaves_an_idle_turn() {
        let dropped = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        struct Flag(std::sync::Arc<std::sync::atomic::AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let flag = Flag(dropped.clone());
        let stalled: EventStream = Box::pin(async_stream::stream! {
            let _flag = flag;
            futures::future::pending::<()>().await;
            yield AgentEvent::text("never");
        });

        let mut sink = Departed { received: 0 };
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), pump(stalled, &mut sink))
            .await
            .unwrap();

        assert!(outcome.disconnected);
        assert_eq!(sink.received, 0);
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }
}
