//! SSE event broadcaster for real-time event streaming.
//!
//! The broadcaster implements the core event emitter port, so the
//! configuration service can emit events that are streamed to connected
//! web clients.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use mcphub_core::{AppEvent, AppEventEmitter};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// SSE broadcaster that implements the event emitter port.
///
/// Slow clients miss events once the buffer overflows; the stream skips
/// the gap and continues.
#[derive(Debug, Clone)]
pub struct SseBroadcaster {
    sender: broadcast::Sender<AppEvent>,
}

impl SseBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Create an SSE stream for a new client connection.
    ///
    /// Includes a keep-alive ping every 30 seconds.
    pub fn subscribe(
        self: Arc<Self>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(|result| {
            match result {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => Some(Ok(Event::default().data(json))),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to serialize event");
                        None
                    }
                },
                Err(e) => {
                    tracing::debug!(error = %e, "SSE stream lagged");
                    None
                }
            }
        });

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl AppEventEmitter for SseBroadcaster {
    fn emit(&self, event: AppEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let broadcaster = SseBroadcaster::with_defaults();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.emit(AppEvent::config_saved(0));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let broadcaster = SseBroadcaster::with_defaults();
        let mut receiver = broadcaster.sender.subscribe();

        broadcaster.emit(AppEvent::mcp_server_started("fs", "Files"));

        match receiver.recv().await.unwrap() {
            AppEvent::McpServerStarted {
                server_id,
                server_name,
            } => {
                assert_eq!(server_id, "fs");
                assert_eq!(server_name, "Files");
            }
            other => panic!("Unexpected event: {other:?}"),
        }
    }
}
