//! Server-Sent Events (SSE) utilities
//!
//! Streams [`StoreEvent`]s from the [`EventBus`] to browsers. Each connection
//! owns its own bus subscription, which is dropped with the stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::events::{EventBus, StoreEvent};

/// Heartbeat / keep-alive interval
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// SSE stream of bus events accepted by `filter`
///
/// Starts with a `ConnectionStatus: connected` event, then forwards matching
/// events (SSE event name = [`StoreEvent::event_type`], data = JSON) with a
/// comment heartbeat while idle. A lagged subscription skips ahead; a closed
/// bus ends the stream.
pub fn store_event_stream<F>(
    bus: &EventBus,
    label: &'static str,
    filter: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&StoreEvent) -> bool + Send + 'static,
{
    info!("New SSE client connected to {} events", label);

    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if !filter(&event) {
                                continue;
                            }
                            let event_type = event.event_type();
                            match serde_json::to_string(&event) {
                                Ok(event_json) => {
                                    debug!("SSE: Broadcasting {} event: {}", label, event_type);
                                    yield Ok(Event::default()
                                        .event(event_type)
                                        .data(event_json));
                                }
                                Err(e) => {
                                    warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                                }
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: {} subscriber lagged, skipped {} events", label, skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("SSE: {} event bus closed", label);
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
