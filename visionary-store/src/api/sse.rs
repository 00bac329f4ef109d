//! Server-Sent Events endpoints
//!
//! Every connection owns one bus subscription; closing the stream
//! unsubscribes.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use visionary_common::sse::store_event_stream;

use crate::api::chat::parse_visitor;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/events
///
/// Catalog, settings and reorder events for storefront pages.
pub async fn storefront_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    store_event_stream(&state.bus, "storefront", |event| event.is_storefront())
}

/// GET /api/chat/:visitor_id/events
///
/// Changes to this visitor's session only.
pub async fn chat_events(
    State(state): State<AppState>,
    Path(visitor_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let visitor = parse_visitor(&visitor_id)?;
    let session_id = visitor.as_str().to_string();
    Ok(store_event_stream(&state.bus, "chat", move |event| {
        event.is_chat_for(&session_id)
    }))
}

/// GET /api/admin/events
///
/// Everything, for the back-office and chat console.
pub async fn admin_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    store_event_stream(&state.bus, "admin", |_| true)
}
