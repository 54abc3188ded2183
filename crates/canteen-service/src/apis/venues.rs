//! Venue queue endpoints used by staff displays.

use super::{api_error, order_list, parse_venue};
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	response::{
		sse::{Event, KeepAlive, Sse},
		Json,
	},
};
use canteen_types::{APIError, OrderResponse};
use futures::{Stream, StreamExt};

/// GET /api/venues/{venue}/queue
pub async fn queue(
	State(state): State<AppState>,
	Path(venue): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, APIError> {
	let venue = parse_venue(&venue)?;
	let orders = state
		.engine
		.list_venue_queue(venue)
		.await
		.map_err(api_error)?;
	Ok(Json(order_list(orders)))
}

/// GET /api/venues/{venue}/queue/stream
///
/// Server-sent `queue` events, each carrying the full queue of the venue. The
/// first event is sent right away, later ones after every change at the venue.
pub async fn queue_stream(
	State(state): State<AppState>,
	Path(venue): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, APIError> {
	let venue = parse_venue(&venue)?;
	let feed = state
		.engine
		.watch_venue_queue(venue)
		.await
		.map_err(api_error)?;
	tracing::debug!(venue = %venue, "Venue queue stream opened");

	let events = feed
		.into_stream()
		.map(|orders| Event::default().event("queue").json_data(order_list(orders)));
	Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
