//! Order endpoints: direct creation, the caller's active orders and history,
//! lookup by id and staff status changes.

use super::{api_error, order_list, Caller};
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{
		sse::{Event, KeepAlive, Sse},
		Json,
	},
};
use canteen_core::DirectOrder;
use canteen_types::{APIError, CreateDirectOrderRequest, OrderResponse, SetStatusRequest};
use futures::{Stream, StreamExt};

/// POST /api/orders
///
/// Staff-entered order, inserted directly at `pending`. The caller id, when
/// present, is recorded as the owner.
pub async fn create_direct_order(
	State(state): State<AppState>,
	caller: Caller,
	Json(request): Json<CreateDirectOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), APIError> {
	let order = state
		.engine
		.create_direct_order(DirectOrder {
			owner: caller.0,
			items: request.items,
			venue: request.venue,
			client_name: request.client_name.unwrap_or_default(),
			client_phone: request.client_phone,
			table_number: request.table_number,
		})
		.await
		.map_err(api_error)?;
	Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/orders/active
pub async fn list_active(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, APIError> {
	let orders = state
		.engine
		.list_active_orders(caller.owner())
		.await
		.map_err(api_error)?;
	Ok(Json(order_list(orders)))
}

/// GET /api/orders/active/stream
///
/// Server-sent events carrying the caller's active orders: the current list
/// first, then a new list whenever a poll sees a difference.
pub async fn stream_active(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, APIError> {
	let poll = state
		.engine
		.poll_active_orders(caller.owner())
		.await
		.map_err(api_error)?;

	let events = futures::stream::unfold((poll, true), |(mut poll, first)| async move {
		if !first && !poll.changed().await {
			return None;
		}
		let orders = poll.current();
		Some((orders, (poll, false)))
	})
	.map(|orders| Event::default().event("orders").json_data(order_list(orders)));

	Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /api/orders/history
pub async fn list_history(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, APIError> {
	let orders = state
		.engine
		.list_order_history(caller.owner())
		.await
		.map_err(api_error)?;
	Ok(Json(order_list(orders)))
}

/// GET /api/orders/{id}
pub async fn get_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<OrderResponse>, APIError> {
	let order = state.engine.get_order(&id).await.map_err(api_error)?;
	Ok(Json(order.into()))
}

/// PATCH /api/orders/{id}/status
pub async fn set_status(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(request): Json<SetStatusRequest>,
) -> Result<Json<OrderResponse>, APIError> {
	match state.engine.set_order_status(&id, request.status).await {
		Ok(order) => Ok(Json(order.into())),
		Err(e) => {
			tracing::warn!(order_id = %id, status = %request.status, error = %e, "Status change rejected");
			Err(api_error(e))
		},
	}
}
