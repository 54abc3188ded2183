//! Cart endpoints.
//!
//! All cart operations act on the caller's own cart and require the user id
//! header.

use super::{api_error, Caller};
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	response::Json,
};
use canteen_types::{APIError, CheckoutRequest, OrderResponse, UpsertCartRequest};

/// GET /api/cart
///
/// Answers `null` when the caller has no cart.
pub async fn get_cart(
	State(state): State<AppState>,
	caller: Caller,
) -> Result<Json<Option<OrderResponse>>, APIError> {
	let cart = state
		.engine
		.get_cart(caller.owner())
		.await
		.map_err(api_error)?;
	Ok(Json(cart.map(OrderResponse::from)))
}

/// PUT /api/cart
pub async fn upsert_cart(
	State(state): State<AppState>,
	caller: Caller,
	Json(request): Json<UpsertCartRequest>,
) -> Result<Json<OrderResponse>, APIError> {
	let cart = state
		.engine
		.upsert_cart(caller.owner(), request.items, request.client_name)
		.await
		.map_err(api_error)?;
	Ok(Json(cart.into()))
}

/// POST /api/cart/{id}/clear
pub async fn clear_cart(
	State(state): State<AppState>,
	caller: Caller,
	Path(id): Path<String>,
) -> Result<Json<OrderResponse>, APIError> {
	let cart = state
		.engine
		.clear_cart(caller.owner(), &id)
		.await
		.map_err(api_error)?;
	Ok(Json(cart.into()))
}

/// POST /api/cart/{id}/checkout
///
/// The body is optional. Without a venue the cart's items decide it.
pub async fn checkout(
	State(state): State<AppState>,
	caller: Caller,
	Path(id): Path<String>,
	request: Option<Json<CheckoutRequest>>,
) -> Result<Json<OrderResponse>, APIError> {
	let Json(request) = request.unwrap_or_default();
	match state
		.engine
		.checkout(caller.owner(), &id, request.venue, request.client_name)
		.await
	{
		Ok(order) => Ok(Json(order.into())),
		Err(e) => {
			tracing::warn!(order_id = %id, error = %e, "Checkout rejected");
			Err(api_error(e))
		},
	}
}
