//! Request handlers of the canteen API.
//!
//! Handlers are grouped by the resource they act on. Engine errors are
//! translated into [`APIError`] here so every endpoint answers with the same
//! error body.

pub mod cart;
pub mod orders;
pub mod venues;

use axum::{extract::FromRequestParts, http::request::Parts};
use canteen_core::{EngineError, OrderStateMachine};
use canteen_types::{APIError, OrderResponse, OwnerId, Venue};
use std::convert::Infallible;

/// Header carrying the signed-in user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the caller, taken from [`USER_ID_HEADER`].
///
/// Authentication happens upstream. A missing or blank header means an
/// anonymous caller, which owner-scoped operations reject.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<OwnerId>);

impl Caller {
	pub fn owner(&self) -> Option<&OwnerId> {
		self.0.as_ref()
	}
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
	type Rejection = Infallible;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let owner = parts
			.headers
			.get(USER_ID_HEADER)
			.and_then(|value| value.to_str().ok())
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.map(OwnerId::new);
		Ok(Caller(owner))
	}
}

/// Maps an engine error onto its HTTP error.
pub fn api_error(err: EngineError) -> APIError {
	let message = err.to_string();
	match err {
		EngineError::NotAuthenticated => APIError::Unauthorized {
			error_type: "NOT_AUTHENTICATED".into(),
			message,
		},
		EngineError::NotFound(_) => APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".into(),
			message,
		},
		EngineError::InvalidTransition { from, to } => APIError::Conflict {
			error_type: "INVALID_TRANSITION".into(),
			message,
			details: Some(serde_json::json!({
				"from": from,
				"to": to,
				"allowed": OrderStateMachine::next_statuses(from),
			})),
		},
		EngineError::NotACart { id, status } => APIError::Conflict {
			error_type: "NOT_A_CART".into(),
			message,
			details: Some(serde_json::json!({ "id": id, "status": status })),
		},
		EngineError::EmptyCartCheckout => APIError::UnprocessableEntity {
			error_type: "EMPTY_CART".into(),
			message,
			details: None,
		},
		EngineError::MixedVenueCheckout { venues } => APIError::UnprocessableEntity {
			error_type: "MIXED_VENUE_CART".into(),
			message,
			details: Some(serde_json::json!({ "venues": venues })),
		},
		EngineError::InvalidItems(_) => APIError::UnprocessableEntity {
			error_type: "INVALID_ITEMS".into(),
			message,
			details: None,
		},
		EngineError::StoreFailure(_) => {
			tracing::error!(error = %message, "Order store failure");
			APIError::InternalServerError {
				error_type: "STORE_FAILURE".into(),
				message,
			}
		},
	}
}

/// Parses a venue path segment.
pub fn parse_venue(raw: &str) -> Result<Venue, APIError> {
	raw.parse().map_err(|_| APIError::BadRequest {
		error_type: "UNKNOWN_VENUE".into(),
		message: format!("Unknown venue '{}'", raw),
		details: Some(serde_json::json!({ "venues": Venue::ALL })),
	})
}

pub fn order_list(orders: Vec<canteen_types::Order>) -> Vec<OrderResponse> {
	orders.into_iter().map(OrderResponse::from).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use canteen_types::OrderStatus;

	#[test]
	fn test_engine_error_status_codes() {
		let cases = [
			(EngineError::NotAuthenticated, 401),
			(EngineError::NotFound("x".into()), 404),
			(
				EngineError::InvalidTransition {
					from: OrderStatus::Completed,
					to: OrderStatus::Ready,
				},
				409,
			),
			(
				EngineError::NotACart {
					id: "x".into(),
					status: OrderStatus::Pending,
				},
				409,
			),
			(EngineError::EmptyCartCheckout, 422),
			(
				EngineError::MixedVenueCheckout {
					venues: Venue::ALL.to_vec(),
				},
				422,
			),
			(EngineError::InvalidItems(canteen_types::TotalOverflow), 422),
			(EngineError::StoreFailure("disk".into()), 500),
		];
		for (err, status) in cases {
			assert_eq!(api_error(err).status_code(), status);
		}
	}

	#[test]
	fn test_mixed_venue_details_list_venues() {
		let err = api_error(EngineError::MixedVenueCheckout {
			venues: Venue::ALL.to_vec(),
		});
		let body = err.to_error_response();
		assert_eq!(body.error, "MIXED_VENUE_CART");
		assert!(body.message.contains("one location at a time"));
		assert_eq!(
			body.details.unwrap()["venues"],
			serde_json::json!(["medical", "bitbites"])
		);
	}

	#[test]
	fn test_invalid_transition_lists_allowed_moves() {
		let body = api_error(EngineError::InvalidTransition {
			from: OrderStatus::Pending,
			to: OrderStatus::Completed,
		})
		.to_error_response();
		assert_eq!(
			body.details.unwrap(),
			serde_json::json!({
				"from": "pending",
				"to": "completed",
				"allowed": ["preparing", "cancelled"],
			})
		);

		let body = api_error(EngineError::InvalidTransition {
			from: OrderStatus::Completed,
			to: OrderStatus::Ready,
		})
		.to_error_response();
		assert_eq!(body.details.unwrap()["allowed"], serde_json::json!([]));
	}

	#[test]
	fn test_parse_venue() {
		assert_eq!(parse_venue("bitbites").unwrap(), Venue::Bitbites);
		assert_eq!(parse_venue("nowhere").unwrap_err().status_code(), 400);
	}
}
