//! API types for the canteen HTTP API.
//!
//! Request bodies, the order response shape and the structured error type
//! returned by every endpoint.

use crate::order::{LineItem, Order, OrderStatus, Venue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `PUT /cart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCartRequest {
	pub items: Vec<LineItem>,
	#[serde(default)]
	pub client_name: Option<String>,
}

/// Body of `POST /cart/{id}/checkout`.
///
/// When `venue` is omitted it is resolved from the cart's line items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
	#[serde(default)]
	pub venue: Option<Venue>,
	#[serde(default)]
	pub client_name: Option<String>,
}

/// Body of `POST /orders`, used by staff to enter walk-in orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectOrderRequest {
	pub items: Vec<LineItem>,
	pub venue: Venue,
	#[serde(default)]
	pub client_name: Option<String>,
	#[serde(default)]
	pub client_phone: Option<String>,
	#[serde(default)]
	pub table_number: Option<String>,
}

/// Body of `PATCH /orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
	pub status: OrderStatus,
}

/// Order as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
	pub id: String,
	pub token: Option<String>,
	pub display_id: Option<String>,
	pub owner_id: Option<String>,
	pub venue: Venue,
	pub venue_name: String,
	pub items: Vec<LineItem>,
	pub total: Decimal,
	pub status: OrderStatus,
	pub client_name: String,
	pub client_phone: Option<String>,
	pub table_number: Option<String>,
	pub created_at: u64,
	pub updated_at: u64,
}

impl From<&Order> for OrderResponse {
	fn from(order: &Order) -> Self {
		Self {
			id: order.id.clone(),
			token: order.token.clone(),
			display_id: order.display_id.clone(),
			owner_id: order.owner.as_ref().map(|o| o.as_str().to_string()),
			venue: order.venue,
			venue_name: order.venue.display_name().to_string(),
			items: order.items().to_vec(),
			total: order.total(),
			status: order.status,
			client_name: order.client_name.clone(),
			client_phone: order.client_phone.clone(),
			table_number: order.table_number.clone(),
			created_at: order.created_at,
			updated_at: order.updated_at,
		}
	}
}

impl From<Order> for OrderResponse {
	fn from(order: Order) -> Self {
		Self::from(&order)
	}
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Caller identity missing (401)
	Unauthorized { error_type: String, message: String },
	/// Referenced record does not exist (404)
	NotFound { error_type: String, message: String },
	/// Request conflicts with the record's current state (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Business rule rejected the request (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthorized { .. } => 401,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => (error_type, message, details.clone()),
			APIError::Unauthorized {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message, None),
		};
		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Unauthorized { message, .. } => write!(f, "Unauthorized: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
