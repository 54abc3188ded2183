//! HTTP server for the canteen API.
//!
//! Builds the router over a shared [`OrderEngine`] and serves it until the
//! process receives Ctrl+C.

use crate::apis::{cart, orders, venues};
use axum::{
	extract::DefaultBodyLimit,
	http::{HeaderName, HeaderValue, Method},
	routing::{get, patch, post},
	Router,
};
use canteen_config::{ApiConfig, CorsConfig};
use canteen_core::OrderEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine processing every request.
	pub engine: Arc<OrderEngine>,
}

/// Builds the API router with its middleware.
pub fn router(api_config: &ApiConfig, engine: Arc<OrderEngine>) -> Router {
	let api = Router::new()
		.route("/cart", get(cart::get_cart).put(cart::upsert_cart))
		.route("/cart/{id}/clear", post(cart::clear_cart))
		.route("/cart/{id}/checkout", post(cart::checkout))
		.route("/orders", post(orders::create_direct_order))
		.route("/orders/active", get(orders::list_active))
		.route("/orders/active/stream", get(orders::stream_active))
		.route("/orders/history", get(orders::list_history))
		.route("/orders/{id}", get(orders::get_order))
		.route("/orders/{id}/status", patch(orders::set_status))
		.route("/venues/{venue}/queue", get(venues::queue))
		.route("/venues/{venue}/queue/stream", get(venues::queue_stream));

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(TimeoutLayer::new(Duration::from_secs(api_config.timeout_seconds)))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// CORS policy from configuration. Without a `[api.cors]` table any origin is allowed.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let mut layer = CorsLayer::new();
	if cors.allowed_origins.iter().any(|o| o == "*") {
		layer = layer.allow_origin(Any);
	} else {
		let origins: Vec<HeaderValue> = cors
			.allowed_origins
			.iter()
			.filter_map(|o| match HeaderValue::from_str(o) {
				Ok(value) => Some(value),
				Err(_) => {
					tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
					None
				},
			})
			.collect();
		layer = layer.allow_origin(origins);
	}

	let headers: Vec<HeaderName> = cors
		.allowed_headers
		.iter()
		.filter_map(|h| h.parse().ok())
		.collect();
	let methods: Vec<Method> = cors
		.allowed_methods
		.iter()
		.filter_map(|m| m.parse().ok())
		.collect();
	layer.allow_headers(headers).allow_methods(methods)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<OrderEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Canteen API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
		})
		.await?;

	Ok(())
}
