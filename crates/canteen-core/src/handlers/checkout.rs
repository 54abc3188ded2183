//! Checkout coordinator.
//!
//! Turns a cart into a pending order in one atomic write, and inserts
//! staff-entered orders directly at `pending`.

use crate::engine::EngineError;
use crate::identifiers::IdentifierGenerator;
use canteen_storage::{RecordStore, StorageError, TryUpdateError};
use canteen_types::{now_millis, truncate_id, LineItem, Order, OrderStatus, OwnerId, Venue};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

/// A walk-in order entered by staff.
#[derive(Debug, Clone)]
pub struct DirectOrder {
	/// Signed-in user placing the order, if any.
	pub owner: Option<OwnerId>,
	pub items: Vec<LineItem>,
	pub venue: Venue,
	pub client_name: String,
	pub client_phone: Option<String>,
	pub table_number: Option<String>,
}

/// Derives the checkout venue from the venues of a cart's line items.
///
/// An empty cart and a cart mixing venues cannot be checked out.
pub fn resolve_checkout_venue(items: &[LineItem]) -> Result<Venue, EngineError> {
	let venues: BTreeSet<Venue> = items.iter().map(|item| item.venue).collect();
	let mut iter = venues.iter();
	match (iter.next(), iter.next()) {
		(None, _) => Err(EngineError::EmptyCartCheckout),
		(Some(venue), None) => Ok(*venue),
		(Some(_), Some(_)) => Err(EngineError::MixedVenueCheckout {
			venues: venues.into_iter().collect(),
		}),
	}
}

/// Converts carts into placed orders.
pub struct CheckoutCoordinator {
	store: Arc<RecordStore<Order>>,
	identifiers: Arc<IdentifierGenerator>,
}

impl CheckoutCoordinator {
	pub fn new(store: Arc<RecordStore<Order>>, identifiers: Arc<IdentifierGenerator>) -> Self {
		Self { store, identifiers }
	}

	/// Places the cart at `venue`.
	///
	/// Sets the status to `pending`, draws a token, assigns a display id, fixes
	/// the venue, stores the client name and resets `created_at` to now, all in
	/// a single write. Item contents are the caller's responsibility. A record
	/// that is no longer a cart is rejected with `InvalidTransition` and keeps
	/// its token.
	#[instrument(skip_all, fields(order_id = %truncate_id(cart_id), venue = %venue))]
	pub async fn checkout(
		&self,
		cart_id: &str,
		venue: Venue,
		client_name: String,
	) -> Result<Order, EngineError> {
		let current = self
			.store
			.get(cart_id)
			.await
			.map_err(|e| EngineError::StoreFailure(e.to_string()))?
			.ok_or_else(|| EngineError::NotFound(cart_id.to_string()))?;
		if !current.is_cart() {
			return Err(EngineError::InvalidTransition {
				from: current.status,
				to: OrderStatus::Pending,
			});
		}

		let token = self.identifiers.generate_token(venue);
		let display_id = self.identifiers.generate_sequential_id(venue).await?;

		let order = self
			.store
			.try_update(cart_id, |order| {
				if !order.is_cart() {
					return Err(EngineError::InvalidTransition {
						from: order.status,
						to: OrderStatus::Pending,
					});
				}
				let now = now_millis();
				order.status = OrderStatus::Pending;
				order.token = Some(token);
				order.display_id = Some(display_id);
				order.venue = venue;
				order.client_name = client_name;
				order.created_at = now;
				order.updated_at = now;
				Ok(())
			})
			.await
			.map_err(|e| match e {
				TryUpdateError::Rejected(e) => e,
				TryUpdateError::Storage(StorageError::NotFound) => {
					EngineError::NotFound(cart_id.to_string())
				},
				TryUpdateError::Storage(e) => EngineError::StoreFailure(e.to_string()),
			})?;

		tracing::info!(
			token = order.token.as_deref().unwrap_or_default(),
			display_id = order.display_id.as_deref().unwrap_or_default(),
			total = %order.total(),
			"Cart checked out"
		);
		Ok(order)
	}

	/// Inserts an order directly at `pending`, bypassing the cart.
	#[instrument(skip_all, fields(venue = %request.venue))]
	pub async fn create_direct_order(&self, request: DirectOrder) -> Result<Order, EngineError> {
		let DirectOrder {
			owner,
			items,
			venue,
			client_name,
			client_phone,
			table_number,
		} = request;

		let token = self.identifiers.generate_token(venue);
		let mut order = Order::new_pending(owner, venue, items, client_name, token, now_millis())?;
		order.display_id = Some(self.identifiers.generate_sequential_id(venue).await?);
		order.client_phone = client_phone;
		order.table_number = table_number;

		let order = self
			.store
			.insert(order)
			.await
			.map_err(|e| EngineError::StoreFailure(e.to_string()))?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			token = order.token.as_deref().unwrap_or_default(),
			total = %order.total(),
			"Direct order created"
		);
		Ok(order)
	}
}
