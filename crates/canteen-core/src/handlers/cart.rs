//! Cart manager.
//!
//! Each owner has at most one order in `cart` status. The record store rejects
//! a second cart for the same owner, so an upsert that loses an insert race
//! falls back to updating the cart that won.

use crate::engine::EngineError;
use canteen_storage::{Filter, RecordStore, StorageError, TryUpdateError};
use canteen_types::{fields, now_millis, truncate_id, LineItem, Order, OrderStatus, OwnerId};
use std::sync::Arc;
use tracing::instrument;

/// Attempts before an upsert gives up racing concurrent checkouts and inserts.
const UPSERT_ATTEMPTS: usize = 3;

/// Owns the single mutable cart record per owner.
pub struct CartManager {
	store: Arc<RecordStore<Order>>,
}

impl CartManager {
	pub fn new(store: Arc<RecordStore<Order>>) -> Self {
		Self { store }
	}

	/// The owner's cart, if one exists. Never creates one.
	pub async fn get_cart(&self, owner: &OwnerId) -> Result<Option<Order>, EngineError> {
		let filter = Filter::new()
			.eq(fields::OWNER, owner)
			.eq(fields::STATUS, OrderStatus::Cart);
		let mut carts = self
			.store
			.select(&filter, None, Some(1))
			.await
			.map_err(|e| EngineError::StoreFailure(e.to_string()))?;
		Ok(carts.pop())
	}

	/// Replaces the items of the owner's cart, creating the cart if needed.
	///
	/// An existing cart keeps its client name. A new cart gets `client_name`,
	/// the placeholder venue and no token.
	#[instrument(skip_all, fields(owner = %owner, items = items.len()))]
	pub async fn upsert_cart(
		&self,
		owner: &OwnerId,
		items: Vec<LineItem>,
		client_name: &str,
	) -> Result<Order, EngineError> {
		for _ in 0..UPSERT_ATTEMPTS {
			if let Some(cart) = self.get_cart(owner).await? {
				let replacement = items.clone();
				match self
					.store
					.try_update(&cart.id, |order| {
						if !order.is_cart() {
							return Err(EngineError::NotACart {
								id: order.id.clone(),
								status: order.status,
							});
						}
						order.set_items(replacement)?;
						order.updated_at = now_millis();
						Ok(())
					})
					.await
				{
					Ok(order) => {
						tracing::debug!(order_id = %truncate_id(&order.id), total = %order.total(), "Cart updated");
						return Ok(order);
					},
					// Checked out between the lookup and the write.
					Err(TryUpdateError::Rejected(EngineError::NotACart { .. }))
					| Err(TryUpdateError::Storage(StorageError::NotFound)) => continue,
					Err(TryUpdateError::Rejected(e)) => return Err(e),
					Err(TryUpdateError::Storage(e)) => {
						return Err(EngineError::StoreFailure(e.to_string()))
					},
				}
			}

			let cart = Order::new_cart(
				owner.clone(),
				items.clone(),
				client_name.to_string(),
				now_millis(),
			)?;
			match self.store.insert(cart).await {
				Ok(order) => {
					tracing::info!(order_id = %truncate_id(&order.id), total = %order.total(), "Cart created");
					return Ok(order);
				},
				// Another request created the cart first.
				Err(StorageError::Conflict(_)) => continue,
				Err(e) => return Err(EngineError::StoreFailure(e.to_string())),
			}
		}

		Err(EngineError::StoreFailure(format!(
			"cart for owner {} kept changing during upsert",
			owner
		)))
	}

	/// Empties the cart. Status and venue are left alone.
	#[instrument(skip_all, fields(order_id = %truncate_id(cart_id)))]
	pub async fn clear_cart(&self, cart_id: &str) -> Result<Order, EngineError> {
		let cart = self
			.store
			.try_update(cart_id, |order| {
				if !order.is_cart() {
					return Err(EngineError::NotACart {
						id: order.id.clone(),
						status: order.status,
					});
				}
				order.clear_items();
				order.updated_at = now_millis();
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

		tracing::debug!("Cart cleared");
		Ok(cart)
	}
}
