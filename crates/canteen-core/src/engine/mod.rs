//! Order engine facade.
//!
//! This module contains the [`OrderEngine`], the single entry point used by
//! the service layer. It owns the record store of orders and the handlers,
//! state machine and views built on top of it, and it performs the caller-side
//! checks the lower layers leave out: owner identity, cart ownership and
//! checkout composition.

use crate::handlers::{resolve_checkout_venue, CartManager, CheckoutCoordinator, DirectOrder};
use crate::identifiers::IdentifierGenerator;
use crate::state::OrderStateMachine;
use crate::views::{ActiveOrdersPoll, OrderViews, VenueQueueFeed};
use canteen_config::OrdersConfig;
use canteen_storage::{RecordStore, StorageService};
use canteen_types::{truncate_id, LineItem, Order, OrderStatus, OwnerId, TotalOverflow, Venue};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Operation requires a signed-in user")]
	NotAuthenticated,
	#[error("Storage error: {0}")]
	StoreFailure(String),
	#[error("Cannot move order from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Cannot check out an empty cart")]
	EmptyCartCheckout,
	#[error("Cart holds items from {} venues. Please clear cart and order from one location at a time", .venues.len())]
	MixedVenueCheckout { venues: Vec<Venue> },
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Order {id} is no longer a cart (status {status})")]
	NotACart { id: String, status: OrderStatus },
	#[error("Invalid items: {0}")]
	InvalidItems(#[from] TotalOverflow),
}

fn require_owner(owner: Option<&OwnerId>) -> Result<&OwnerId, EngineError> {
	owner.ok_or(EngineError::NotAuthenticated)
}

/// Order lifecycle engine shared by every request.
#[derive(Clone)]
pub struct OrderEngine {
	/// Order lifecycle settings.
	config: OrdersConfig,
	/// The orders table.
	store: Arc<RecordStore<Order>>,
	/// Cart manager
	carts: Arc<CartManager>,
	/// Checkout coordinator
	checkout: Arc<CheckoutCoordinator>,
	/// Order status machine
	state_machine: Arc<OrderStateMachine>,
	/// Read-side queries
	views: Arc<OrderViews>,
}

impl OrderEngine {
	/// Creates an engine over the given storage backend.
	pub fn new(config: OrdersConfig, storage: Arc<StorageService>) -> Self {
		let store = Arc::new(RecordStore::new(storage));
		let identifiers = Arc::new(IdentifierGenerator::new(
			store.clone(),
			config.display_id_base,
		));

		let carts = Arc::new(CartManager::new(store.clone()));
		let checkout = Arc::new(CheckoutCoordinator::new(store.clone(), identifiers));
		let state_machine = Arc::new(OrderStateMachine::new(store.clone()));
		let views = Arc::new(OrderViews::new(store.clone(), config.history_limit));

		Self {
			config,
			store,
			carts,
			checkout,
			state_machine,
			views,
		}
	}

	pub fn config(&self) -> &OrdersConfig {
		&self.config
	}

	/// Blank or missing names fall back to the configured default.
	fn client_name_or_default(&self, name: Option<String>) -> String {
		name.map(|n| n.trim().to_string())
			.filter(|n| !n.is_empty())
			.unwrap_or_else(|| self.config.default_client_name.clone())
	}

	/// Loads a cart and checks it belongs to `owner`.
	///
	/// Another owner's record reads as missing.
	async fn owned_order(&self, owner: &OwnerId, order_id: &str) -> Result<Order, EngineError> {
		let order = self.get_order(order_id).await?;
		if order.owner.as_ref() != Some(owner) {
			return Err(EngineError::NotFound(order_id.to_string()));
		}
		Ok(order)
	}

	pub async fn get_cart(&self, owner: Option<&OwnerId>) -> Result<Option<Order>, EngineError> {
		self.carts.get_cart(require_owner(owner)?).await
	}

	pub async fn upsert_cart(
		&self,
		owner: Option<&OwnerId>,
		items: Vec<LineItem>,
		client_name: Option<String>,
	) -> Result<Order, EngineError> {
		let owner = require_owner(owner)?;
		let client_name = self.client_name_or_default(client_name);
		self.carts.upsert_cart(owner, items, &client_name).await
	}

	pub async fn clear_cart(
		&self,
		owner: Option<&OwnerId>,
		cart_id: &str,
	) -> Result<Order, EngineError> {
		let owner = require_owner(owner)?;
		self.owned_order(owner, cart_id).await?;
		self.carts.clear_cart(cart_id).await
	}

	/// Places the owner's cart.
	///
	/// The venue is derived from the cart's items. An explicit `venue` must
	/// agree with it. Empty carts and carts spanning both venues are rejected
	/// before anything is written.
	#[instrument(skip_all, fields(order_id = %truncate_id(cart_id)))]
	pub async fn checkout(
		&self,
		owner: Option<&OwnerId>,
		cart_id: &str,
		venue: Option<Venue>,
		client_name: Option<String>,
	) -> Result<Order, EngineError> {
		let owner = require_owner(owner)?;
		let cart = self.owned_order(owner, cart_id).await?;
		if !cart.is_cart() {
			return Err(EngineError::InvalidTransition {
				from: cart.status,
				to: OrderStatus::Pending,
			});
		}

		let resolved = resolve_checkout_venue(cart.items())?;
		if let Some(requested) = venue {
			if requested != resolved {
				let venues: BTreeSet<Venue> = [requested, resolved].into_iter().collect();
				return Err(EngineError::MixedVenueCheckout {
					venues: venues.into_iter().collect(),
				});
			}
		}

		let client_name = self.client_name_or_default(client_name.or(Some(cart.client_name)));
		self.checkout.checkout(cart_id, resolved, client_name).await
	}

	/// Creates a staff-entered order directly at `pending`.
	pub async fn create_direct_order(&self, mut request: DirectOrder) -> Result<Order, EngineError> {
		request.client_name = self.client_name_or_default(Some(request.client_name));
		self.checkout.create_direct_order(request).await
	}

	pub async fn list_active_orders(&self, owner: Option<&OwnerId>) -> Result<Vec<Order>, EngineError> {
		self.views.active_orders_for(require_owner(owner)?).await
	}

	pub async fn list_order_history(&self, owner: Option<&OwnerId>) -> Result<Vec<Order>, EngineError> {
		self.views.history_for(require_owner(owner)?).await
	}

	pub async fn list_venue_queue(&self, venue: Venue) -> Result<Vec<Order>, EngineError> {
		self.views.venue_queue(venue).await
	}

	pub async fn set_order_status(
		&self,
		order_id: &str,
		new_status: OrderStatus,
	) -> Result<Order, EngineError> {
		self.state_machine.set_status(order_id, new_status).await
	}

	pub async fn get_order(&self, order_id: &str) -> Result<Order, EngineError> {
		self.store
			.get(order_id)
			.await
			.map_err(|e| EngineError::StoreFailure(e.to_string()))?
			.ok_or_else(|| EngineError::NotFound(order_id.to_string()))
	}

	/// Loads the owner's active orders and keeps polling them at the
	/// configured interval.
	pub async fn poll_active_orders(
		&self,
		owner: Option<&OwnerId>,
	) -> Result<ActiveOrdersPoll, EngineError> {
		let owner = require_owner(owner)?.clone();
		let initial = self.views.active_orders_for(&owner).await?;
		let interval = Duration::from_secs(self.config.active_poll_interval_seconds);
		Ok(ActiveOrdersPoll::start(self.views.clone(), owner, interval, initial))
	}

	/// Opens a live feed of the venue queue.
	pub async fn watch_venue_queue(&self, venue: Venue) -> Result<VenueQueueFeed, EngineError> {
		VenueQueueFeed::open(&self.store, self.views.clone(), venue).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::item;
	use canteen_storage::implementations::memory::MemoryStorage;
	use rust_decimal::Decimal;

	fn engine() -> OrderEngine {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		OrderEngine::new(OrdersConfig::default(), storage)
	}

	#[tokio::test]
	async fn test_cart_to_completed_scenario() {
		let engine = engine();
		let owner = OwnerId::new("u1");

		let cart = engine
			.upsert_cart(Some(&owner), vec![item("Tea", 20, 2, Venue::Medical)], None)
			.await
			.unwrap();
		assert_eq!(cart.total(), Decimal::from(40));
		assert_eq!(cart.client_name, "Client");

		let order = engine
			.checkout(Some(&owner), &cart.id, None, Some("Asha".into()))
			.await
			.unwrap();
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.venue, Venue::Medical);
		assert_eq!(order.client_name, "Asha");
		let token = order.token.clone().unwrap();
		assert!(token.starts_with("MED-") && token.len() == 7);
		assert!(engine.get_cart(Some(&owner)).await.unwrap().is_none());

		assert_eq!(engine.list_active_orders(Some(&owner)).await.unwrap().len(), 1);
		for status in [OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Completed] {
			engine.set_order_status(&order.id, status).await.unwrap();
		}
		assert!(engine.list_active_orders(Some(&owner)).await.unwrap().is_empty());

		let history = engine.list_order_history(Some(&owner)).await.unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].token.as_deref(), Some(token.as_str()));
		assert_eq!(history[0].venue, Venue::Medical);
	}

	#[tokio::test]
	async fn test_owner_required() {
		let engine = engine();
		assert!(matches!(
			engine.get_cart(None).await,
			Err(EngineError::NotAuthenticated)
		));
		assert!(matches!(
			engine.upsert_cart(None, vec![], None).await,
			Err(EngineError::NotAuthenticated)
		));
		assert!(matches!(
			engine.list_order_history(None).await,
			Err(EngineError::NotAuthenticated)
		));
		assert!(matches!(
			engine.poll_active_orders(None).await,
			Err(EngineError::NotAuthenticated)
		));
	}

	#[tokio::test]
	async fn test_checkout_validation() {
		let engine = engine();
		let owner = OwnerId::new("u1");

		let cart = engine.upsert_cart(Some(&owner), vec![], None).await.unwrap();
		assert!(matches!(
			engine.checkout(Some(&owner), &cart.id, None, None).await,
			Err(EngineError::EmptyCartCheckout)
		));

		engine
			.upsert_cart(
				Some(&owner),
				vec![
					item("Tea", 20, 1, Venue::Medical),
					item("Wrap", 60, 1, Venue::Bitbites),
				],
				None,
			)
			.await
			.unwrap();
		match engine.checkout(Some(&owner), &cart.id, None, None).await {
			Err(EngineError::MixedVenueCheckout { venues }) => {
				assert_eq!(venues, vec![Venue::Medical, Venue::Bitbites])
			},
			other => panic!("unexpected: {:?}", other),
		}

		engine
			.upsert_cart(Some(&owner), vec![item("Wrap", 60, 1, Venue::Bitbites)], None)
			.await
			.unwrap();
		assert!(matches!(
			engine
				.checkout(Some(&owner), &cart.id, Some(Venue::Medical), None)
				.await,
			Err(EngineError::MixedVenueCheckout { .. })
		));

		let stored = engine.get_order(&cart.id).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Cart);
		assert!(stored.token.is_none());
	}

	#[tokio::test]
	async fn test_foreign_cart_reads_as_missing() {
		let engine = engine();
		let owner = OwnerId::new("u1");
		let cart = engine
			.upsert_cart(Some(&owner), vec![item("Tea", 20, 1, Venue::Medical)], None)
			.await
			.unwrap();

		let stranger = OwnerId::new("u2");
		assert!(matches!(
			engine.clear_cart(Some(&stranger), &cart.id).await,
			Err(EngineError::NotFound(_))
		));
		assert!(matches!(
			engine.checkout(Some(&stranger), &cart.id, None, None).await,
			Err(EngineError::NotFound(_))
		));

		let cleared = engine.clear_cart(Some(&owner), &cart.id).await.unwrap();
		assert!(cleared.items().is_empty());
		assert_eq!(cleared.total(), Decimal::ZERO);
	}

	#[tokio::test]
	async fn test_second_checkout_is_invalid_transition() {
		let engine = engine();
		let owner = OwnerId::new("u1");
		let cart = engine
			.upsert_cart(Some(&owner), vec![item("Tea", 20, 1, Venue::Bitbites)], None)
			.await
			.unwrap();
		engine.checkout(Some(&owner), &cart.id, None, None).await.unwrap();
		assert!(matches!(
			engine.checkout(Some(&owner), &cart.id, None, None).await,
			Err(EngineError::InvalidTransition {
				from: OrderStatus::Pending,
				to: OrderStatus::Pending
			})
		));
	}

	#[tokio::test]
	async fn test_direct_order_defaults_client_name() {
		let engine = engine();
		let order = engine
			.create_direct_order(DirectOrder {
				owner: None,
				items: vec![item("Thali", 90, 1, Venue::Medical)],
				venue: Venue::Medical,
				client_name: "  ".into(),
				client_phone: None,
				table_number: Some("7".into()),
			})
			.await
			.unwrap();
		assert_eq!(order.client_name, "Client");
		assert_eq!(engine.list_venue_queue(Venue::Medical).await.unwrap().len(), 1);
		assert!(engine.list_venue_queue(Venue::Bitbites).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_overflowing_items_are_invalid() {
		let engine = engine();
		let owner = OwnerId::new("u1");
		let huge = LineItem {
			price: Decimal::MAX,
			..item("Gold", 1, 2, Venue::Bitbites)
		};

		assert!(matches!(
			engine.upsert_cart(Some(&owner), vec![huge.clone()], None).await,
			Err(EngineError::InvalidItems(_))
		));
		assert!(engine.get_cart(Some(&owner)).await.unwrap().is_none());

		let direct = |items| DirectOrder {
			owner: None,
			items,
			venue: Venue::Bitbites,
			client_name: "W".into(),
			client_phone: None,
			table_number: None,
		};
		assert!(matches!(
			engine.create_direct_order(direct(vec![huge])).await,
			Err(EngineError::InvalidItems(_))
		));
		assert!(engine.list_venue_queue(Venue::Bitbites).await.unwrap().is_empty());

		// The refused order did not consume a display id.
		let next = engine
			.create_direct_order(direct(vec![item("Tea", 20, 1, Venue::Bitbites)]))
			.await
			.unwrap();
		assert_eq!(next.display_id.as_deref(), Some("BIT-1001"));
	}

	#[tokio::test]
	async fn test_orders_and_sequences_survive_restart() {
		use canteen_storage::implementations::file::FileStorage;

		let dir = tempfile::tempdir().unwrap();
		let open = || {
			let backend = FileStorage::new(dir.path().to_path_buf());
			OrderEngine::new(
				OrdersConfig::default(),
				Arc::new(StorageService::new(Box::new(backend))),
			)
		};
		let owner = OwnerId::new("u1");

		let first = open();
		let cart = first
			.upsert_cart(Some(&owner), vec![item("Wrap", 60, 1, Venue::Bitbites)], None)
			.await
			.unwrap();
		let placed = first
			.checkout(Some(&owner), &cart.id, None, None)
			.await
			.unwrap();
		assert_eq!(placed.display_id.as_deref(), Some("BIT-1001"));
		drop(first);

		let second = open();
		assert_eq!(second.get_order(&placed.id).await.unwrap(), placed);
		let next = second
			.create_direct_order(DirectOrder {
				owner: None,
				items: vec![item("Tea", 20, 1, Venue::Bitbites)],
				venue: Venue::Bitbites,
				client_name: "B".into(),
				client_phone: None,
				table_number: None,
			})
			.await
			.unwrap();
		assert_eq!(next.display_id.as_deref(), Some("BIT-1002"));
	}

	#[tokio::test]
	async fn test_unknown_order() {
		let engine = engine();
		assert!(matches!(
			engine.get_order("nope").await,
			Err(EngineError::NotFound(_))
		));
		assert!(matches!(
			engine.set_order_status("nope", OrderStatus::Ready).await,
			Err(EngineError::NotFound(_))
		));
	}
}
