//! Order status machine.
//!
//! Staff move placed orders along `pending -> preparing -> ready -> completed`
//! and may cancel any order that is still active. Completed and cancelled
//! orders are terminal. Leaving `cart` is not a staff transition: it only
//! happens through checkout.

use crate::engine::EngineError;
use canteen_storage::{RecordStore, StorageError, TryUpdateError};
use canteen_types::{now_millis, truncate_id, Order, OrderStatus};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

/// Legal staff-initiated transitions. Statuses without an entry have none.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	HashMap::from([
		(
			OrderStatus::Pending,
			HashSet::from([OrderStatus::Preparing, OrderStatus::Cancelled]),
		),
		(
			OrderStatus::Preparing,
			HashSet::from([OrderStatus::Ready, OrderStatus::Cancelled]),
		),
		(
			OrderStatus::Ready,
			HashSet::from([OrderStatus::Completed, OrderStatus::Cancelled]),
		),
		(OrderStatus::Completed, HashSet::new()),
		(OrderStatus::Cancelled, HashSet::new()),
	])
});

/// Applies validated status transitions to stored orders.
pub struct OrderStateMachine {
	store: Arc<RecordStore<Order>>,
}

impl OrderStateMachine {
	pub fn new(store: Arc<RecordStore<Order>>) -> Self {
		Self { store }
	}

	/// Checks if a state transition is valid
	pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
		TRANSITIONS.get(&from).is_some_and(|next| next.contains(&to))
	}

	/// Statuses reachable from `from` in one step.
	pub fn next_statuses(from: OrderStatus) -> Vec<OrderStatus> {
		let mut next: Vec<_> = TRANSITIONS
			.get(&from)
			.map(|set| set.iter().copied().collect())
			.unwrap_or_default();
		next.sort_by_key(|status| *status as u8);
		next
	}

	/// Moves the order to `new_status`.
	///
	/// The transition is checked against the row as it is stored at the moment
	/// of the write, so two staff members racing on the same order cannot both
	/// apply a move from the same state.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), to = %new_status))]
	pub async fn set_status(
		&self,
		order_id: &str,
		new_status: OrderStatus,
	) -> Result<Order, EngineError> {
		let order = self
			.store
			.try_update(order_id, |order| {
				if !Self::is_valid_transition(order.status, new_status) {
					return Err(EngineError::InvalidTransition {
						from: order.status,
						to: new_status,
					});
				}
				order.status = new_status;
				order.updated_at = now_millis();
				Ok(())
			})
			.await
			.map_err(|e| match e {
				TryUpdateError::Rejected(e) => e,
				TryUpdateError::Storage(StorageError::NotFound) => {
					EngineError::NotFound(order_id.to_string())
				},
				TryUpdateError::Storage(e) => EngineError::StoreFailure(e.to_string()),
			})?;

		tracing::info!(venue = %order.venue, status = %order.status, "Order status updated");
		Ok(order)
	}
}
