//! Read-side views of the order table.
//!
//! Clients see their active orders and their history, staff see the queue of
//! their venue. Views are plain queries. [`ActiveOrdersPoll`] refreshes one on
//! an interval and [`VenueQueueFeed`] refreshes one whenever the change feed
//! reports a write at the venue.

pub mod feed;
pub mod poll;

pub use feed::VenueQueueFeed;
pub use poll::ActiveOrdersPoll;

use crate::engine::EngineError;
use canteen_storage::{Filter, RecordStore, Sort};
use canteen_types::{fields, Order, OrderStatus, OwnerId, Venue};
use std::sync::Arc;

/// Filter of a venue queue: every placed order of the venue.
pub fn venue_queue_filter(venue: Venue) -> Filter {
	Filter::new()
		.eq(fields::VENUE, venue)
		.neq(fields::STATUS, OrderStatus::Cart)
}

/// Queries backing the client and staff displays.
pub struct OrderViews {
	store: Arc<RecordStore<Order>>,
	history_limit: usize,
}

impl OrderViews {
	pub fn new(store: Arc<RecordStore<Order>>, history_limit: usize) -> Self {
		Self {
			store,
			history_limit,
		}
	}

	async fn newest_first(
		&self,
		filter: Filter,
		limit: Option<usize>,
	) -> Result<Vec<Order>, EngineError> {
		self.store
			.select(&filter, Some(&Sort::desc(fields::CREATED_AT)), limit)
			.await
			.map_err(|e| EngineError::StoreFailure(e.to_string()))
	}

	/// The owner's pending, preparing and ready orders, newest first.
	pub async fn active_orders_for(&self, owner: &OwnerId) -> Result<Vec<Order>, EngineError> {
		let filter = Filter::new()
			.eq(fields::OWNER, owner)
			.in_(fields::STATUS, OrderStatus::ACTIVE);
		self.newest_first(filter, None).await
	}

	/// The owner's most recent completed and cancelled orders, newest first.
	pub async fn history_for(&self, owner: &OwnerId) -> Result<Vec<Order>, EngineError> {
		let filter = Filter::new()
			.eq(fields::OWNER, owner)
			.in_(fields::STATUS, OrderStatus::HISTORY);
		self.newest_first(filter, Some(self.history_limit)).await
	}

	/// Every placed order of `venue`, newest first.
	pub async fn venue_queue(&self, venue: Venue) -> Result<Vec<Order>, EngineError> {
		self.newest_first(venue_queue_filter(venue), None).await
	}
}
