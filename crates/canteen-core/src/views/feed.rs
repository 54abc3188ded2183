//! Live venue queue.
//!
//! The feed subscribes to writes touching the venue and re-runs the whole
//! queue query after each one. Bursts of changes collapse into a single
//! refetch. A failed refetch is logged and the last good queue stays
//! published until the next change.

use super::{venue_queue_filter, OrderViews};
use crate::engine::EngineError;
use canteen_storage::{RecordStore, Subscription};
use canteen_types::{Order, Venue};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Continuously refreshed queue of one venue.
///
/// Dropping the feed releases its change subscription.
pub struct VenueQueueFeed {
	venue: Venue,
	receiver: watch::Receiver<Vec<Order>>,
	_subscription: Subscription,
	refresher: JoinHandle<()>,
}

impl VenueQueueFeed {
	/// Loads the queue and starts following changes to it.
	pub async fn open(
		store: &RecordStore<Order>,
		views: Arc<OrderViews>,
		venue: Venue,
	) -> Result<Self, EngineError> {
		let notify = Arc::new(Notify::new());
		let signal = notify.clone();
		// Subscribe before the initial query so no write in between is missed.
		let subscription = store.subscribe_changes(venue_queue_filter(venue), move || {
			signal.notify_one();
		});

		let initial = views.venue_queue(venue).await?;
		let (sender, receiver) = watch::channel(initial);

		let refresher = tokio::spawn(async move {
			loop {
				notify.notified().await;
				match views.venue_queue(venue).await {
					Ok(queue) => {
						tracing::debug!(venue = %venue, orders = queue.len(), "Venue queue refreshed");
						sender.send_replace(queue);
					},
					Err(e) => {
						tracing::warn!(venue = %venue, error = %e, "Venue queue refresh failed, keeping last snapshot");
					},
				}
			}
		});

		Ok(Self {
			venue,
			receiver,
			_subscription: subscription,
			refresher,
		})
	}

	pub fn venue(&self) -> Venue {
		self.venue
	}

	/// Latest snapshot of the queue.
	pub fn current(&self) -> Vec<Order> {
		self.receiver.borrow().clone()
	}

	/// Waits for the next refreshed snapshot. Returns `false` once the feed has stopped.
	pub async fn changed(&mut self) -> bool {
		self.receiver.changed().await.is_ok()
	}

	/// Turns the feed into a stream: the current snapshot first, then one item
	/// per refresh. The feed lives as long as the stream.
	pub fn into_stream(self) -> impl Stream<Item = Vec<Order>> + Send {
		futures::stream::unfold((self, true), |(mut feed, first)| async move {
			if !first && !feed.changed().await {
				return None;
			}
			let snapshot = feed.receiver.borrow_and_update().clone();
			Some((snapshot, (feed, false)))
		})
	}
}

impl Drop for VenueQueueFeed {
	fn drop(&mut self) {
		self.refresher.abort();
	}
}
