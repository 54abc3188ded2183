//! Interval refresh of a client's active orders.

use super::OrderViews;
use canteen_types::{Order, OwnerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Active orders of one owner, re-queried every interval.
///
/// Starts from the snapshot the caller already loaded. Only a refresh that
/// differs from the current snapshot counts as a change. A failed refresh
/// keeps the previous snapshot. Polling stops when the handle is dropped.
pub struct ActiveOrdersPoll {
	receiver: watch::Receiver<Vec<Order>>,
	task: JoinHandle<()>,
}

impl ActiveOrdersPoll {
	pub fn start(
		views: Arc<OrderViews>,
		owner: OwnerId,
		interval: Duration,
		initial: Vec<Order>,
	) -> Self {
		let (sender, receiver) = watch::channel(initial);
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				match views.active_orders_for(&owner).await {
					Ok(orders) => {
						sender.send_if_modified(|current| {
							if *current == orders {
								return false;
							}
							*current = orders;
							true
						});
					},
					Err(e) => {
						tracing::warn!(owner = %owner, error = %e, "Active orders refresh failed, keeping last snapshot");
					},
				}
				if sender.is_closed() {
					break;
				}
			}
		});
		Self { receiver, task }
	}

	/// Latest snapshot.
	pub fn current(&self) -> Vec<Order> {
		self.receiver.borrow().clone()
	}

	/// Waits until the snapshot changes. Returns `false` once polling has stopped.
	pub async fn changed(&mut self) -> bool {
		self.receiver.changed().await.is_ok()
	}
}

impl Drop for ActiveOrdersPoll {
	fn drop(&mut self) {
		self.task.abort();
	}
}
