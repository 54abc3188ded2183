//! Fixtures shared by the unit tests of this crate.

use canteen_storage::{implementations::memory::MemoryStorage, RecordStore, StorageService};
use canteen_types::{LineItem, Order, Venue};
use rust_decimal::Decimal;
use std::sync::Arc;

pub fn memory_store() -> Arc<RecordStore<Order>> {
	Arc::new(RecordStore::new(Arc::new(StorageService::new(Box::new(
		MemoryStorage::new(),
	)))))
}

pub fn item(name: &str, price: i64, quantity: u32, venue: Venue) -> LineItem {
	LineItem {
		product_id: format!("p-{}", name.to_lowercase()),
		name: name.to_string(),
		price: Decimal::from(price),
		quantity,
		venue,
		image: None,
	}
}

/// Waits a couple of milliseconds so consecutive writes get distinct timestamps.
pub async fn tick() {
	tokio::time::sleep(std::time::Duration::from_millis(3)).await;
}
