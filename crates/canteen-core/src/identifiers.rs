//! Human-facing order identifiers.
//!
//! Tokens are short random codes read out at the counter and may collide.
//! Display ids come from a per-venue counter in the record store and are
//! unique.

use crate::engine::EngineError;
use canteen_storage::{Filter, RecordStore};
use canteen_types::{fields, Order, OrderStatus, Venue};
use rand::Rng;
use std::sync::Arc;

/// Draws a counter token such as `MED-482`: the venue prefix and a
/// three-digit suffix in `[100, 900)`.
pub fn generate_token(venue: Venue) -> String {
	let suffix: u16 = rand::thread_rng().gen_range(100..900);
	format!("{}-{}", venue.token_prefix(), suffix)
}

fn sequence_name(venue: Venue) -> String {
	format!("display_id_{}", venue.as_str())
}

/// Issues tokens and sequential display ids.
pub struct IdentifierGenerator {
	store: Arc<RecordStore<Order>>,
	display_id_base: u64,
}

impl IdentifierGenerator {
	pub fn new(store: Arc<RecordStore<Order>>, display_id_base: u64) -> Self {
		Self {
			store,
			display_id_base,
		}
	}

	pub fn generate_token(&self, venue: Venue) -> String {
		generate_token(venue)
	}

	/// Next display id for `venue`, e.g. `BIT-1007`.
	///
	/// The venue counter is seeded from the number of orders already placed at
	/// the venue, so a store that predates the counter continues where the
	/// placed orders leave off.
	pub async fn generate_sequential_id(&self, venue: Venue) -> Result<String, EngineError> {
		let placed = Filter::new()
			.eq(fields::VENUE, venue)
			.neq(fields::STATUS, OrderStatus::Cart);
		let store = &self.store;
		let placed = &placed;

		let n = self
			.store
			.next_sequence(&sequence_name(venue), move || async move {
				store.count(placed).await.map(|count| count as u64)
			})
			.await
			.map_err(|e| EngineError::StoreFailure(e.to_string()))?;

		Ok(format!(
			"{}-{}",
			venue.token_prefix(),
			self.display_id_base + n
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::memory_store;

	fn assert_token(token: &str, prefix: &str) {
		let (head, digits) = token.split_once('-').unwrap();
		assert_eq!(head, prefix);
		assert_eq!(digits.len(), 3);
		let n: u16 = digits.parse().unwrap();
		assert!((100..900).contains(&n), "suffix {} out of range", n);
	}

	#[test]
	fn test_token_shape() {
		for _ in 0..200 {
			assert_token(&generate_token(Venue::Medical), "MED");
			assert_token(&generate_token(Venue::Bitbites), "BIT");
		}
	}

	#[tokio::test]
	async fn test_sequential_ids_per_venue() {
		let generator = IdentifierGenerator::new(memory_store(), 1000);
		assert_eq!(
			generator.generate_sequential_id(Venue::Medical).await.unwrap(),
			"MED-1001"
		);
		assert_eq!(
			generator.generate_sequential_id(Venue::Medical).await.unwrap(),
			"MED-1002"
		);
		assert_eq!(
			generator.generate_sequential_id(Venue::Bitbites).await.unwrap(),
			"BIT-1001"
		);
	}

	#[tokio::test]
	async fn test_sequence_seeded_from_placed_orders() {
		let store = memory_store();
		for i in 0..3 {
			store
				.insert(Order::new_pending(
					None,
					Venue::Bitbites,
					vec![],
					"Walk-in".into(),
					generate_token(Venue::Bitbites),
					i,
				).unwrap())
				.await
				.unwrap();
		}
		let generator = IdentifierGenerator::new(store, 1000);
		assert_eq!(
			generator.generate_sequential_id(Venue::Bitbites).await.unwrap(),
			"BIT-1004"
		);
	}

	#[tokio::test]
	async fn test_concurrent_ids_are_unique() {
		let generator = Arc::new(IdentifierGenerator::new(memory_store(), 1000));
		let handles: Vec<_> = (0..10)
			.map(|_| {
				let generator = generator.clone();
				tokio::spawn(async move { generator.generate_sequential_id(Venue::Medical).await })
			})
			.collect();

		let mut ids = Vec::new();
		for handle in handles {
			ids.push(handle.await.unwrap().unwrap());
		}
		ids.sort();
		ids.dedup();
		assert_eq!(ids.len(), 10);
	}
}
