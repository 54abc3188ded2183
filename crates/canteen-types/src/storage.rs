//! Storage-related types for the order engine.

use serde::{de::DeserializeOwned, Serialize};
use std::str::FromStr;

/// Storage keys for the different record collections.
///
/// Each variant names a namespace in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Orders and carts
	Orders,
	/// Named monotonic counters
	Sequences,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Sequences => "sequences",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Orders, Self::Sequences].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"sequences" => Ok(Self::Sequences),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

/// A row kept in a record store.
///
/// Records are stored as JSON, so store filters address them by their
/// serialized field names.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
	/// Namespace the records live in.
	const TABLE: StorageKey;

	/// Identifier of the record. Empty before the store assigns one.
	fn id(&self) -> &str;

	/// Sets the identifier. Called by the store on insert.
	fn assign_id(&mut self, id: String);

	/// Whether `self` and `other` may not both exist.
	///
	/// The store rejects an insert or update that would leave two conflicting
	/// records behind.
	fn conflicts_with(&self, _other: &Self) -> bool {
		false
	}
}
