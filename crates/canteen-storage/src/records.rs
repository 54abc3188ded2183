//! Typed record store with a change feed.
//!
//! [`RecordStore`] keeps one table of [`Record`]s on top of a
//! [`StorageService`]. Every write runs under a single store-wide lock, so a
//! write is atomic with respect to every other write and the closure passed to
//! [`RecordStore::try_update`] always sees the row it is about to replace.
//! After a write commits it is published to every live subscription.

use crate::{Filter, Sort, StorageError, StorageService};
use canteen_types::{truncate_id, Record, StorageKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Number of changes buffered per subscriber before it starts lagging.
const CHANGE_BUFFER_SIZE: usize = 256;

/// What kind of write produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
	Insert,
	Update,
}

/// A committed write. `old` is `None` for inserts.
#[derive(Debug, Clone)]
pub struct RecordChange<T> {
	pub kind: ChangeKind,
	pub old: Option<T>,
	pub new: T,
}

impl<T: Record> RecordChange<T> {
	/// A change is visible to a filter when the row matched it before or after the write.
	pub fn matches(&self, filter: &Filter) -> bool {
		let matches = |row: &T| serde_json::to_value(row).is_ok_and(|v| filter.matches(&v));
		matches(&self.new) || self.old.as_ref().is_some_and(matches)
	}
}

/// Error from [`RecordStore::try_update`]: either the store failed or the
/// patch closure rejected the row.
#[derive(Debug, Error)]
pub enum TryUpdateError<E> {
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error("Update rejected")]
	Rejected(E),
}

/// Handle to a change subscription.
///
/// Delivery stops when the handle is released or dropped.
pub struct Subscription {
	task: Option<JoinHandle<()>>,
}

impl Subscription {
	/// Stops delivery.
	pub fn release(mut self) {
		self.stop();
	}

	/// Whether the subscription still delivers changes.
	pub fn is_active(&self) -> bool {
		self.task.as_ref().is_some_and(|task| !task.is_finished())
	}

	fn stop(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.stop();
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct SequenceValue {
	value: u64,
}

/// A table of `T` records.
pub struct RecordStore<T: Record> {
	storage: Arc<StorageService>,
	write_lock: Mutex<()>,
	changes: broadcast::Sender<RecordChange<T>>,
}

impl<T: Record> RecordStore<T> {
	pub fn new(storage: Arc<StorageService>) -> Self {
		let (changes, _) = broadcast::channel(CHANGE_BUFFER_SIZE);
		Self {
			storage,
			write_lock: Mutex::new(()),
			changes,
		}
	}

	fn table() -> &'static str {
		T::TABLE.as_str()
	}

	/// Loads every row together with its serialized form.
	async fn rows(&self) -> Result<Vec<(Value, T)>, StorageError> {
		let rows: Vec<T> = self.storage.list(Self::table()).await?;
		rows.into_iter()
			.map(|row| {
				serde_json::to_value(&row)
					.map(|value| (value, row))
					.map_err(|e| StorageError::Serialization(e.to_string()))
			})
			.collect()
	}

	/// Rows matching `filter`, optionally sorted and truncated to `limit`.
	pub async fn select(
		&self,
		filter: &Filter,
		sort: Option<&Sort>,
		limit: Option<usize>,
	) -> Result<Vec<T>, StorageError> {
		let mut rows: Vec<(Value, T)> = self
			.rows()
			.await?
			.into_iter()
			.filter(|(value, _)| filter.matches(value))
			.collect();

		if let Some(sort) = sort {
			rows.sort_by(|(a, _), (b, _)| sort.compare(a, b));
		}
		if let Some(limit) = limit {
			rows.truncate(limit);
		}

		Ok(rows.into_iter().map(|(_, row)| row).collect())
	}

	/// Number of rows matching `filter`.
	pub async fn count(&self, filter: &Filter) -> Result<usize, StorageError> {
		Ok(self
			.rows()
			.await?
			.iter()
			.filter(|(value, _)| filter.matches(value))
			.count())
	}

	/// Fetches one row by id.
	pub async fn get(&self, id: &str) -> Result<Option<T>, StorageError> {
		match self.storage.retrieve(Self::table(), id).await {
			Ok(row) => Ok(Some(row)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Inserts `record` under a fresh UUID and returns the stored row.
	pub async fn insert(&self, mut record: T) -> Result<T, StorageError> {
		let _guard = self.write_lock.lock().await;

		record.assign_id(uuid::Uuid::new_v4().to_string());
		self.ensure_unique(&record).await?;
		self.storage.store(Self::table(), record.id(), &record).await?;

		tracing::debug!(table = Self::table(), id = %truncate_id(record.id()), "Inserted record");
		self.publish(RecordChange {
			kind: ChangeKind::Insert,
			old: None,
			new: record.clone(),
		});
		Ok(record)
	}

	/// Applies `patch` to the row and stores the result.
	pub async fn update<F>(&self, id: &str, patch: F) -> Result<T, StorageError>
	where
		F: FnOnce(&mut T),
	{
		self.try_update(id, |row| {
			patch(row);
			Ok::<(), Infallible>(())
		})
		.await
		.map_err(|e| match e {
			TryUpdateError::Storage(e) => e,
			TryUpdateError::Rejected(never) => match never {},
		})
	}

	/// Applies a patch that may reject the current row.
	///
	/// The row is read, patched and written while holding the write lock, so
	/// the check inside `patch` cannot be invalidated by a concurrent write.
	/// A rejection leaves the row untouched.
	pub async fn try_update<F, E>(&self, id: &str, patch: F) -> Result<T, TryUpdateError<E>>
	where
		F: FnOnce(&mut T) -> Result<(), E>,
	{
		let _guard = self.write_lock.lock().await;

		let old: T = self.storage.retrieve(Self::table(), id).await?;
		let mut row = old.clone();
		patch(&mut row).map_err(TryUpdateError::Rejected)?;
		row.assign_id(id.to_string());

		self.ensure_unique(&row).await?;
		self.storage.update(Self::table(), id, &row).await?;

		tracing::debug!(table = Self::table(), id = %truncate_id(id), "Updated record");
		self.publish(RecordChange {
			kind: ChangeKind::Update,
			old: Some(old),
			new: row.clone(),
		});
		Ok(row)
	}

	/// Returns the next value of the named counter.
	///
	/// On first use the counter starts from the value produced by `seed`, so
	/// the first call returns `seed + 1`. Counters live in the `sequences`
	/// namespace and share the store's write lock.
	pub async fn next_sequence<F, Fut>(&self, name: &str, seed: F) -> Result<u64, StorageError>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<u64, StorageError>>,
	{
		let namespace = StorageKey::Sequences.as_str();
		let _guard = self.write_lock.lock().await;

		let current = match self.storage.retrieve::<SequenceValue>(namespace, name).await {
			Ok(sequence) => sequence.value,
			Err(StorageError::NotFound) => seed().await?,
			Err(e) => return Err(e),
		};
		let next = current + 1;
		self.storage
			.store(namespace, name, &SequenceValue { value: next })
			.await?;
		Ok(next)
	}

	/// Calls `on_change` after every committed write matching `filter`.
	///
	/// If the subscriber falls behind and changes are dropped, `on_change` is
	/// still called once so the caller can re-read. Must be called from within
	/// a Tokio runtime.
	pub fn subscribe_changes<F>(&self, filter: Filter, mut on_change: F) -> Subscription
	where
		F: FnMut() + Send + 'static,
	{
		let mut receiver = self.changes.subscribe();
		let table = Self::table();
		let task = tokio::spawn(async move {
			loop {
				match receiver.recv().await {
					Ok(change) => {
						if change.matches(&filter) {
							on_change();
						}
					},
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(table, skipped, "Change subscription lagged");
						on_change();
					},
					Err(broadcast::error::RecvError::Closed) => {
						tracing::debug!(table, "Change feed closed");
						break;
					},
				}
			}
		});
		Subscription { task: Some(task) }
	}

	fn publish(&self, change: RecordChange<T>) {
		// No live subscribers is not an error.
		let _ = self.changes.send(change);
	}

	async fn ensure_unique(&self, record: &T) -> Result<(), StorageError> {
		let rows: Vec<T> = self.storage.list(Self::table()).await?;
		match rows
			.iter()
			.find(|other| other.id() != record.id() && record.conflicts_with(other))
		{
			Some(other) => Err(StorageError::Conflict(format!(
				"{} record conflicts with existing record {}",
				Self::table(),
				other.id()
			))),
			None => Ok(()),
		}
	}
}
