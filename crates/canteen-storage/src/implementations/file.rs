//! File-based storage backend.
//!
//! Each value is written as its own JSON document at
//! `<storage_path>/<namespace>/<id>.json`. Writes go to a temporary file first
//! and are renamed into place, so a crash never leaves a half-written record.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use canteen_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::path::PathBuf;
use tokio::fs;

const DEFAULT_STORAGE_PATH: &str = "./data/storage";
const EXTENSION: &str = "json";

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Replaces path separators so an id can never escape its namespace directory.
	fn sanitize(segment: &str) -> String {
		segment.replace(['/', '\\', ':', '.'], "_")
	}

	fn namespace_dir(&self, namespace: &str) -> PathBuf {
		self.base_path.join(Self::sanitize(namespace))
	}

	/// Maps `namespace:id` to its file. Keys without a namespace land in the base directory.
	fn get_file_path(&self, key: &str) -> PathBuf {
		match key.split_once(':') {
			Some((namespace, id)) => self
				.namespace_dir(namespace)
				.join(format!("{}.{}", Self::sanitize(id), EXTENSION)),
			None => self
				.base_path
				.join(format!("{}.{}", Self::sanitize(key), EXTENSION)),
		}
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);
		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let dir = self.namespace_dir(namespace);
		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut ids = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new(EXTENSION)) {
				tracing::debug!("Skipping non-record file {:?}", path);
				continue;
			}
			if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
				ids.push(stem.to_string());
			}
		}
		Ok(ids)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if path.trim().is_empty() => {
						Err("storage_path must not be empty".to_string())
					},
					_ => Ok(()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_writes_one_file_per_record() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().to_path_buf());

		storage
			.set_bytes("orders:3f2a9c1e", br#"{"id":"3f2a9c1e"}"#.to_vec())
			.await
			.unwrap();

		let path = temp_dir.path().join("orders").join("3f2a9c1e.json");
		assert!(path.exists());
		assert!(!temp_dir.path().join("orders").join("3f2a9c1e.tmp").exists());
		assert_eq!(
			storage.get_bytes("orders:3f2a9c1e").await.unwrap(),
			br#"{"id":"3f2a9c1e"}"#.to_vec()
		);
		assert!(storage.exists("orders:3f2a9c1e").await.unwrap());
	}

	#[tokio::test]
	async fn test_missing_key_and_namespace() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().to_path_buf());

		assert!(matches!(
			storage.get_bytes("orders:nope").await,
			Err(StorageError::NotFound)
		));
		assert!(!storage.exists("orders:nope").await.unwrap());
		assert!(storage.list_keys("orders").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_list_keys_survives_reopen() {
		let temp_dir = TempDir::new().unwrap();
		{
			let storage = FileStorage::new(temp_dir.path().to_path_buf());
			storage.set_bytes("orders:a", b"1".to_vec()).await.unwrap();
			storage.set_bytes("orders:b", b"2".to_vec()).await.unwrap();
			storage.set_bytes("sequences:medical", b"3".to_vec()).await.unwrap();
		}

		let reopened = FileStorage::new(temp_dir.path().to_path_buf());
		let mut keys = reopened.list_keys("orders").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["a", "b"]);
	}

	#[tokio::test]
	async fn test_ids_cannot_escape_namespace() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().to_path_buf());
		storage.set_bytes("orders:../evil", b"x".to_vec()).await.unwrap();

		assert!(!temp_dir.path().join("evil.json").exists());
		assert_eq!(storage.list_keys("orders").await.unwrap(), vec!["___evil"]);
	}

	#[test]
	fn test_schema_rejects_empty_path() {
		let config: toml::Value = toml::from_str("storage_path = \"  \"").unwrap();
		assert!(FileStorageSchema.validate(&config).is_err());
		assert!(create_storage(&config).unwrap().config_schema().validate(&config).is_err());

		let config: toml::Value = toml::from_str("storage_path = \"./data\"").unwrap();
		assert!(FileStorageSchema.validate(&config).is_ok());
	}
}
