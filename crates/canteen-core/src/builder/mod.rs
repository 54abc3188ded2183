//! Builder for constructing order engines.
//!
//! Storage backends are created from their configuration tables through
//! factory functions keyed by implementation name, so the binary decides which
//! backends exist and the configuration decides which one is used. Each
//! created backend then checks its table against its own config schema.

use crate::engine::OrderEngine;
use canteen_config::Config;
use canteen_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory functions needed to build an [`OrderEngine`].
pub struct EngineFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builds an [`OrderEngine`] from configuration.
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Creates every configured storage backend that has a factory and wires
	/// the engine to the primary one.
	pub fn build<SF>(self, factories: EngineFactories<SF>) -> Result<OrderEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "No factory registered, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					// Validate the configuration using the implementation's schema
					if let Err(e) = implementation.config_schema().validate(config) {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Invalid configuration for storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Invalid configuration for storage implementation '{}': {}",
							name, e
						)));
					}
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;

		let storage = Arc::new(StorageService::new(storage_backend));
		tracing::info!(
			service_id = %self.config.service.id,
			history_limit = self.config.orders.history_limit,
			"Order engine ready"
		);
		Ok(OrderEngine::new(self.config.orders, storage))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use canteen_storage::StorageFactory;
	use canteen_types::{OrderStatus, OwnerId};
	use std::str::FromStr;

	fn factories() -> EngineFactories<StorageFactory> {
		EngineFactories {
			storage_factories: canteen_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	fn config() -> Config {
		Config::from_str(
			r#"
[service]
id = "canteen-test"

[storage]
primary = "memory"

[storage.implementations.memory]

[orders]
history_limit = 5
"#,
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_builds_engine_on_primary_storage() {
		let engine = EngineBuilder::new(config()).build(factories()).unwrap();
		assert_eq!(engine.config().history_limit, 5);

		let owner = OwnerId::new("u1");
		let cart = engine.upsert_cart(Some(&owner), vec![], None).await.unwrap();
		assert_eq!(cart.status, OrderStatus::Cart);
	}

	#[test]
	fn test_unknown_implementations_are_skipped() {
		let mut config = config();
		config
			.storage
			.implementations
			.insert("redis".into(), toml::Value::Table(Default::default()));
		assert!(EngineBuilder::new(config).build(factories()).is_ok());
	}

	#[test]
	fn test_primary_without_factory_fails() {
		let mut config = config();
		config.storage.primary = "redis".into();
		config
			.storage
			.implementations
			.insert("redis".into(), toml::Value::Table(Default::default()));
		let err = EngineBuilder::new(config).build(factories()).err().unwrap();
		assert!(err.to_string().contains("Primary storage 'redis'"));
	}

	#[test]
	fn test_invalid_backend_config_fails() {
		let mut config = config();
		let mut table = toml::map::Map::new();
		table.insert("storage_path".into(), toml::Value::String(String::new()));
		config.storage.primary = "file".into();
		config
			.storage
			.implementations
			.insert("file".into(), toml::Value::Table(table));
		let err = EngineBuilder::new(config).build(factories()).err().unwrap();
		assert!(err.to_string().contains("'file'"));
	}

	#[test]
	fn test_backend_table_checked_against_schema() {
		let mut invalid = config();
		invalid.storage.implementations.insert(
			"file".into(),
			toml::from_str("storage_path = 42").unwrap(),
		);
		let err = EngineBuilder::new(invalid).build(factories()).err().unwrap();
		let message = err.to_string();
		assert!(message.contains("Invalid configuration for storage implementation 'file'"));
		assert!(message.contains("storage_path"));

		let mut valid = config();
		valid.storage.implementations.insert(
			"memory".into(),
			toml::from_str("capacity = 10").unwrap(),
		);
		assert!(EngineBuilder::new(valid).build(factories()).is_ok());
	}
}
