//! Main entry point for the canteen order service.
//!
//! Loads the configuration, wires the order engine to its storage backend and
//! either serves the HTTP API or, when the API is disabled, follows the venue
//! queues and logs every change.

use canteen_config::Config;
use canteen_core::{EngineBuilder, EngineFactories, OrderEngine};
use canteen_types::Venue;
use clap::Parser;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use canteen_storage::implementations::file::create_storage as create_file_storage;
use canteen_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the canteen service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "CANTEEN_CONFIG", default_value = "config/canteen.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started canteen service");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(build_engine(config.clone())?);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => server::start_server(api_config, engine).await?,
		None => {
			tracing::info!("API disabled, following venue queues");
			follow_venue_queues(&engine).await?;
		},
	}

	tracing::info!("Stopped canteen service");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the order engine on the configured storage backend.
fn build_engine(config: Config) -> Result<OrderEngine, Box<dyn std::error::Error>> {
	let storage_factories = create_factory_map!(
		canteen_storage::StorageInterface,
		canteen_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let engine = EngineBuilder::new(config).build(EngineFactories { storage_factories })?;
	Ok(engine)
}

/// Logs a summary of each venue queue whenever it changes, until Ctrl+C.
async fn follow_venue_queues(engine: &OrderEngine) -> Result<(), Box<dyn std::error::Error>> {
	let mut feeds = Vec::new();
	for venue in Venue::ALL {
		let feed = engine.watch_venue_queue(venue).await?;
		feeds.push(feed.into_stream().map(move |queue| (venue, queue)).boxed());
	}
	let mut updates = futures::stream::select_all(feeds);

	loop {
		tokio::select! {
			Some((venue, queue)) = updates.next() => {
				let active = queue.iter().filter(|order| order.status.is_active()).count();
				tracing::info!(
					venue = %venue,
					orders = queue.len(),
					active,
					newest = queue.first().and_then(|o| o.display_id.as_deref()).unwrap_or("-"),
					"Venue queue"
				);
			}
			result = tokio::signal::ctrl_c() => {
				result?;
				break;
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use canteen_types::{OrderStatus, OwnerId};

	#[tokio::test]
	async fn test_build_engine_from_config_file() {
		let dir = tempfile::tempdir().unwrap();
		let data = dir.path().join("data");
		let path = dir.path().join("canteen.toml");
		std::fs::write(
			&path,
			format!(
				r#"
[service]
id = "canteen-local"

[storage]
primary = "file"

[storage.implementations.file]
storage_path = "{}"

[orders]
display_id_base = 500
"#,
				data.display()
			),
		)
		.unwrap();

		let config = Config::from_file(&path).await.unwrap();
		assert!(!config.api_enabled());
		let engine = build_engine(config).unwrap();

		let owner = OwnerId::new("u1");
		let cart = engine
			.upsert_cart(
				Some(&owner),
				vec![canteen_types::LineItem {
					product_id: "p-tea".into(),
					name: "Tea".into(),
					price: rust_decimal::Decimal::from(20),
					quantity: 1,
					venue: Venue::Bitbites,
					image: None,
				}],
				None,
			)
			.await
			.unwrap();
		let order = engine
			.checkout(Some(&owner), &cart.id, None, None)
			.await
			.unwrap();
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.display_id.as_deref(), Some("BIT-501"));
		assert!(data.join("orders").exists());
	}
}
