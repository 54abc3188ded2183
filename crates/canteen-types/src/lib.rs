//! Common types module for the canteen order engine.
//!
//! This module defines the data model shared by every crate of the workspace:
//! orders and their line items, venues, order statuses, storage keys, API
//! payloads and configuration validation primitives.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Order types: the single `Order` entity, line items, venues and statuses.
pub mod order;
/// Registry trait for self-registering storage implementations.
pub mod registry;
/// Storage types: table keys and the `Record` contract.
pub mod storage;
/// Utility functions for formatting and timestamps.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{now_millis, truncate_id};
pub use validation::*;
