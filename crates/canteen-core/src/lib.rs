//! Core order engine for the canteen platform.
//!
//! Carts become pending orders through the checkout coordinator, staff advance
//! orders through the status machine, and the view layer keeps client and
//! staff displays current by polling and by listening to the record store's
//! change feed. [`OrderEngine`] ties these together behind a single facade and
//! [`EngineBuilder`] wires it from configuration.

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod identifiers;
pub mod state;
pub mod views;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use engine::{EngineError, OrderEngine};
pub use handlers::{resolve_checkout_venue, CartManager, CheckoutCoordinator, DirectOrder};
pub use identifiers::{generate_token, IdentifierGenerator};
pub use state::OrderStateMachine;
pub use views::{ActiveOrdersPoll, OrderViews, VenueQueueFeed};
