//! Write-side handlers of the order lifecycle.
//!
//! The cart manager owns carts while they are being filled and the checkout
//! coordinator turns them into placed orders.

pub mod cart;
pub mod checkout;

pub use cart::CartManager;
pub use checkout::{resolve_checkout_venue, CheckoutCoordinator, DirectOrder};
