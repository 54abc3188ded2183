//! Order types for the canteen order engine.
//!
//! A cart and a placed order are the same entity: an [`Order`] whose status is
//! [`OrderStatus::Cart`] is a cart. This module defines that entity, its line
//! items, the fixed venue enumeration and the status lifecycle.

use crate::storage::{Record, StorageKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Serialized field names of [`Order`], used when building store filters.
pub mod fields {
	pub const ID: &str = "id";
	pub const OWNER: &str = "owner";
	pub const VENUE: &str = "venue";
	pub const STATUS: &str = "status";
	pub const TOKEN: &str = "token";
	pub const CREATED_AT: &str = "created_at";
	pub const UPDATED_AT: &str = "updated_at";
}

/// Error returned when parsing a venue or status from its wire name fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
	kind: &'static str,
	value: String,
}

/// Error returned when line items add up to more than a [`Decimal`] can hold.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Order total is too large to represent")]
pub struct TotalOverflow;

/// Identifier of the authenticated user owning an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for OwnerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Serving location an order is placed at and fulfilled by.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
	/// The medical campus cafeteria. Also the placeholder venue of fresh carts.
	#[default]
	Medical,
	/// The Bit Bites counter.
	Bitbites,
}

impl Venue {
	/// Both venues, in declaration order.
	pub const ALL: [Venue; 2] = [Venue::Medical, Venue::Bitbites];

	/// Wire name of the venue.
	pub fn as_str(&self) -> &'static str {
		match self {
			Venue::Medical => "medical",
			Venue::Bitbites => "bitbites",
		}
	}

	/// Prefix used for tokens and display ids issued at this venue.
	pub fn token_prefix(&self) -> &'static str {
		match self {
			Venue::Medical => "MED",
			Venue::Bitbites => "BIT",
		}
	}

	/// Human readable venue name.
	pub fn display_name(&self) -> &'static str {
		match self {
			Venue::Medical => "Medical Cafeteria",
			Venue::Bitbites => "Bit Bites",
		}
	}
}

impl fmt::Display for Venue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Venue {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"medical" => Ok(Venue::Medical),
			"bitbites" => Ok(Venue::Bitbites),
			_ => Err(ParseEnumError {
				kind: "venue",
				value: s.to_string(),
			}),
		}
	}
}

/// Status of an order.
///
/// `Cart -> Pending -> Preparing -> Ready -> Completed`, with `Cancelled`
/// reachable from any of the three active states. Legality of each move is
/// decided by the status machine in the core crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Mutable cart owned by a single user, not yet submitted.
	Cart,
	/// Placed and waiting for the kitchen.
	Pending,
	/// Being prepared.
	Preparing,
	/// Ready for pickup at the counter.
	Ready,
	/// Handed over. Terminal.
	Completed,
	/// Withdrawn before completion. Terminal.
	Cancelled,
}

impl OrderStatus {
	/// Statuses shown in a client's active orders.
	pub const ACTIVE: [OrderStatus; 3] = [
		OrderStatus::Pending,
		OrderStatus::Preparing,
		OrderStatus::Ready,
	];

	/// Statuses shown in a client's order history.
	pub const HISTORY: [OrderStatus; 2] = [OrderStatus::Completed, OrderStatus::Cancelled];

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Cart => "cart",
			OrderStatus::Pending => "pending",
			OrderStatus::Preparing => "preparing",
			OrderStatus::Ready => "ready",
			OrderStatus::Completed => "completed",
			OrderStatus::Cancelled => "cancelled",
		}
	}

	pub fn is_active(&self) -> bool {
		Self::ACTIVE.contains(self)
	}

	pub fn is_terminal(&self) -> bool {
		Self::HISTORY.contains(self)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"cart" => Ok(OrderStatus::Cart),
			"pending" => Ok(OrderStatus::Pending),
			"preparing" => Ok(OrderStatus::Preparing),
			"ready" => Ok(OrderStatus::Ready),
			"completed" => Ok(OrderStatus::Completed),
			"cancelled" => Ok(OrderStatus::Cancelled),
			_ => Err(ParseEnumError {
				kind: "order status",
				value: s.to_string(),
			}),
		}
	}
}

/// A single product line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
	/// Catalog identity of the product.
	pub product_id: String,
	/// Display name at the time it was added.
	pub name: String,
	/// Unit price.
	pub price: Decimal,
	/// Number of units.
	pub quantity: u32,
	/// Venue the product is sold at.
	pub venue: Venue,
	/// Optional image reference.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image: Option<String>,
}

impl LineItem {
	/// `price * quantity`, or `None` when the product overflows.
	pub fn line_total(&self) -> Option<Decimal> {
		self.price.checked_mul(Decimal::from(self.quantity))
	}
}

/// Sum of `price * quantity` over `items`.
pub fn compute_total(items: &[LineItem]) -> Result<Decimal, TotalOverflow> {
	items.iter().try_fold(Decimal::ZERO, |total, item| {
		item.line_total()
			.and_then(|line| total.checked_add(line))
			.ok_or(TotalOverflow)
	})
}

/// The single order entity. A cart is an order in [`OrderStatus::Cart`].
///
/// `items` and `total` are only reachable through methods so that every write
/// to the items co-writes the total. Item lists whose total overflows are
/// refused and leave the order untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Store-assigned identifier. Empty until inserted.
	pub id: String,
	/// Counter token such as `MED-123`. `None` while in cart.
	pub token: Option<String>,
	/// Owning user, absent for walk-in orders entered by staff.
	pub owner: Option<OwnerId>,
	/// Serving venue, frozen once the order leaves the cart.
	pub venue: Venue,
	items: Vec<LineItem>,
	total: Decimal,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Name shown on the staff queue.
	pub client_name: String,
	#[serde(default)]
	pub client_phone: Option<String>,
	#[serde(default)]
	pub table_number: Option<String>,
	/// Sequential per-venue reference such as `MED-1004`, assigned at placement.
	#[serde(default)]
	pub display_id: Option<String>,
	/// Milliseconds since the Unix epoch. Reset when the cart is checked out.
	pub created_at: u64,
	/// Milliseconds since the Unix epoch.
	pub updated_at: u64,
}

impl Order {
	/// Builds a fresh cart for `owner`. The venue is a placeholder until checkout.
	pub fn new_cart(
		owner: OwnerId,
		items: Vec<LineItem>,
		client_name: String,
		now: u64,
	) -> Result<Self, TotalOverflow> {
		let total = compute_total(&items)?;
		Ok(Self {
			id: String::new(),
			token: None,
			owner: Some(owner),
			venue: Venue::default(),
			items,
			total,
			status: OrderStatus::Cart,
			client_name,
			client_phone: None,
			table_number: None,
			display_id: None,
			created_at: now,
			updated_at: now,
		})
	}

	/// Builds an order that starts directly in [`OrderStatus::Pending`].
	pub fn new_pending(
		owner: Option<OwnerId>,
		venue: Venue,
		items: Vec<LineItem>,
		client_name: String,
		token: String,
		now: u64,
	) -> Result<Self, TotalOverflow> {
		let total = compute_total(&items)?;
		Ok(Self {
			id: String::new(),
			token: Some(token),
			owner,
			venue,
			items,
			total,
			status: OrderStatus::Pending,
			client_name,
			client_phone: None,
			table_number: None,
			display_id: None,
			created_at: now,
			updated_at: now,
		})
	}

	pub fn items(&self) -> &[LineItem] {
		&self.items
	}

	pub fn total(&self) -> Decimal {
		self.total
	}

	/// Replaces the line items and recomputes the total.
	pub fn set_items(&mut self, items: Vec<LineItem>) -> Result<(), TotalOverflow> {
		self.total = compute_total(&items)?;
		self.items = items;
		Ok(())
	}

	/// Removes every line item and zeroes the total.
	pub fn clear_items(&mut self) {
		self.items.clear();
		self.total = Decimal::ZERO;
	}

	pub fn is_cart(&self) -> bool {
		self.status == OrderStatus::Cart
	}
}

impl Record for Order {
	const TABLE: StorageKey = StorageKey::Orders;

	fn id(&self) -> &str {
		&self.id
	}

	fn assign_id(&mut self, id: String) {
		self.id = id;
	}

	/// At most one cart per owner.
	fn conflicts_with(&self, other: &Self) -> bool {
		self.is_cart() && other.is_cart() && self.owner.is_some() && self.owner == other.owner
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(name: &str, price: i64, quantity: u32, venue: Venue) -> LineItem {
		LineItem {
			product_id: format!("p-{}", name.to_lowercase()),
			name: name.to_string(),
			price: Decimal::from(price),
			quantity,
			venue,
			image: None,
		}
	}

	#[test]
	fn test_total_tracks_items() {
		let mut cart = Order::new_cart(
			OwnerId::new("u1"),
			vec![item("Tea", 20, 2, Venue::Medical)],
			"Asha".into(),
			1,
		)
		.unwrap();
		assert_eq!(cart.total(), Decimal::from(40));

		cart.set_items(vec![
			item("Tea", 20, 1, Venue::Medical),
			item("Samosa", 15, 3, Venue::Medical),
		])
		.unwrap();
		assert_eq!(cart.total(), Decimal::from(65));

		cart.clear_items();
		assert!(cart.items().is_empty());
		assert_eq!(cart.total(), Decimal::ZERO);
		assert_eq!(cart.status, OrderStatus::Cart);
	}

	#[test]
	fn test_fractional_prices() {
		let items = vec![LineItem {
			price: Decimal::new(1250, 2),
			..item("Coffee", 0, 3, Venue::Bitbites)
		}];
		assert_eq!(compute_total(&items), Ok(Decimal::new(3750, 2)));
	}

	#[test]
	fn test_overflowing_total_is_refused() {
		let huge = LineItem {
			price: Decimal::MAX,
			..item("Gold", 0, 2, Venue::Medical)
		};
		assert_eq!(compute_total(&[huge.clone()]), Err(TotalOverflow));
		assert!(Order::new_cart(OwnerId::new("u1"), vec![huge.clone()], "A".into(), 1).is_err());

		// Each line fits, the sum does not.
		let single = LineItem {
			quantity: 1,
			..huge.clone()
		};
		assert_eq!(compute_total(&[single.clone(), single]), Err(TotalOverflow));

		let mut cart = Order::new_cart(
			OwnerId::new("u1"),
			vec![item("Tea", 20, 1, Venue::Medical)],
			"A".into(),
			1,
		)
		.unwrap();
		assert_eq!(cart.set_items(vec![huge]), Err(TotalOverflow));
		assert_eq!(cart.items().len(), 1);
		assert_eq!(cart.total(), Decimal::from(20));
	}

	#[test]
	fn test_cart_conflicts_only_with_same_owner_cart() {
		let a = Order::new_cart(OwnerId::new("u1"), vec![], "A".into(), 1).unwrap();
		let b = Order::new_cart(OwnerId::new("u1"), vec![], "A".into(), 2).unwrap();
		let other = Order::new_cart(OwnerId::new("u2"), vec![], "B".into(), 3).unwrap();
		assert!(a.conflicts_with(&b));
		assert!(!a.conflicts_with(&other));

		let mut placed = b.clone();
		placed.status = OrderStatus::Pending;
		assert!(!a.conflicts_with(&placed));

		let walk_in =
			Order::new_pending(None, Venue::Medical, vec![], "W".into(), "MED-100".into(), 4).unwrap();
		assert!(!walk_in.conflicts_with(&walk_in.clone()));
	}

	#[test]
	fn test_status_wire_names() {
		for status in [
			OrderStatus::Cart,
			OrderStatus::Pending,
			OrderStatus::Preparing,
			OrderStatus::Ready,
			OrderStatus::Completed,
			OrderStatus::Cancelled,
		] {
			let json = serde_json::to_value(status).unwrap();
			assert_eq!(json, serde_json::Value::String(status.to_string()));
			assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
		}
		assert!("shipped".parse::<OrderStatus>().is_err());
	}

	#[test]
	fn test_status_partitions() {
		assert!(OrderStatus::Ready.is_active());
		assert!(!OrderStatus::Cart.is_active());
		assert!(OrderStatus::Cancelled.is_terminal());
		assert!(!OrderStatus::Pending.is_terminal());
	}

	#[test]
	fn test_venue_presentation() {
		assert_eq!(Venue::Medical.token_prefix(), "MED");
		assert_eq!(Venue::Bitbites.token_prefix(), "BIT");
		assert_eq!(Venue::Bitbites.display_name(), "Bit Bites");
		assert_eq!("bitbites".parse::<Venue>().unwrap(), Venue::Bitbites);
		assert_eq!(
			serde_json::to_string(&Venue::Medical).unwrap(),
			"\"medical\""
		);
	}
}
