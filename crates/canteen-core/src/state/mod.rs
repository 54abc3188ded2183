//! State management for orders.
//!
//! Holds the status machine that validates and applies staff-initiated
//! transitions.

pub mod order;

pub use order::OrderStateMachine;
