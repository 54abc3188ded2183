//! Small helpers shared across the workspace.

pub mod formatting;
pub mod helpers;

pub use formatting::truncate_id;
pub use helpers::now_millis;
