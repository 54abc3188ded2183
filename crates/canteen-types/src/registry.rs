//! Registry trait for self-registering implementations.
//!
//! Pluggable backends implement this trait to declare the name they are
//! configured under together with their factory function.

/// Base trait for implementation registries.
///
/// Each storage backend provides a Registry struct implementing this trait,
/// so the service can build its factory map without hard-coding names.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// for example `"file"` for `storage.implementations.file`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
