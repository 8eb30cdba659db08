//! Managed runtime boundary for gch.
//!
//! The collector API table never talks to an interpreter directly. Everything
//! it needs from the embedding runtime goes through [`ManagedRuntime`]: module
//! import by name, attribute lookup, invocation, scalar conversions and the
//! initialize/finalize lifecycle. Backends implement the trait for a concrete
//! runtime (CPython in `gch-python`, an in-process simulator in `gch-sim`).
//!
//! # Handle ownership
//!
//! [`ManagedRuntime::Object`] is an owned reference. Dropping it releases the
//! reference, so a handle stored in a table slot keeps its object alive for as
//! long as the slot is populated. Handles become dangling once the runtime is
//! finalized; such handles must be passed to [`ManagedRuntime::discard`]
//! rather than dropped.

use std::error::Error as StdError;

/// Epoch-scoped operations the collector table requires from a managed runtime.
///
/// Implementations are single-threaded: callers serialize access, and no
/// method is expected to re-enter the table.
pub trait ManagedRuntime {
	/// Owned handle to a runtime object.
	type Object;
	/// Error raised by the runtime, e.g. a pending Python exception.
	type Error: StdError + Send + Sync + 'static;

	/// Returns true between a successful [`Self::initialize`] and the next [`Self::finalize`].
	fn is_initialized(&self) -> bool;

	/// Starts a new runtime epoch. No-op when already initialized.
	fn initialize(&self) -> Result<(), Self::Error>;

	/// Tears the runtime down. Every handle issued before this call dangles afterwards.
	fn finalize(&self) -> Result<(), Self::Error>;

	/// Imports a module by name, returning a new reference.
	fn import_module(&self, name: &str) -> Result<Self::Object, Self::Error>;

	/// Looks up `name` on `object`, returning a new reference.
	fn get_attr(&self, object: &Self::Object, name: &str) -> Result<Self::Object, Self::Error>;

	/// Invokes `callable` with positional integer arguments, returning a new reference.
	fn call(&self, callable: &Self::Object, args: &[i64]) -> Result<Self::Object, Self::Error>;

	/// Converts an integral object to `i64`.
	fn extract_int(&self, object: &Self::Object) -> Result<i64, Self::Error>;

	/// Converts a boolean object. Non-boolean objects are rejected.
	fn extract_bool(&self, object: &Self::Object) -> Result<bool, Self::Error>;

	/// Converts an integral object to an unsigned flag value, masking rather than
	/// rejecting out-of-range values.
	fn extract_flag(&self, object: &Self::Object) -> Result<u64, Self::Error>;

	/// Current ownership count of `object` as the runtime sees it.
	fn ref_count(&self, object: &Self::Object) -> usize;

	/// Disposes of a handle issued in a finished epoch without releasing it
	/// through the runtime.
	fn discard(&self, object: Self::Object) {
		drop(object);
	}
}
