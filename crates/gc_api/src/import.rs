//! Unique-import engine.
//!
//! Resolution is idempotent: a populated slot is returned as-is, without
//! touching the runtime or the handle's ownership count.

use gch_runtime::ManagedRuntime;

use crate::table::{Member, Slot};
use crate::{Error, GcApi, Result};

/// Ensures `slot` holds the module `name`.
pub(crate) fn import_module<'s, R: ManagedRuntime>(runtime: &R, name: &str, slot: &'s mut Slot<R::Object>) -> Result<&'s R::Object> {
	if !runtime.is_initialized() {
		return Err(Error::NotInitialized);
	}
	slot.get_or_try_resolve(|| {
		let module = runtime.import_module(name).map_err(|source| Error::module_unavailable(name, source))?;
		tracing::debug!(module = name, "imported collector module");
		Ok(module)
	})
}

/// Ensures the module is imported, then that `dest` holds its attribute `member`.
///
/// A module failure short-circuits before any attribute lookup.
pub(crate) fn import_member<'s, R: ManagedRuntime>(
	runtime: &R,
	module_name: &str,
	module: &mut Slot<R::Object>,
	member: &str,
	dest: &'s mut Slot<R::Object>,
) -> Result<&'s R::Object> {
	let module = import_module(runtime, module_name, module)?;
	if dest.is_resolved() {
		tracing::trace!(module = module_name, member, "member already resolved");
	}
	dest.get_or_try_resolve(|| {
		let handle = runtime.get_attr(module, member).map_err(|source| Error::member_unavailable(member, source))?;
		tracing::debug!(module = module_name, member, "resolved collector member");
		Ok(handle)
	})
}

impl<R: ManagedRuntime> GcApi<R> {
	/// Imports the collector module if it is not cached yet.
	///
	/// Repeated calls return the cached handle without re-importing and
	/// without changing its ownership count.
	pub fn unique_import(&mut self) -> Result<&R::Object> {
		import_module(&self.runtime, &self.config.module, &mut self.table.module)
	}

	/// Imports the module if needed, then resolves `name` into a caller-owned `slot`.
	///
	/// `slot` must be empty or already hold `name`; a populated slot is
	/// returned untouched. Caller-owned slots are outside the table, so the
	/// caller must drop them when the runtime is finalized.
	pub fn member_unique_import<'s>(&mut self, name: &str, slot: &'s mut Slot<R::Object>) -> Result<&'s R::Object> {
		import_member(&self.runtime, &self.config.module, &mut self.table.module, name, slot)
	}

	/// Resolves `member` into its table slot, handing back the runtime alongside it.
	pub(crate) fn resolve(&mut self, member: Member) -> Result<(&R, &R::Object)> {
		let Self { runtime, config, table, .. } = self;
		let handle = import_member(&*runtime, &config.module, &mut table.module, member.name(), table.members.get_mut(member))?;
		Ok((&*runtime, handle))
	}
}
