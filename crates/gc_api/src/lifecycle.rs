//! Runtime lifecycle and table invalidation.
//!
//! Handles cached in one epoch dangle once the runtime is finalized. The
//! table must therefore be invalidated on every finalize path: either through
//! [`GcApi::finalize`], or by calling [`GcApi::on_runtime_finalized`] right
//! after the host finalized the runtime by other means. Nothing else empties
//! a populated slot.

use gch_runtime::ManagedRuntime;

use crate::{Error, GcApi, Result};

impl<R: ManagedRuntime> GcApi<R> {
	/// Whether the collector module is cached in this epoch.
	pub fn is_imported(&self) -> bool {
		self.table.module.is_resolved()
	}

	/// Number of invalidations since the table was created.
	pub fn epoch(&self) -> u64 {
		self.epoch
	}

	/// Starts a runtime epoch through the owned runtime.
	pub fn initialize(&mut self) -> Result<()> {
		self.runtime.initialize().map_err(|source| Error::Initialize { source: Box::new(source) })
	}

	/// Empties every runtime-handle slot and every cached flag.
	///
	/// Cleared handles go to [`ManagedRuntime::discard`], never through a
	/// regular release, since the runtime that issued them is gone.
	pub fn on_runtime_finalized(&mut self) {
		let handles = self.table.take_handles();
		let cleared = handles.len();
		for handle in handles {
			self.runtime.discard(handle);
		}
		self.table.flags.clear();
		self.epoch += 1;
		tracing::debug!(epoch = self.epoch, cleared, "collector table invalidated");
	}

	/// Finalizes the runtime, then invalidates the table.
	///
	/// Invalidation happens even when finalization reports an error, because
	/// the runtime has torn down either way.
	pub fn finalize(&mut self) -> Result<()> {
		let finalized = self.runtime.finalize();
		self.on_runtime_finalized();
		finalized.map_err(|source| {
			tracing::warn!(error = %source, "runtime finalization reported an error");
			Error::Finalize { source: Box::new(source) }
		})
	}
}
