//! Collector API table for an embedded managed runtime.
//!
//! The runtime's `gc` module has no native entry points, so [`GcApi`] imports
//! it and the members it needs on first use, caches the handles in a typed
//! [`ApiTable`], and calls through them afterwards:
//!
//! ```ignore
//! let mut api = GcApi::new(runtime);
//! api.disable()?;
//! // ... allocation-heavy work ...
//! api.enable()?;
//! let found = api.collect_count(Generation::All)?;
//! api.finalize()?;
//! ```
//!
//! # Lifecycle
//!
//! Cached handles are valid for one runtime epoch. Finalize through
//! [`GcApi::finalize`], or call [`GcApi::on_runtime_finalized`] immediately
//! after finalizing the runtime yourself; the next operation after
//! reinitialization then resolves fresh handles. No operation may run before
//! the runtime is initialized.
//!
//! # Threading
//!
//! The table is single-threaded. Mutating operations take `&mut self`, and
//! [`gc_api!`] tables are thread-local.

mod config;
mod error;
mod import;
mod lifecycle;
mod ops;
mod shared;
mod table;

use std::fmt;

pub use config::{ApiConfig, ConfigError, DEFAULT_MODULE};
pub use error::{Error, Result, RuntimeSource};
pub use gch_runtime::ManagedRuntime;
pub use ops::Generation;
pub use shared::{SharedGcApi, with_api};
pub use table::{ApiTable, DebugFlag, FlagCache, Member, MemberSlots, Slot};

/// Collector API bound to one managed runtime.
pub struct GcApi<R: ManagedRuntime> {
	runtime: R,
	config: ApiConfig,
	table: ApiTable<R::Object>,
	epoch: u64,
}

impl<R: ManagedRuntime> fmt::Debug for GcApi<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GcApi")
			.field("config", &self.config)
			.field("table", &self.table)
			.field("epoch", &self.epoch)
			.finish_non_exhaustive()
	}
}

impl<R: ManagedRuntime> GcApi<R> {
	/// Creates an empty table bound to the default `gc` module.
	pub fn new(runtime: R) -> Self {
		Self::with_config(runtime, ApiConfig::default())
	}

	pub fn with_config(runtime: R, config: ApiConfig) -> Self {
		Self {
			runtime,
			config,
			table: ApiTable::default(),
			epoch: 0,
		}
	}

	pub fn runtime(&self) -> &R {
		&self.runtime
	}

	pub fn config(&self) -> &ApiConfig {
		&self.config
	}

	/// Read-only view of the cached slots.
	pub fn table(&self) -> &ApiTable<R::Object> {
		&self.table
	}
}
