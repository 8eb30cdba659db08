//! Typed wrappers over the collector module.
//!
//! Each wrapper resolves its member through the unique-import engine, invokes
//! it, and normalizes the result. Nothing is retried; the first failure is
//! returned to the caller.

use std::fmt;

use gch_runtime::ManagedRuntime;

use crate::import::import_member;
use crate::table::{DebugFlag, Member, Slot};
use crate::{Error, GcApi, Result};

/// Collector generation argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
	/// Full collection; the collector is called without arguments.
	All,
	/// Collect exactly this generation (and, by the collector's rules, younger ones).
	Only(i64),
}

impl Generation {
	/// Oldest generation of the collector.
	pub const OLDEST: i64 = 2;

	/// Raw value, `-1` standing for [`Generation::All`].
	pub const fn as_raw(self) -> i64 {
		match self {
			Self::All => -1,
			Self::Only(generation) => generation,
		}
	}

	/// Folds `Only(-1)` into [`Generation::All`], the value `-1` stands for.
	pub const fn normalized(self) -> Self {
		match self {
			Self::Only(-1) => Self::All,
			other => other,
		}
	}

	/// Whether the collector accepts this generation.
	pub const fn is_valid(self) -> bool {
		match self {
			Self::All => true,
			Self::Only(generation) => generation >= 0 && generation <= Self::OLDEST,
		}
	}
}

impl From<i64> for Generation {
	fn from(raw: i64) -> Self {
		if raw == -1 { Self::All } else { Self::Only(raw) }
	}
}

impl fmt::Display for Generation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::All => f.write_str("all"),
			Self::Only(generation) => write!(f, "{generation}"),
		}
	}
}

impl<R: ManagedRuntime> GcApi<R> {
	/// Enables the collector.
	pub fn enable(&mut self) -> Result<()> {
		self.call_discarding(Member::Enable)
	}

	/// Disables the collector.
	pub fn disable(&mut self) -> Result<()> {
		self.call_discarding(Member::Disable)
	}

	/// Whether the collector is enabled.
	pub fn isenabled(&mut self) -> Result<bool> {
		let (runtime, isenabled) = self.resolve(Member::IsEnabled)?;
		let truth = runtime.call(isenabled, &[]).map_err(|source| Error::invocation(Member::IsEnabled.name(), source))?;
		runtime.extract_bool(&truth).map_err(|source| Error::conversion("isenabled() result", source))
	}

	/// Runs a collection and returns the collector's result object (a new
	/// reference holding the number of unreachable objects found).
	///
	/// Generations the collector rejects, such as `333`, fail with
	/// [`Error::Invocation`] unless local validation is enabled.
	pub fn collect(&mut self, generation: impl Into<Generation>) -> Result<R::Object> {
		let generation = generation.into().normalized();
		if self.config.validate_generations && !generation.is_valid() {
			return Err(Error::InvalidGeneration(generation.as_raw()));
		}
		let (runtime, collect) = self.resolve(Member::Collect)?;
		let found = match generation {
			Generation::All => runtime.call(collect, &[]),
			Generation::Only(raw) => runtime.call(collect, &[raw]),
		}
		.map_err(|source| Error::invocation(Member::Collect.name(), source))?;
		tracing::trace!(%generation, "collection finished");
		Ok(found)
	}

	/// Like [`Self::collect`], converting the result to a count.
	pub fn collect_count(&mut self, generation: impl Into<Generation>) -> Result<usize> {
		let found = self.collect(generation)?;
		let raw = self
			.runtime
			.extract_int(&found)
			.map_err(|source| Error::conversion("collect() result", source))?;
		usize::try_from(raw).map_err(|source| Error::conversion("collect() result", source))
	}

	/// Reads a debug flag, converting it once and serving later reads from the cache.
	///
	/// The attribute handle is released right after conversion; only the
	/// scalar survives. A failed read caches nothing, so the next call retries.
	pub fn read_flag(&mut self, flag: DebugFlag) -> Result<u64> {
		if let Some(value) = self.table.flags.get(flag) {
			return Ok(value);
		}
		let Self { runtime, config, table, .. } = self;
		let mut scratch = Slot::empty();
		let handle = import_member(&*runtime, &config.module, &mut table.module, flag.name(), &mut scratch)?;
		let value = runtime.extract_flag(handle).map_err(|source| Error::conversion(flag.name(), source))?;
		table.flags.set(flag, value);
		tracing::debug!(flag = flag.name(), value, "cached collector flag");
		Ok(value)
	}

	/// Borrowed reference to the collector's list of uncollectable objects.
	pub fn garbage(&mut self) -> Result<&R::Object> {
		self.resolve(Member::Garbage).map(|(_, garbage)| garbage)
	}

	/// Borrowed reference to the collector's callback list.
	pub fn callbacks(&mut self) -> Result<&R::Object> {
		self.resolve(Member::Callbacks).map(|(_, callbacks)| callbacks)
	}

	fn call_discarding(&mut self, member: Member) -> Result<()> {
		let (runtime, callable) = self.resolve(member)?;
		runtime.call(callable, &[]).map(drop).map_err(|source| Error::invocation(member.name(), source))
	}
}
