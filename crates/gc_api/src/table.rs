//! Typed slots of the collector API table.
//!
//! Every importable entity has a named home: the module handle, one
//! [`Slot`] per [`Member`], and one cached scalar per [`DebugFlag`]. Handles
//! live in slots only for the epoch they were resolved in; the invalidator in
//! [`crate::lifecycle`] is the only code that empties a populated slot.

use std::fmt;

/// A lazily-filled runtime handle.
pub struct Slot<O> {
	handle: Option<O>,
}

impl<O> Default for Slot<O> {
	fn default() -> Self {
		Self::empty()
	}
}

impl<O> fmt::Debug for Slot<O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Slot").field("resolved", &self.is_resolved()).finish()
	}
}

impl<O> Slot<O> {
	/// An unresolved slot.
	pub const fn empty() -> Self {
		Self { handle: None }
	}

	pub const fn is_resolved(&self) -> bool {
		self.handle.is_some()
	}

	pub fn get(&self) -> Option<&O> {
		self.handle.as_ref()
	}

	/// Returns the cached handle, running `resolve` only if the slot is empty.
	///
	/// A failed resolution leaves the slot empty.
	pub fn get_or_try_resolve<E>(&mut self, resolve: impl FnOnce() -> Result<O, E>) -> Result<&O, E> {
		let handle = match &mut self.handle {
			Some(handle) => handle,
			empty => empty.insert(resolve()?),
		};
		Ok(&*handle)
	}

	/// Consumes a caller-owned slot, handing over its handle.
	pub fn into_inner(self) -> Option<O> {
		self.handle
	}

	pub(crate) fn take(&mut self) -> Option<O> {
		self.handle.take()
	}
}

/// Callable or attribute members resolved from the collector module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
	Enable,
	Disable,
	IsEnabled,
	Collect,
	/// `gc.garbage`, handed out as a borrowed reference.
	Garbage,
	/// `gc.callbacks`, handed out as a borrowed reference.
	Callbacks,
}

impl Member {
	pub const ALL: [Self; 6] = [Self::Enable, Self::Disable, Self::IsEnabled, Self::Collect, Self::Garbage, Self::Callbacks];

	/// Attribute name on the collector module.
	pub const fn name(self) -> &'static str {
		match self {
			Self::Enable => "enable",
			Self::Disable => "disable",
			Self::IsEnabled => "isenabled",
			Self::Collect => "collect",
			Self::Garbage => "garbage",
			Self::Callbacks => "callbacks",
		}
	}
}

impl fmt::Display for Member {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Debug flag constants published by the collector module.
///
/// Values are read from the runtime rather than hard-coded, so they stay
/// correct if the runtime renumbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugFlag {
	Stats,
	Collectable,
	Uncollectable,
	SaveAll,
	Leak,
}

impl DebugFlag {
	pub const ALL: [Self; 5] = [Self::Stats, Self::Collectable, Self::Uncollectable, Self::SaveAll, Self::Leak];

	/// Attribute name on the collector module.
	pub const fn name(self) -> &'static str {
		match self {
			Self::Stats => "DEBUG_STATS",
			Self::Collectable => "DEBUG_COLLECTABLE",
			Self::Uncollectable => "DEBUG_UNCOLLECTABLE",
			Self::SaveAll => "DEBUG_SAVEALL",
			Self::Leak => "DEBUG_LEAK",
		}
	}

	/// Looks a flag up by its attribute name, e.g. `"DEBUG_SAVEALL"`.
	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|flag| flag.name() == name)
	}
}

impl fmt::Display for DebugFlag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Per-member handle slots.
pub struct MemberSlots<O> {
	enable: Slot<O>,
	disable: Slot<O>,
	isenabled: Slot<O>,
	collect: Slot<O>,
	garbage: Slot<O>,
	callbacks: Slot<O>,
}

impl<O> Default for MemberSlots<O> {
	fn default() -> Self {
		Self {
			enable: Slot::empty(),
			disable: Slot::empty(),
			isenabled: Slot::empty(),
			collect: Slot::empty(),
			garbage: Slot::empty(),
			callbacks: Slot::empty(),
		}
	}
}

impl<O> MemberSlots<O> {
	pub fn get(&self, member: Member) -> &Slot<O> {
		match member {
			Member::Enable => &self.enable,
			Member::Disable => &self.disable,
			Member::IsEnabled => &self.isenabled,
			Member::Collect => &self.collect,
			Member::Garbage => &self.garbage,
			Member::Callbacks => &self.callbacks,
		}
	}

	pub(crate) fn get_mut(&mut self, member: Member) -> &mut Slot<O> {
		match member {
			Member::Enable => &mut self.enable,
			Member::Disable => &mut self.disable,
			Member::IsEnabled => &mut self.isenabled,
			Member::Collect => &mut self.collect,
			Member::Garbage => &mut self.garbage,
			Member::Callbacks => &mut self.callbacks,
		}
	}
}

/// Converted flag values. Only the scalar is kept, never the runtime handle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlagCache {
	stats: Option<u64>,
	collectable: Option<u64>,
	uncollectable: Option<u64>,
	save_all: Option<u64>,
	leak: Option<u64>,
}

impl FlagCache {
	pub fn get(&self, flag: DebugFlag) -> Option<u64> {
		*self.entry(flag)
	}

	pub(crate) fn set(&mut self, flag: DebugFlag, value: u64) {
		*self.entry_mut(flag) = Some(value);
	}

	pub(crate) fn clear(&mut self) {
		*self = Self::default();
	}

	fn entry(&self, flag: DebugFlag) -> &Option<u64> {
		match flag {
			DebugFlag::Stats => &self.stats,
			DebugFlag::Collectable => &self.collectable,
			DebugFlag::Uncollectable => &self.uncollectable,
			DebugFlag::SaveAll => &self.save_all,
			DebugFlag::Leak => &self.leak,
		}
	}

	fn entry_mut(&mut self, flag: DebugFlag) -> &mut Option<u64> {
		match flag {
			DebugFlag::Stats => &mut self.stats,
			DebugFlag::Collectable => &mut self.collectable,
			DebugFlag::Uncollectable => &mut self.uncollectable,
			DebugFlag::SaveAll => &mut self.save_all,
			DebugFlag::Leak => &mut self.leak,
		}
	}
}

/// The collector API table: module handle, member handles and flag values.
pub struct ApiTable<O> {
	pub(crate) module: Slot<O>,
	pub(crate) members: MemberSlots<O>,
	pub(crate) flags: FlagCache,
}

impl<O> Default for ApiTable<O> {
	fn default() -> Self {
		Self {
			module: Slot::empty(),
			members: MemberSlots::default(),
			flags: FlagCache::default(),
		}
	}
}

impl<O> fmt::Debug for ApiTable<O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let resolved: Vec<_> = Member::ALL.into_iter().filter(|m| self.members.get(*m).is_resolved()).collect();
		f.debug_struct("ApiTable")
			.field("module", &self.module)
			.field("resolved_members", &resolved)
			.field("flags", &self.flags)
			.finish()
	}
}

impl<O> ApiTable<O> {
	pub fn module(&self) -> &Slot<O> {
		&self.module
	}

	pub fn member(&self, member: Member) -> &Slot<O> {
		self.members.get(member)
	}

	pub fn cached_flag(&self, flag: DebugFlag) -> Option<u64> {
		self.flags.get(flag)
	}

	/// True when no runtime handle and no flag value is cached.
	pub fn is_empty(&self) -> bool {
		!self.module.is_resolved()
			&& Member::ALL.into_iter().all(|m| !self.members.get(m).is_resolved())
			&& DebugFlag::ALL.into_iter().all(|f| self.flags.get(f).is_none())
	}

	/// Empties every runtime-handle slot, returning the handles that were cached.
	pub(crate) fn take_handles(&mut self) -> Vec<O> {
		let mut handles: Vec<O> = Member::ALL.into_iter().filter_map(|m| self.members.get_mut(m).take()).collect();
		handles.extend(self.module.take());
		handles
	}
}
