//! Simulated managed runtime for gch.
//!
//! [`SimRuntime`] is a small single-threaded interpreter stand-in that exposes
//! a `gc` module with the same surface the collector table resolves from
//! CPython: `enable`, `disable`, `isenabled`, `collect`, `garbage`,
//! `callbacks` and the `DEBUG_*` flags. Handles are `Rc`s, so ownership counts
//! are observable through [`ManagedRuntime::ref_count`], and every object is
//! stamped with the epoch that created it so stale handles are caught instead
//! of dereferenced.
//!
//! Faults (missing modules or members, failing calls, replaced attributes, a
//! failing finalize) are configured through [`SimRuntimeBuilder`].

mod collector;
mod object;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use gch_runtime::ManagedRuntime;
use thiserror::Error;

pub use collector::GENERATIONS;
use collector::Collector;
pub use object::{Builtin, SimModule, SimObject, SimRef, SimValue};

/// Name of the simulated collector module.
pub const GC_MODULE: &str = "gc";

/// Debug flag constants published by the simulated `gc` module.
pub const DEBUG_FLAGS: [(&str, i64); 5] = [
	("DEBUG_STATS", 1),
	("DEBUG_COLLECTABLE", 2),
	("DEBUG_UNCOLLECTABLE", 4),
	("DEBUG_SAVEALL", 32),
	("DEBUG_LEAK", 38),
];

/// Exception classes raised by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimErrorKind {
	ImportError,
	AttributeError,
	TypeError,
	ValueError,
	RuntimeError,
	SystemError,
}

impl fmt::Display for SimErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// An exception raised inside the simulated runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SimError {
	pub kind: SimErrorKind,
	pub message: String,
}

impl SimError {
	pub fn new(kind: SimErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}
}

/// Work counters, cumulative across epochs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimStats {
	/// `import_module` calls, including ones served from the module cache.
	pub imports: usize,
	/// `get_attr` calls.
	pub attr_lookups: usize,
	/// `call` invocations.
	pub calls: usize,
}

#[derive(Debug, Default, Clone)]
struct Faults {
	missing_modules: HashSet<String>,
	missing_members: HashSet<String>,
	failing_calls: HashSet<Builtin>,
	attr_overrides: HashMap<String, SimValue>,
	failing_finalize: bool,
}

/// Configures a [`SimRuntime`].
#[derive(Debug, Clone)]
pub struct SimRuntimeBuilder {
	faults: Faults,
	initialized: bool,
}

impl Default for SimRuntimeBuilder {
	fn default() -> Self {
		Self {
			faults: Faults::default(),
			initialized: true,
		}
	}
}

impl SimRuntimeBuilder {
	/// Makes `import_module(name)` fail with `ImportError`.
	pub fn without_module(mut self, name: impl Into<String>) -> Self {
		self.faults.missing_modules.insert(name.into());
		self
	}

	/// Removes an attribute from the `gc` module.
	pub fn without_member(mut self, name: impl Into<String>) -> Self {
		self.faults.missing_members.insert(name.into());
		self
	}

	/// Makes every invocation of `builtin` raise `RuntimeError`.
	pub fn failing_call(mut self, builtin: Builtin) -> Self {
		self.faults.failing_calls.insert(builtin);
		self
	}

	/// Replaces (or adds) a `gc` attribute with `value`.
	pub fn override_attr(mut self, name: impl Into<String>, value: SimValue) -> Self {
		self.faults.attr_overrides.insert(name.into(), value);
		self
	}

	/// Makes `finalize` report failure. Teardown still happens.
	pub fn failing_finalize(mut self) -> Self {
		self.faults.failing_finalize = true;
		self
	}

	/// Builds the runtime without starting the first epoch.
	pub fn uninitialized(mut self) -> Self {
		self.initialized = false;
		self
	}

	pub fn build(self) -> SimRuntime {
		let mut state = SimState {
			initialized: false,
			epoch: 0,
			modules: HashMap::new(),
			constants: None,
			collector: Collector::default(),
			faults: self.faults,
			stats: SimStats::default(),
		};
		if self.initialized {
			state.start_epoch();
		}
		SimRuntime {
			state: Rc::new(RefCell::new(state)),
		}
	}
}

/// Per-epoch singletons, shared by every call that returns them.
#[derive(Debug)]
struct Constants {
	none: SimRef,
	true_: SimRef,
	false_: SimRef,
}

#[derive(Debug)]
struct SimState {
	initialized: bool,
	epoch: u64,
	modules: HashMap<String, SimRef>,
	constants: Option<Constants>,
	collector: Collector,
	faults: Faults,
	stats: SimStats,
}

impl SimState {
	fn start_epoch(&mut self) {
		self.epoch += 1;
		self.initialized = true;
		self.collector = Collector::default();
		self.constants = Some(Constants {
			none: SimObject::new(self.epoch, SimValue::None),
			true_: SimObject::new(self.epoch, SimValue::Bool(true)),
			false_: SimObject::new(self.epoch, SimValue::Bool(false)),
		});
		tracing::debug!(epoch = self.epoch, "sim runtime initialized");
	}

	fn constants(&self) -> Result<&Constants, SimError> {
		self.constants.as_ref().ok_or_else(not_initialized)
	}

	fn ensure_initialized(&self) -> Result<(), SimError> {
		if self.initialized { Ok(()) } else { Err(not_initialized()) }
	}

	fn ensure_live(&self, object: &SimObject) -> Result<(), SimError> {
		self.ensure_initialized()?;
		if object.epoch() != self.epoch {
			return Err(SimError::new(
				SimErrorKind::SystemError,
				format!("stale handle from epoch {} used in epoch {}", object.epoch(), self.epoch),
			));
		}
		Ok(())
	}

	fn new_object(&self, value: SimValue) -> SimRef {
		SimObject::new(self.epoch, value)
	}

	fn build_gc_module(&self) -> SimRef {
		let mut attrs = HashMap::new();
		for builtin in Builtin::ALL {
			attrs.insert(builtin.name().to_string(), self.new_object(SimValue::Builtin(builtin)));
		}
		for list in ["garbage", "callbacks"] {
			attrs.insert(list.to_string(), self.new_object(SimValue::List(RefCell::new(Vec::new()))));
		}
		for (flag, value) in DEBUG_FLAGS {
			attrs.insert(flag.to_string(), self.new_object(SimValue::Int(value)));
		}
		for (name, value) in &self.faults.attr_overrides {
			attrs.insert(name.clone(), self.new_object(value.clone()));
		}
		attrs.retain(|name, _| !self.faults.missing_members.contains(name));
		self.new_object(SimValue::Module(SimModule {
			name: GC_MODULE.to_string(),
			attrs,
		}))
	}

	fn invoke(&mut self, builtin: Builtin, args: &[i64]) -> Result<SimRef, SimError> {
		if self.faults.failing_calls.contains(&builtin) {
			return Err(SimError::new(SimErrorKind::RuntimeError, format!("{builtin}() failed")));
		}
		match builtin {
			Builtin::Enable | Builtin::Disable | Builtin::IsEnabled if !args.is_empty() => Err(SimError::new(
				SimErrorKind::TypeError,
				format!("{builtin}() takes no arguments ({} given)", args.len()),
			)),
			Builtin::Enable => {
				self.collector.set_enabled(true);
				Ok(Rc::clone(&self.constants()?.none))
			}
			Builtin::Disable => {
				self.collector.set_enabled(false);
				Ok(Rc::clone(&self.constants()?.none))
			}
			Builtin::IsEnabled => {
				let constants = self.constants()?;
				let truth = if self.collector.is_enabled() { &constants.true_ } else { &constants.false_ };
				Ok(Rc::clone(truth))
			}
			Builtin::Collect => {
				let generation = match args {
					[] => GENERATIONS - 1,
					&[generation] => usize::try_from(generation)
						.ok()
						.filter(|generation| *generation < GENERATIONS)
						.ok_or_else(|| SimError::new(SimErrorKind::ValueError, "invalid generation"))?,
					_ => {
						return Err(SimError::new(
							SimErrorKind::TypeError,
							format!("collect() takes at most 1 argument ({} given)", args.len()),
						));
					}
				};
				let found = self.collector.collect(generation);
				tracing::trace!(generation, found, "sim collection");
				Ok(self.new_object(SimValue::Int(found as i64)))
			}
		}
	}
}

fn not_initialized() -> SimError {
	SimError::new(SimErrorKind::SystemError, "runtime is not initialized")
}

/// Handle to a simulated runtime. Clones share the same runtime.
#[derive(Debug, Clone)]
pub struct SimRuntime {
	state: Rc<RefCell<SimState>>,
}

impl Default for SimRuntime {
	fn default() -> Self {
		Self::new()
	}
}

impl SimRuntime {
	/// Creates an initialized runtime without faults.
	pub fn new() -> Self {
		Self::builder().build()
	}

	pub fn builder() -> SimRuntimeBuilder {
		SimRuntimeBuilder::default()
	}

	/// Current epoch; `0` before the first initialization.
	pub fn epoch(&self) -> u64 {
		self.state.borrow().epoch
	}

	pub fn stats(&self) -> SimStats {
		self.state.borrow().stats
	}

	pub fn collector_enabled(&self) -> bool {
		self.state.borrow().collector.is_enabled()
	}

	/// Number of collections run on exactly `generation` in this epoch.
	pub fn collections(&self, generation: usize) -> usize {
		self.state.borrow().collector.collections(generation)
	}

	/// Adds `count` unreachable objects to `generation`.
	///
	/// # Panics
	///
	/// Panics if `generation` is not below [`GENERATIONS`].
	pub fn track_unreachable(&self, generation: usize, count: usize) {
		assert!(generation < GENERATIONS, "generation {generation} out of range");
		self.state.borrow_mut().collector.track_unreachable(generation, count);
	}

	/// The module object cached for `name` in this epoch, if imported.
	pub fn cached_module(&self, name: &str) -> Option<SimRef> {
		self.state.borrow().modules.get(name).cloned()
	}
}

impl ManagedRuntime for SimRuntime {
	type Object = SimRef;
	type Error = SimError;

	fn is_initialized(&self) -> bool {
		self.state.borrow().initialized
	}

	fn initialize(&self) -> Result<(), SimError> {
		let mut state = self.state.borrow_mut();
		if !state.initialized {
			state.start_epoch();
		}
		Ok(())
	}

	fn finalize(&self) -> Result<(), SimError> {
		let mut state = self.state.borrow_mut();
		if !state.initialized {
			return Ok(());
		}
		state.initialized = false;
		state.modules.clear();
		state.constants = None;
		tracing::debug!(epoch = state.epoch, "sim runtime finalized");
		if state.faults.failing_finalize {
			return Err(SimError::new(SimErrorKind::RuntimeError, "error during finalization"));
		}
		Ok(())
	}

	fn import_module(&self, name: &str) -> Result<SimRef, SimError> {
		let mut state = self.state.borrow_mut();
		state.ensure_initialized()?;
		state.stats.imports += 1;
		if let Some(module) = state.modules.get(name) {
			return Ok(Rc::clone(module));
		}
		if name != GC_MODULE || state.faults.missing_modules.contains(name) {
			return Err(SimError::new(SimErrorKind::ImportError, format!("No module named '{name}'")));
		}
		let module = state.build_gc_module();
		state.modules.insert(name.to_string(), Rc::clone(&module));
		Ok(module)
	}

	fn get_attr(&self, object: &SimRef, name: &str) -> Result<SimRef, SimError> {
		let mut state = self.state.borrow_mut();
		state.ensure_live(object)?;
		state.stats.attr_lookups += 1;
		match object.value() {
			SimValue::Module(module) => module.attr(name).cloned().ok_or_else(|| {
				SimError::new(
					SimErrorKind::AttributeError,
					format!("module '{}' has no attribute '{name}'", module.name()),
				)
			}),
			other => Err(SimError::new(
				SimErrorKind::AttributeError,
				format!("'{}' object has no attribute '{name}'", other.type_name()),
			)),
		}
	}

	fn call(&self, callable: &SimRef, args: &[i64]) -> Result<SimRef, SimError> {
		let mut state = self.state.borrow_mut();
		state.ensure_live(callable)?;
		state.stats.calls += 1;
		match callable.value() {
			SimValue::Builtin(builtin) => state.invoke(*builtin, args),
			other => Err(SimError::new(
				SimErrorKind::TypeError,
				format!("'{}' object is not callable", other.type_name()),
			)),
		}
	}

	fn extract_int(&self, object: &SimRef) -> Result<i64, SimError> {
		self.state.borrow().ensure_live(object)?;
		match object.value() {
			SimValue::Int(value) => Ok(*value),
			SimValue::Bool(value) => Ok(i64::from(*value)),
			other => Err(SimError::new(
				SimErrorKind::TypeError,
				format!("'{}' object cannot be interpreted as an integer", other.type_name()),
			)),
		}
	}

	fn extract_bool(&self, object: &SimRef) -> Result<bool, SimError> {
		self.state.borrow().ensure_live(object)?;
		match object.value() {
			SimValue::Bool(value) => Ok(*value),
			other => Err(SimError::new(
				SimErrorKind::TypeError,
				format!("expected bool, got '{}'", other.type_name()),
			)),
		}
	}

	fn extract_flag(&self, object: &SimRef) -> Result<u64, SimError> {
		// Two's complement reinterpretation, matching an unsigned-mask conversion.
		self.extract_int(object).map(|value| value as u64)
	}

	fn ref_count(&self, object: &SimRef) -> usize {
		Rc::strong_count(object)
	}
}

#[cfg(test)]
mod tests;
