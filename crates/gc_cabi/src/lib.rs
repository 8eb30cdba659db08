//! C ABI over the collector table, for CPython extension modules.
//!
//! Extensions fetch the versioned [`GchApiV1`] function table once through
//! [`gch_api_v1`] and call through it while holding the GIL. Every entry
//! point follows CPython conventions: on failure the Python exception is set
//! and the documented sentinel is returned.
//!
//! Each thread keeps its own table. Finalizing through [`GchApiV1::finalize`]
//! or reporting an external finalization through
//! [`GchApiV1::on_runtime_finalized`] invalidates the tables of every thread
//! before their next use.

mod entry;

use std::ffi::{c_char, c_int, c_long};

use pyo3::ffi::{PyObject, Py_ssize_t};

pub const GCH_C_ABI_VERSION: u32 = 1;

/// Index of a collector debug flag.
pub type GchDebugFlag = c_int;

pub const GCH_DEBUG_STATS: GchDebugFlag = 0;
pub const GCH_DEBUG_COLLECTABLE: GchDebugFlag = 1;
pub const GCH_DEBUG_UNCOLLECTABLE: GchDebugFlag = 2;
pub const GCH_DEBUG_SAVEALL: GchDebugFlag = 3;
pub const GCH_DEBUG_LEAK: GchDebugFlag = 4;

/// Collector entry points, version 1.
///
/// Status-returning functions return `0` on success and `-1` with an
/// exception set on failure, unless noted otherwise.
#[repr(C)]
pub struct GchApiV1 {
	/// `size_of::<GchApiV1>()` in the library that built the table.
	pub struct_size: usize,
	pub abi_version: u32,
	/// Imports the `gc` module into the table if needed.
	pub unique_import: extern "C" fn() -> c_int,
	/// Resolves `gc.<name>` into `*slot` when `*slot` is NULL, storing a new
	/// reference. A non-NULL `*slot` is left untouched. The caller owns the
	/// slot and must reset it to NULL, without a decref, once the interpreter
	/// is finalized.
	pub member_unique_import: unsafe extern "C" fn(name: *const c_char, slot: *mut *mut PyObject) -> c_int,
	/// `1` if the module is cached, `0` if not.
	pub is_imported: extern "C" fn() -> c_int,
	pub enable: extern "C" fn() -> c_int,
	pub disable: extern "C" fn() -> c_int,
	/// `1` if enabled, `0` if disabled, `-1` on failure.
	pub isenabled: extern "C" fn() -> c_int,
	/// New reference to the result of `gc.collect(generation)`; `-1` collects
	/// every generation. NULL on failure.
	pub collect: extern "C" fn(generation: c_long) -> *mut PyObject,
	/// Number of unreachable objects found, or `-1` on failure.
	pub collect_count: extern "C" fn(generation: c_long) -> Py_ssize_t,
	/// Stores the flag's value in `*out`. Any value, zero included, is valid.
	pub read_flag: unsafe extern "C" fn(flag: GchDebugFlag, out: *mut u64) -> c_int,
	/// Borrowed reference to `gc.garbage`, or NULL on failure.
	pub garbage: extern "C" fn() -> *mut PyObject,
	/// Borrowed reference to `gc.callbacks`, or NULL on failure.
	pub callbacks: extern "C" fn() -> *mut PyObject,
	/// Finalizes the interpreter and invalidates every table. Returns the
	/// `Py_FinalizeEx` status; no exception can be set afterwards.
	pub finalize: extern "C" fn() -> c_int,
	/// Invalidates every table after the interpreter was finalized elsewhere.
	pub on_runtime_finalized: extern "C" fn(),
}

pub static GCH_API_V1: GchApiV1 = GchApiV1 {
	struct_size: std::mem::size_of::<GchApiV1>(),
	abi_version: GCH_C_ABI_VERSION,
	unique_import: entry::gch_unique_import,
	member_unique_import: entry::gch_member_unique_import,
	is_imported: entry::gch_is_imported,
	enable: entry::gch_enable,
	disable: entry::gch_disable,
	isenabled: entry::gch_isenabled,
	collect: entry::gch_collect,
	collect_count: entry::gch_collect_count,
	read_flag: entry::gch_read_flag,
	garbage: entry::gch_garbage,
	callbacks: entry::gch_callbacks,
	finalize: entry::gch_finalize,
	on_runtime_finalized: entry::gch_on_runtime_finalized,
};

/// Returns the process-wide function table. Never NULL.
#[unsafe(no_mangle)]
pub extern "C" fn gch_api_v1() -> *const GchApiV1 {
	&GCH_API_V1
}
