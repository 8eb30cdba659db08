use std::cell::{Cell, RefCell};
use std::ffi::{CStr, c_char, c_int, c_long};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use gch_api::{DebugFlag, Error, GcApi, Generation, ManagedRuntime, Result, SharedGcApi, Slot};
use gch_python::PythonRuntime;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::ffi::{self, PyObject};
use pyo3::prelude::*;

use crate::GchDebugFlag;

/// Finalizations reported through this library, process-wide.
static FINALIZATIONS: AtomicU64 = AtomicU64::new(0);

/// One thread's collector table, plus the value of [`FINALIZATIONS`] it was
/// last synced to.
struct ThreadTable {
	api: SharedGcApi<PythonRuntime>,
	seen: Cell<u64>,
}

impl ThreadTable {
	fn new() -> Self {
		Self {
			api: RefCell::new(GcApi::new(PythonRuntime::new())),
			seen: Cell::new(FINALIZATIONS.load(Ordering::Acquire)),
		}
	}

	fn is_stale(&self) -> bool {
		self.seen.get() != FINALIZATIONS.load(Ordering::Acquire)
	}
}

impl Drop for ThreadTable {
	fn drop(&mut self) {
		// Handles from a finalized interpreter must not be released into the next one.
		if self.is_stale() {
			self.api.get_mut().on_runtime_finalized();
		}
	}
}

thread_local! {
	static GCH_API: ThreadTable = ThreadTable::new();
}

/// Runs `f` on this thread's table, first invalidating it if the interpreter
/// was finalized since the thread last used it.
fn with_table<T>(f: impl FnOnce(&mut GcApi<PythonRuntime>) -> Result<T>) -> Result<T> {
	GCH_API.with(|table| {
		let mut api = table.api.try_borrow_mut().map_err(|_| Error::Reentrant)?;
		if table.is_stale() {
			if !api.table().is_empty() {
				api.on_runtime_finalized();
			}
			table.seen.set(FINALIZATIONS.load(Ordering::Acquire));
		}
		f(&mut *api)
	})
}

fn mark_finalized() {
	let finalized = FINALIZATIONS.fetch_add(1, Ordering::AcqRel) + 1;
	GCH_API.with(|table| table.seen.set(finalized));
	tracing::debug!(finalized, "collector tables invalidated");
}

/// Sets `err` as the current Python exception.
fn restore(err: PyErr) {
	if !PythonRuntime::new().is_initialized() {
		tracing::warn!(error = %err, "collector call failed with no interpreter to report to");
		return;
	}
	Python::with_gil(|py| err.restore(py));
}

fn raise(err: Error) {
	tracing::debug!(error = %err, "collector call failed");
	match err.into_source::<PyErr>() {
		Ok(cause) => restore(cause),
		Err(err @ Error::InvalidGeneration(_)) => restore(PyValueError::new_err(err.to_string())),
		Err(Error::NotInitialized) => {
			tracing::warn!("collector table used without an initialized interpreter");
		}
		Err(err) => restore(PyRuntimeError::new_err(err.to_string())),
	}
}

fn status(result: Result<()>) -> c_int {
	match result {
		Ok(()) => 0,
		Err(err) => {
			raise(err);
			-1
		}
	}
}

fn truth(result: Result<bool>) -> c_int {
	match result {
		Ok(value) => c_int::from(value),
		Err(err) => {
			raise(err);
			-1
		}
	}
}

fn object(result: Result<*mut PyObject>) -> *mut PyObject {
	result.unwrap_or_else(|err| {
		raise(err);
		ptr::null_mut()
	})
}

fn generation(raw: c_long) -> Generation {
	Generation::from(i64::from(raw))
}

pub(crate) extern "C" fn gch_unique_import() -> c_int {
	status(with_table(|api| api.unique_import().map(drop)))
}

/// # Safety
/// `name` must be NULL or a NUL-terminated string; `slot` must be NULL or
/// point to a `PyObject *` that is NULL or holds the member `name`.
pub(crate) unsafe extern "C" fn gch_member_unique_import(name: *const c_char, slot: *mut *mut PyObject) -> c_int {
	if name.is_null() || slot.is_null() {
		restore(PyValueError::new_err("member name and slot must not be NULL"));
		return -1;
	}
	// SAFETY: non-null and NUL-terminated per the caller contract.
	let Ok(name) = unsafe { CStr::from_ptr(name) }.to_str() else {
		restore(PyValueError::new_err("member name is not valid UTF-8"));
		return -1;
	};
	// SAFETY: non-null per the check above.
	let populated = unsafe { !(*slot).is_null() };

	let resolved = with_table(|api| {
		if populated {
			return api.unique_import().map(|_| None);
		}
		let mut member = Slot::empty();
		api.member_unique_import(name, &mut member)?;
		Ok(member.into_inner())
	});
	match resolved {
		Ok(Some(handle)) => {
			// SAFETY: non-null per the check above; ownership of the new
			// reference moves to the caller's slot.
			unsafe { *slot = handle.into_ptr() };
			0
		}
		Ok(None) => 0,
		Err(err) => {
			raise(err);
			-1
		}
	}
}

pub(crate) extern "C" fn gch_is_imported() -> c_int {
	truth(with_table(|api| Ok(api.is_imported())))
}

pub(crate) extern "C" fn gch_enable() -> c_int {
	status(with_table(GcApi::enable))
}

pub(crate) extern "C" fn gch_disable() -> c_int {
	status(with_table(GcApi::disable))
}

pub(crate) extern "C" fn gch_isenabled() -> c_int {
	truth(with_table(GcApi::isenabled))
}

pub(crate) extern "C" fn gch_collect(raw: c_long) -> *mut PyObject {
	object(with_table(|api| api.collect(generation(raw)).map(Py::into_ptr)))
}

pub(crate) extern "C" fn gch_collect_count(raw: c_long) -> ffi::Py_ssize_t {
	let found = with_table(|api| api.collect_count(generation(raw)));
	match found.map(ffi::Py_ssize_t::try_from) {
		Ok(Ok(found)) => found,
		Ok(Err(_)) => {
			restore(PyRuntimeError::new_err("unreachable object count overflows Py_ssize_t"));
			-1
		}
		Err(err) => {
			raise(err);
			-1
		}
	}
}

/// # Safety
/// `out` must be NULL or valid for a write of `u64`.
pub(crate) unsafe extern "C" fn gch_read_flag(flag: GchDebugFlag, out: *mut u64) -> c_int {
	if out.is_null() {
		restore(PyValueError::new_err("flag output pointer must not be NULL"));
		return -1;
	}
	let Some(flag) = usize::try_from(flag).ok().and_then(|index| DebugFlag::ALL.get(index).copied()) else {
		restore(PyValueError::new_err(format!("unknown collector debug flag {flag}")));
		return -1;
	};
	match with_table(|api| api.read_flag(flag)) {
		Ok(value) => {
			// SAFETY: non-null and writable per the caller contract.
			unsafe { out.write(value) };
			0
		}
		Err(err) => {
			raise(err);
			-1
		}
	}
}

pub(crate) extern "C" fn gch_garbage() -> *mut PyObject {
	object(with_table(|api| api.garbage().map(Py::as_ptr)))
}

pub(crate) extern "C" fn gch_callbacks() -> *mut PyObject {
	object(with_table(|api| api.callbacks().map(Py::as_ptr)))
}

pub(crate) extern "C" fn gch_finalize() -> c_int {
	let finalized = with_table(GcApi::finalize);
	mark_finalized();
	match finalized {
		Ok(()) => 0,
		Err(err) => {
			tracing::warn!(error = %err, "interpreter finalization failed");
			-1
		}
	}
}

pub(crate) extern "C" fn gch_on_runtime_finalized() {
	if let Err(err) = with_table(|api| {
		api.on_runtime_finalized();
		Ok(())
	}) {
		tracing::warn!(error = %err, "collector table could not be invalidated");
	}
	mark_finalized();
}
