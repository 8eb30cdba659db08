//! CPython backend for the collector table.
//!
//! [`PythonRuntime`] drives the interpreter embedded in the current process.
//! Every operation acquires the GIL for its own duration, so a table backed by
//! it can be used from any thread that does not already hold the GIL through
//! another `Python::with_gil` scope of its own.
//!
//! The interpreter must be initialized before first use, e.g. with
//! `pyo3::prepare_freethreaded_python()` or [`ManagedRuntime::initialize`].

use std::ffi::c_ulong;
use std::mem;

use gch_runtime::ManagedRuntime;
use pyo3::exceptions::PyRuntimeError;
use pyo3::ffi;
use pyo3::prelude::*;
use pyo3::types::PyTuple;

/// The CPython interpreter embedded in this process.
///
/// There is one interpreter per process, so all values are interchangeable.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonRuntime;

impl PythonRuntime {
	pub const fn new() -> Self {
		Self
	}

	/// Applies reference releases queued while the GIL was not held.
	///
	/// Handles dropped outside a GIL scope are only released on the next GIL
	/// acquisition. Finalization runs this first so no release from the
	/// finished interpreter is left for the next one.
	pub fn release_pending(&self) {
		if self.is_initialized() {
			Python::with_gil(|_| ());
		}
	}
}

impl ManagedRuntime for PythonRuntime {
	type Object = Py<PyAny>;
	type Error = PyErr;

	fn is_initialized(&self) -> bool {
		// SAFETY: callable at any time, with or without an interpreter.
		unsafe { ffi::Py_IsInitialized() != 0 }
	}

	fn initialize(&self) -> PyResult<()> {
		if self.is_initialized() {
			return Ok(());
		}
		// SAFETY: no interpreter exists, so nothing else holds interpreter state.
		unsafe {
			ffi::Py_InitializeEx(0);
			// Release the GIL taken by initialization so `with_gil` can acquire it.
			ffi::PyEval_SaveThread();
		}
		tracing::debug!("python interpreter initialized");
		Ok(())
	}

	fn finalize(&self) -> PyResult<()> {
		if !self.is_initialized() {
			return Ok(());
		}
		self.release_pending();
		// SAFETY: the interpreter is initialized and this thread holds no GIL
		// scope; finalization consumes the state taken here.
		let status = unsafe {
			ffi::PyGILState_Ensure();
			ffi::Py_FinalizeEx()
		};
		tracing::debug!(status, "python interpreter finalized");
		if status < 0 {
			return Err(PyRuntimeError::new_err("error flushing buffered data during finalization"));
		}
		Ok(())
	}

	fn import_module(&self, name: &str) -> PyResult<Py<PyAny>> {
		Python::with_gil(|py| py.import(name).map(|module| module.into_any().unbind()))
	}

	fn get_attr(&self, object: &Py<PyAny>, name: &str) -> PyResult<Py<PyAny>> {
		Python::with_gil(|py| object.bind(py).getattr(name).map(Bound::unbind))
	}

	fn call(&self, callable: &Py<PyAny>, args: &[i64]) -> PyResult<Py<PyAny>> {
		Python::with_gil(|py| {
			let callable = callable.bind(py);
			let result = if args.is_empty() {
				callable.call0()
			} else {
				callable.call1(PyTuple::new(py, args)?)
			};
			result.map(Bound::unbind)
		})
	}

	fn extract_int(&self, object: &Py<PyAny>) -> PyResult<i64> {
		Python::with_gil(|py| object.bind(py).extract())
	}

	fn extract_bool(&self, object: &Py<PyAny>) -> PyResult<bool> {
		Python::with_gil(|py| object.bind(py).extract())
	}

	fn extract_flag(&self, object: &Py<PyAny>) -> PyResult<u64> {
		Python::with_gil(|py| {
			// SAFETY: the GIL is held and `object` is a live reference.
			let value = unsafe { ffi::PyLong_AsUnsignedLongMask(object.as_ptr()) };
			if value == c_ulong::MAX
				&& let Some(err) = PyErr::take(py)
			{
				return Err(err);
			}
			Ok(u64::from(value))
		})
	}

	fn ref_count(&self, object: &Py<PyAny>) -> usize {
		Python::with_gil(|py| usize::try_from(object.get_refcnt(py)).unwrap_or_default())
	}

	/// Leaks the handle. Dropping a `Py` would queue a decref against an
	/// object freed by finalization.
	fn discard(&self, object: Py<PyAny>) {
		mem::forget(object);
	}
}
