//! The exported table, called the way an extension module would.

use std::ffi::CString;
use std::sync::mpsc;
use std::{ptr, thread};

use gch_api::ManagedRuntime;
use gch_cabi::{GCH_C_ABI_VERSION, GCH_DEBUG_LEAK, GCH_DEBUG_STATS, GchApiV1, gch_api_v1};
use gch_python::PythonRuntime;
use pretty_assertions::assert_eq;
use pyo3::exceptions::{PyAttributeError, PyValueError};
use pyo3::ffi;
use pyo3::prelude::*;
use serial_test::serial;

fn table() -> &'static GchApiV1 {
	pyo3::prepare_freethreaded_python();
	// SAFETY: `gch_api_v1` returns a pointer to a static.
	unsafe { &*gch_api_v1() }
}

/// Takes the pending exception, as a C caller would with `PyErr_Fetch`.
fn take_error<T>(check: impl FnOnce(Python<'_>, &PyErr) -> T) -> T {
	Python::with_gil(|py| {
		let err = PyErr::take(py).expect("an exception should be set");
		check(py, &err)
	})
}

#[test]
fn table_header_is_versioned() {
	let api = table();
	assert_eq!(api.abi_version, GCH_C_ABI_VERSION);
	assert_eq!(api.struct_size, std::mem::size_of::<GchApiV1>());
}

#[test]
#[serial]
fn enable_disable_round_trip() {
	let api = table();
	let was_enabled = (api.isenabled)();
	assert!(was_enabled >= 0);

	assert_eq!((api.disable)(), 0);
	assert_eq!((api.isenabled)(), 0);
	assert_eq!((api.enable)(), 0);
	assert_eq!((api.isenabled)(), 1);
	assert_eq!((api.is_imported)(), 1);

	if was_enabled == 0 {
		assert_eq!((api.disable)(), 0);
	}
}

#[test]
#[serial]
fn invalid_generation_sets_value_error() {
	let api = table();
	assert_eq!((api.collect_count)(333), -1);
	take_error(|py, err| assert!(err.is_instance_of::<PyValueError>(py), "got: {err}"));

	assert!((api.collect)(333).is_null());
	take_error(|py, err| assert!(err.is_instance_of::<PyValueError>(py), "got: {err}"));
}

#[test]
#[serial]
fn collect_returns_new_reference() {
	let api = table();
	let found = (api.collect)(-1);
	assert!(!found.is_null());
	Python::with_gil(|py| {
		// SAFETY: `collect` hands over a new reference.
		let found = unsafe { Bound::from_owned_ptr(py, found) };
		assert!(found.extract::<i64>().expect("collect() should return an int") >= 0);
	});
	assert!((api.collect_count)(0) >= 0);
}

#[test]
#[serial]
fn flags_are_written_through_out_pointer() {
	let api = table();
	let mut leak = 0u64;
	// SAFETY: `leak` is a valid u64 location.
	assert_eq!(unsafe { (api.read_flag)(GCH_DEBUG_LEAK, &mut leak) }, 0);
	assert_eq!(leak, 38);

	let mut stats = 0u64;
	// SAFETY: `stats` is a valid u64 location.
	assert_eq!(unsafe { (api.read_flag)(GCH_DEBUG_STATS, &mut stats) }, 0);
	assert_eq!(stats, 1);

	// SAFETY: the flag index is rejected before `out` is written.
	assert_eq!(unsafe { (api.read_flag)(99, &mut stats) }, -1);
	take_error(|py, err| assert!(err.is_instance_of::<PyValueError>(py), "got: {err}"));
	assert_eq!(stats, 1);
}

#[test]
#[serial]
fn member_slot_is_filled_once() {
	let api = table();
	let name = CString::new("get_stats").expect("name has no NUL");
	let mut slot: *mut ffi::PyObject = ptr::null_mut();

	// SAFETY: `name` is NUL-terminated and `slot` is a valid, NULL slot.
	assert_eq!(unsafe { (api.member_unique_import)(name.as_ptr(), &mut slot) }, 0);
	assert!(!slot.is_null());
	let filled = slot;
	// SAFETY: `slot` holds a new reference and the GIL is taken for the read.
	let count = Python::with_gil(|_| unsafe { ffi::Py_REFCNT(slot) });

	// SAFETY: as above; the populated slot must be left as is.
	assert_eq!(unsafe { (api.member_unique_import)(name.as_ptr(), &mut slot) }, 0);
	assert_eq!(slot, filled);
	// SAFETY: as above.
	assert_eq!(Python::with_gil(|_| unsafe { ffi::Py_REFCNT(slot) }), count);

	// SAFETY: the slot's reference is owned by this test.
	Python::with_gil(|py| drop(unsafe { Bound::<PyAny>::from_owned_ptr(py, slot) }));
}

#[test]
#[serial]
fn missing_member_sets_attribute_error() {
	let api = table();
	let name = CString::new("gch_no_such_member").expect("name has no NUL");
	let mut slot: *mut ffi::PyObject = ptr::null_mut();

	// SAFETY: `name` is NUL-terminated and `slot` is a valid, NULL slot.
	assert_eq!(unsafe { (api.member_unique_import)(name.as_ptr(), &mut slot) }, -1);
	assert!(slot.is_null());
	take_error(|py, err| assert!(err.is_instance_of::<PyAttributeError>(py), "got: {err}"));
}

#[test]
#[serial]
fn garbage_and_callbacks_are_borrowed() {
	let api = table();
	let garbage = (api.garbage)();
	assert!(!garbage.is_null());
	assert_eq!((api.garbage)(), garbage);
	assert!(!(api.callbacks)().is_null());
}

/// `gc.garbage`'s reference count, after queued releases are applied.
fn garbage_refcount() -> isize {
	Python::with_gil(|py| {
		let garbage = py.import("gc").and_then(|gc| gc.getattr("garbage")).expect("gc.garbage should exist");
		garbage.get_refcnt()
	})
}

#[test]
#[serial]
fn reported_finalization_invalidates_every_thread() {
	let api = table();
	let (imported_tx, imported_rx) = mpsc::channel();
	let (resume_tx, resume_rx) = mpsc::channel::<()>();
	let worker = thread::spawn(move || {
		assert_eq!((api.unique_import)(), 0);
		imported_tx.send(()).expect("main thread should be waiting");
		resume_rx.recv().expect("main thread should resume the worker");
		let after = (api.is_imported)();
		let enabled = (api.isenabled)();
		(after, enabled, (api.is_imported)())
	});

	assert_eq!((api.enable)(), 0);
	assert!(!(api.garbage)().is_null());
	assert_eq!((api.is_imported)(), 1);
	imported_rx.recv().expect("worker should import");

	(api.on_runtime_finalized)();
	assert_eq!((api.is_imported)(), 0);
	resume_tx.send(()).expect("worker should be waiting");

	let (after, enabled, reimported) = worker.join().expect("worker should not panic");
	assert_eq!(after, 0);
	assert!(enabled >= 0);
	assert_eq!(reimported, 1);
	assert_eq!((api.enable)(), 0);
}

#[test]
#[serial]
fn exiting_thread_does_not_release_stale_handles() {
	let api = table();
	let (resolved_tx, resolved_rx) = mpsc::channel();
	let (exit_tx, exit_rx) = mpsc::channel::<()>();
	let worker = thread::spawn(move || {
		assert!(!(api.garbage)().is_null());
		resolved_tx.send(()).expect("main thread should be waiting");
		exit_rx.recv().expect("main thread should release the worker");
	});

	resolved_rx.recv().expect("worker should resolve gc.garbage");
	let held = garbage_refcount();
	(api.on_runtime_finalized)();
	exit_tx.send(()).expect("worker should be waiting");
	worker.join().expect("worker should not panic");

	// the worker's handle belongs to a finished epoch, so it is leaked, not released
	assert_eq!(garbage_refcount(), held);
}

#[test]
#[serial]
#[ignore = "finalizes the process-wide interpreter"]
fn finalize_then_reinitialize() {
	let api = table();
	assert_eq!((api.disable)(), 0);
	assert_eq!((api.finalize)(), 0);
	assert_eq!((api.is_imported)(), 0);

	PythonRuntime::new().initialize().expect("interpreter should reinitialize");
	assert_eq!((api.isenabled)(), 1);
	assert_eq!((api.is_imported)(), 1);
}
