//! Collector table against the embedded CPython interpreter.

use gch_api::{DebugFlag, Error, GcApi, Generation, ManagedRuntime};
use gch_python::PythonRuntime;
use pretty_assertions::assert_eq;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyList;
use serial_test::serial;

fn python_api() -> GcApi<PythonRuntime> {
	pyo3::prepare_freethreaded_python();
	GcApi::new(PythonRuntime::new())
}

#[test]
#[serial]
fn repeated_import_keeps_refcount() {
	let mut api = python_api();
	let runtime = PythonRuntime::new();

	let count = api.unique_import().map(|gc| runtime.ref_count(gc)).expect("gc should import");
	let again = api.unique_import().map(|gc| runtime.ref_count(gc)).expect("gc should import again");
	assert_eq!(again, count);
}

#[test]
#[serial]
fn enable_disable_round_trip() {
	let mut api = python_api();
	let was_enabled = api.isenabled().expect("isenabled should succeed");

	api.disable().expect("disable should succeed");
	assert!(!api.isenabled().expect("isenabled should succeed"));
	api.enable().expect("enable should succeed");
	assert!(api.isenabled().expect("isenabled should succeed"));

	if !was_enabled {
		api.disable().expect("disable should succeed");
	}
}

#[test]
#[serial]
fn collect_accepts_every_generation() {
	let mut api = python_api();
	for generation in [0, 1, 2, -1] {
		api.collect_count(Generation::from(generation))
			.unwrap_or_else(|err| panic!("generation {generation} should collect: {err}"));
	}
}

#[test]
#[serial]
fn invalid_generation_raises_value_error() {
	let mut api = python_api();
	let err = api.collect(Generation::Only(333)).expect_err("generation 333 should be rejected");
	let cause = err.runtime_error::<PyErr>().expect("cause should be a Python exception");
	Python::with_gil(|py| assert!(cause.is_instance_of::<PyValueError>(py), "got: {cause}"));
}

#[test]
#[serial]
fn debug_flags_match_the_gc_module() {
	let mut api = python_api();
	let expected: Vec<u64> = Python::with_gil(|py| {
		let gc = py.import("gc").expect("gc should import");
		DebugFlag::ALL
			.into_iter()
			.map(|flag| gc.getattr(flag.name()).and_then(|value| value.extract()).expect("flag should be an int"))
			.collect()
	});

	for (flag, expected) in DebugFlag::ALL.into_iter().zip(expected) {
		assert_eq!(api.read_flag(flag).expect("flag should read"), expected);
	}
	assert_eq!(api.read_flag(DebugFlag::Leak).expect("cached flag should read"), 38);
}

#[test]
#[serial]
fn garbage_is_a_list() {
	let mut api = python_api();
	let garbage = api.garbage().expect("gc.garbage should resolve");
	Python::with_gil(|py| assert!(garbage.bind(py).is_instance_of::<PyList>()));
}

#[test]
#[serial]
fn missing_module_reports_import_error() {
	pyo3::prepare_freethreaded_python();
	let config = gch_api::ApiConfig::from_toml_str("module = \"gch_no_such_module\"").expect("config should parse");
	let mut api = GcApi::with_config(PythonRuntime::new(), config);

	let err = api.enable().expect_err("module should not import");
	assert!(matches!(err, Error::ModuleUnavailable { .. }), "got: {err}");
}

#[test]
#[serial]
fn releases_queued_without_gil_are_applied() {
	pyo3::prepare_freethreaded_python();
	let runtime = PythonRuntime::new();
	let (owner, extra) = Python::with_gil(|py| {
		let list = PyList::empty(py).into_any().unbind();
		let extra = list.clone_ref(py);
		(list, extra)
	});
	let before = runtime.ref_count(&owner);

	// dropped outside any GIL scope, so the release is queued
	drop(extra);
	runtime.release_pending();
	assert_eq!(runtime.ref_count(&owner), before - 1);
}

#[test]
#[serial]
#[ignore = "finalizes the process-wide interpreter"]
fn finalize_applies_queued_releases_first() {
	let mut api = python_api();
	api.disable().expect("disable should succeed");
	Python::with_gil(|py| {
		let cycles = py.eval(c"[[] for _ in range(5000)]", None, None).expect("list should build");
		for item in cycles.try_iter().expect("list should iterate") {
			let item = item.expect("item should be readable");
			item.call_method1("append", (&item,)).expect("append should succeed");
		}
	});
	// result object dropped outside the GIL inside collect_count
	assert!(api.collect_count(Generation::All).expect("collection should succeed") >= 5000);
	api.enable().expect("enable should succeed");

	api.finalize().expect("finalize should succeed");
	api.initialize().expect("initialize should succeed");
	// nothing from the previous interpreter is released here
	Python::with_gil(|py| py.run(c"import gc; gc.collect()", None, None)).expect("fresh interpreter should run code");
	assert!(api.isenabled().expect("isenabled should succeed"));
}

#[test]
#[serial]
#[ignore = "finalizes the process-wide interpreter"]
fn reinitialized_interpreter_gets_fresh_handles() {
	let mut api = python_api();
	api.disable().expect("disable should succeed");
	api.read_flag(DebugFlag::Stats).expect("flag should read");

	api.finalize().expect("finalize should succeed");
	assert!(api.table().is_empty());
	assert!(matches!(api.enable(), Err(Error::NotInitialized)));

	api.initialize().expect("initialize should succeed");
	// a fresh interpreter starts with the collector enabled
	assert!(api.isenabled().expect("isenabled should succeed"));
	assert_eq!(api.epoch(), 1);
}
