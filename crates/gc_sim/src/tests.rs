use pretty_assertions::assert_eq;

use super::*;

fn gc_member(runtime: &SimRuntime, name: &str) -> SimRef {
	let module = runtime.import_module(GC_MODULE).expect("gc should import");
	runtime.get_attr(&module, name).expect("member should exist")
}

#[test]
fn import_is_served_from_module_cache() {
	let runtime = SimRuntime::new();
	let first = runtime.import_module(GC_MODULE).expect("gc should import");
	let second = runtime.import_module(GC_MODULE).expect("gc should import again");
	assert!(Rc::ptr_eq(&first, &second));
	assert_eq!(runtime.stats().imports, 2);
	// module cache + two handles
	assert_eq!(runtime.ref_count(&first), 3);
}

#[test]
fn unknown_module_raises_import_error() {
	let runtime = SimRuntime::new();
	let err = runtime.import_module("nope").expect_err("unknown module should fail");
	assert_eq!(err.kind, SimErrorKind::ImportError);
	assert_eq!(err.to_string(), "ImportError: No module named 'nope'");
}

#[test]
fn missing_member_raises_attribute_error() {
	let runtime = SimRuntime::builder().without_member("isenabled").build();
	let module = runtime.import_module(GC_MODULE).expect("gc should import");
	let err = runtime.get_attr(&module, "isenabled").expect_err("member was removed");
	assert_eq!(err.kind, SimErrorKind::AttributeError);
}

#[test]
fn enable_disable_toggle_collector() {
	let runtime = SimRuntime::new();
	let disable = gc_member(&runtime, "disable");
	let isenabled = gc_member(&runtime, "isenabled");

	assert!(runtime.collector_enabled());
	runtime.call(&disable, &[]).expect("disable should succeed");
	assert!(!runtime.collector_enabled());
	let truth = runtime.call(&isenabled, &[]).expect("isenabled should succeed");
	assert_eq!(runtime.extract_bool(&truth), Ok(false));
}

#[test]
fn collect_counts_younger_generations() {
	let runtime = SimRuntime::new();
	let collect = gc_member(&runtime, "collect");
	runtime.track_unreachable(0, 2);
	runtime.track_unreachable(1, 3);
	runtime.track_unreachable(2, 5);

	let found = runtime.call(&collect, &[1]).expect("collect(1) should succeed");
	assert_eq!(runtime.extract_int(&found), Ok(5));
	let found = runtime.call(&collect, &[]).expect("collect() should succeed");
	assert_eq!(runtime.extract_int(&found), Ok(5));
	assert_eq!(runtime.collections(1), 1);
	assert_eq!(runtime.collections(2), 1);
}

#[test]
fn collect_rejects_invalid_generation() {
	let runtime = SimRuntime::new();
	let collect = gc_member(&runtime, "collect");
	for generation in [333, -1, 3] {
		let err = runtime.call(&collect, &[generation]).expect_err("generation should be rejected");
		assert_eq!(err.kind, SimErrorKind::ValueError);
	}
}

#[test]
fn flags_extract_and_mask() {
	let runtime = SimRuntime::builder().override_attr("DEBUG_LEAK", SimValue::Int(-1)).build();
	let stats = gc_member(&runtime, "DEBUG_STATS");
	assert_eq!(runtime.extract_flag(&stats), Ok(1));
	let leak = gc_member(&runtime, "DEBUG_LEAK");
	assert_eq!(runtime.extract_flag(&leak), Ok(u64::MAX));
}

#[test]
fn stale_handles_are_rejected_after_reinitialize() {
	let runtime = SimRuntime::new();
	let enable = gc_member(&runtime, "enable");
	runtime.finalize().expect("finalize should succeed");
	assert!(!runtime.is_initialized());
	runtime.initialize().expect("initialize should succeed");
	assert_eq!(runtime.epoch(), 2);

	let err = runtime.call(&enable, &[]).expect_err("stale handle should be rejected");
	assert_eq!(err.kind, SimErrorKind::SystemError);
	assert!(err.message.contains("stale"), "got: {err}");
}

#[test]
fn failing_finalize_still_tears_down() {
	let runtime = SimRuntime::builder().failing_finalize().build();
	runtime.import_module(GC_MODULE).expect("gc should import");
	runtime.finalize().expect_err("finalize should report failure");
	assert!(!runtime.is_initialized());
	assert!(runtime.cached_module(GC_MODULE).is_none());
}

#[test]
fn uninitialized_runtime_refuses_imports() {
	let runtime = SimRuntime::builder().uninitialized().build();
	assert_eq!(runtime.epoch(), 0);
	let err = runtime.import_module(GC_MODULE).expect_err("runtime is not initialized");
	assert_eq!(err.kind, SimErrorKind::SystemError);
}
