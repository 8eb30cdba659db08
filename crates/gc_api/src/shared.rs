//! Named tables shared across modules and crates.
//!
//! A table shared by several components is defined exactly once with
//! [`gc_api!`](crate::gc_api); every other component imports that item with
//! `use` instead of defining its own. The identifier is the table's unique
//! name, so independent users of this crate in one program never collide.

use std::cell::RefCell;
use std::thread::LocalKey;

use gch_runtime::ManagedRuntime;

use crate::{Error, GcApi, Result};

/// Storage behind a [`gc_api!`](crate::gc_api) table.
pub type SharedGcApi<R> = RefCell<GcApi<R>>;

/// Defines a named, thread-local collector table.
///
/// ```ignore
/// gch_api::gc_api! {
///     /// Table used by the extension module.
///     pub static EXT_GC: SimRuntime = GcApi::new(SimRuntime::new());
/// }
///
/// gch_api::with_api(&EXT_GC, |api| api.disable())?;
/// ```
#[macro_export]
macro_rules! gc_api {
	($(#[$attr:meta])* $vis:vis static $name:ident: $runtime:ty = $init:expr;) => {
		::std::thread_local! {
			$(#[$attr])*
			$vis static $name: $crate::SharedGcApi<$runtime> = ::std::cell::RefCell::new($init);
		}
	};
}

/// Runs `f` with exclusive access to a shared table.
///
/// Fails with [`Error::Reentrant`] if the table is already borrowed, e.g. when
/// `f` reaches the same table again.
pub fn with_api<R, T>(key: &'static LocalKey<SharedGcApi<R>>, f: impl FnOnce(&mut GcApi<R>) -> Result<T>) -> Result<T>
where
	R: ManagedRuntime + 'static,
{
	key.with(|cell| {
		let mut api = cell.try_borrow_mut().map_err(|_| Error::Reentrant)?;
		f(&mut *api)
	})
}
