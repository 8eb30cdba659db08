//! Error types for collector table operations.

use std::error::Error as StdError;

use thiserror::Error;

/// Runtime error carried as the cause of a table error.
pub type RuntimeSource = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by [`GcApi`](crate::GcApi) operations.
///
/// Runtime-originated variants keep the runtime's own error as their
/// [`source`](StdError::source); [`Error::runtime_error`] downcasts it back to
/// the backend's concrete type.
#[derive(Debug, Error)]
pub enum Error {
	/// The runtime was not initialized (or was finalized) when the table was used.
	#[error("managed runtime is not initialized")]
	NotInitialized,

	/// The collector module could not be imported.
	#[error("unable to import module '{module}': {source}")]
	ModuleUnavailable {
		/// Module name that was imported.
		module: String,
		#[source]
		source: RuntimeSource,
	},

	/// The module was imported but has no such attribute.
	#[error("unable to resolve member '{member}': {source}")]
	MemberUnavailable {
		/// Attribute name that was looked up.
		member: String,
		#[source]
		source: RuntimeSource,
	},

	/// A resolved value could not be converted to the operation's result type.
	#[error("unable to convert {what}: {source}")]
	Conversion {
		/// What was being converted, e.g. a flag name or call result.
		what: String,
		#[source]
		source: RuntimeSource,
	},

	/// The resolved callable raised when invoked.
	#[error("call to '{member}' failed: {source}")]
	Invocation {
		/// Member that was called.
		member: String,
		#[source]
		source: RuntimeSource,
	},

	/// Generation rejected locally; see [`ApiConfig::validate_generations`](crate::ApiConfig::validate_generations).
	#[error("invalid generation {0} (expected -1, 0, 1 or 2)")]
	InvalidGeneration(i64),

	/// Runtime initialization failed.
	#[error("runtime initialization failed: {source}")]
	Initialize {
		#[source]
		source: RuntimeSource,
	},

	/// Runtime finalization reported an error. The table is invalidated regardless.
	#[error("runtime finalization failed: {source}")]
	Finalize {
		#[source]
		source: RuntimeSource,
	},

	/// A shared table was accessed while already borrowed.
	#[error("collector table is already in use")]
	Reentrant,
}

impl Error {
	pub(crate) fn module_unavailable(module: &str, source: impl StdError + Send + Sync + 'static) -> Self {
		Self::ModuleUnavailable {
			module: module.to_string(),
			source: Box::new(source),
		}
	}

	pub(crate) fn member_unavailable(member: &str, source: impl StdError + Send + Sync + 'static) -> Self {
		Self::MemberUnavailable {
			member: member.to_string(),
			source: Box::new(source),
		}
	}

	pub(crate) fn conversion(what: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
		Self::Conversion {
			what: what.into(),
			source: Box::new(source),
		}
	}

	pub(crate) fn invocation(member: &str, source: impl StdError + Send + Sync + 'static) -> Self {
		Self::Invocation {
			member: member.to_string(),
			source: Box::new(source),
		}
	}

	/// Takes the runtime error behind this error by value.
	///
	/// Hands `self` back unchanged when there is no runtime error of type `E`.
	pub fn into_source<E: StdError + 'static>(self) -> std::result::Result<E, Self> {
		match self {
			Self::ModuleUnavailable { module, source } => {
				source.downcast::<E>().map(|e| *e).map_err(|source| Self::ModuleUnavailable { module, source })
			}
			Self::MemberUnavailable { member, source } => {
				source.downcast::<E>().map(|e| *e).map_err(|source| Self::MemberUnavailable { member, source })
			}
			Self::Conversion { what, source } => source.downcast::<E>().map(|e| *e).map_err(|source| Self::Conversion { what, source }),
			Self::Invocation { member, source } => {
				source.downcast::<E>().map(|e| *e).map_err(|source| Self::Invocation { member, source })
			}
			Self::Initialize { source } => source.downcast::<E>().map(|e| *e).map_err(|source| Self::Initialize { source }),
			Self::Finalize { source } => source.downcast::<E>().map(|e| *e).map_err(|source| Self::Finalize { source }),
			other @ (Self::NotInitialized | Self::InvalidGeneration(_) | Self::Reentrant) => Err(other),
		}
	}

	/// The runtime error behind this error, if it is of type `E`.
	pub fn runtime_error<E: StdError + 'static>(&self) -> Option<&E> {
		match self {
			Self::ModuleUnavailable { source, .. }
			| Self::MemberUnavailable { source, .. }
			| Self::Conversion { source, .. }
			| Self::Invocation { source, .. }
			| Self::Initialize { source }
			| Self::Finalize { source } => source.downcast_ref::<E>(),
			Self::NotInitialized | Self::InvalidGeneration(_) | Self::Reentrant => None,
		}
	}
}

/// Result type for collector table operations.
pub type Result<T> = std::result::Result<T, Error>;
