//! Table configuration.
//!
//! ```toml
//! # collector module to bind the table to
//! module = "gc"
//! # reject generations outside -1..=2 without calling into the runtime
//! validate_generations = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default collector module name.
pub const DEFAULT_MODULE: &str = "gc";

/// Settings for a [`GcApi`](crate::GcApi).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
	/// Module the table imports its members from.
	pub module: String,
	/// Reject invalid generations locally with
	/// [`Error::InvalidGeneration`](crate::Error::InvalidGeneration) instead of
	/// letting the collector raise.
	pub validate_generations: bool,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			module: DEFAULT_MODULE.to_string(),
			validate_generations: false,
		}
	}
}

impl ApiConfig {
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}

	/// Reads a TOML config file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&source)
	}
}

/// Errors loading an [`ApiConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML or an unknown key.
	#[error("invalid collector table config: {0}")]
	Parse(#[from] toml::de::Error),
}
