//! Daemon configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ctrld_proto::paths::DEFAULT_PORT;
use serde::Deserialize;
use thiserror::Error;

use crate::core::SessionConfig;
use crate::dispatch::DispatchConfig;
use crate::http::HttpConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading the configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or fields.
	#[error("invalid config {path}: {error}")]
	Toml {
		/// Path to the file that failed to parse.
		path: PathBuf,
		/// The underlying parse error.
		error: toml::de::Error,
	},

	/// A value is out of range.
	#[error("invalid value for {field}: {reason}")]
	InvalidValue {
		/// Offending field.
		field: &'static str,
		/// What is wrong with it.
		reason: &'static str,
	},
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings read from `daemon.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
	/// Interface the API listens on.
	pub host: String,
	/// TCP port the API listens on.
	pub port: u16,
	/// Require session handshakes and call tokens.
	pub use_auth: bool,
	/// Origin allowed to call the API from a browser.
	pub allowed_origin: Option<String>,
	/// Idle seconds before a session is destroyed.
	pub session_timeout_secs: u64,
	/// Seconds between sweeps of expired sessions.
	pub session_sweep_interval_secs: u64,
	/// Attach diagnostic traces to error responses.
	pub include_traceback: bool,
}

impl Default for DaemonConfig {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".to_owned(),
			port: DEFAULT_PORT,
			use_auth: false,
			allowed_origin: None,
			session_timeout_secs: 15 * 60,
			session_sweep_interval_secs: 60,
			include_traceback: true,
		}
	}
}

impl DaemonConfig {
	/// Reads and validates a configuration file.
	///
	/// # Errors
	///
	/// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_owned(),
			error,
		})?;
		let config: Self = toml::from_str(&text).map_err(|error| ConfigError::Toml {
			path: path.to_owned(),
			error,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Reads `path` if it exists, otherwise returns defaults.
	///
	/// # Errors
	///
	/// Returns [`ConfigError`] if an existing file is invalid.
	pub fn load_or_default(path: &Path) -> Result<Self> {
		if path.exists() {
			tracing::info!(path = %path.display(), "loading config");
			Self::load(path)
		} else {
			tracing::debug!(path = %path.display(), "no config file, using defaults");
			Ok(Self::default())
		}
	}

	fn validate(&self) -> Result<()> {
		if self.session_timeout_secs == 0 {
			return Err(ConfigError::InvalidValue {
				field: "session_timeout_secs",
				reason: "must be greater than zero",
			});
		}
		if self.session_sweep_interval_secs == 0 {
			return Err(ConfigError::InvalidValue {
				field: "session_sweep_interval_secs",
				reason: "must be greater than zero",
			});
		}
		Ok(())
	}

	/// `host:port` to bind.
	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	/// Session store settings.
	pub fn session_config(&self) -> SessionConfig {
		SessionConfig {
			timeout: Duration::from_secs(self.session_timeout_secs),
		}
	}

	/// Sweep period for expired sessions.
	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.session_sweep_interval_secs)
	}

	/// Dispatcher settings.
	pub fn dispatch_config(&self) -> DispatchConfig {
		DispatchConfig {
			use_auth: self.use_auth,
			include_traceback: self.include_traceback,
		}
	}

	/// Transport settings.
	pub fn http_config(&self) -> HttpConfig {
		HttpConfig {
			allowed_origin: self.allowed_origin.clone(),
		}
	}
}

/// Returns the default configuration file path.
///
/// # Resolution Order
///
/// 1. `CTRLD_CONFIG` environment variable.
/// 2. `<config dir>/ctrld/daemon.toml` (e.g. `$XDG_CONFIG_HOME`).
/// 3. `daemon.toml` in the system temp directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
	if let Ok(p) = std::env::var("CTRLD_CONFIG") {
		return PathBuf::from(p);
	}
	dirs::config_dir()
		.map(|dir| dir.join("ctrld"))
		.unwrap_or_else(std::env::temp_dir)
		.join("daemon.toml")
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	fn write_config(text: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(text.as_bytes()).unwrap();
		file
	}

	#[test]
	fn missing_file_yields_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = DaemonConfig::load_or_default(&dir.path().join("daemon.toml")).unwrap();
		assert_eq!(config, DaemonConfig::default());
	}

	#[test]
	fn partial_file_keeps_other_defaults() {
		let file = write_config("use_auth = true\nport = 6000\nallowed_origin = \"http://localhost:5279\"\n");
		let config = DaemonConfig::load(file.path()).unwrap();
		assert!(config.use_auth);
		assert_eq!(config.port, 6000);
		assert_eq!(config.allowed_origin.as_deref(), Some("http://localhost:5279"));
		assert_eq!(config.session_timeout_secs, 900);
		assert_eq!(config.bind_addr(), "127.0.0.1:6000");
	}

	#[test]
	fn unknown_fields_are_rejected() {
		let file = write_config("use_authh = true\n");
		assert!(matches!(
			DaemonConfig::load(file.path()),
			Err(ConfigError::Toml { .. })
		));
	}

	#[test]
	fn zero_timeout_is_rejected() {
		let file = write_config("session_timeout_secs = 0\n");
		assert!(matches!(
			DaemonConfig::load(file.path()),
			Err(ConfigError::InvalidValue {
				field: "session_timeout_secs",
				..
			})
		));
	}
}
