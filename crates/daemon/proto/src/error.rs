//! Error codes and the JSON-RPC error object.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fixed error-code taxonomy.
///
/// Codes outside the taxonomy are procedure-supplied and carried in
/// [`ErrorCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ErrorCode {
	/// Body is not valid JSON.
	ParseError,
	/// Body is JSON but not a valid request, or the daemon is still starting.
	InvalidRequest,
	/// No procedure is registered under the requested name.
	MethodNotFound,
	/// Arguments could not be bound to the procedure signature.
	InvalidParams,
	/// Unexpected fault inside the daemon.
	InternalError,
	/// The procedure failed.
	ApplicationError,
	/// Token missing or invalid.
	AuthenticationError,
	/// Any other code, supplied by a procedure.
	Other(i64),
}

impl ErrorCode {
	/// Numeric wire code.
	pub const fn code(self) -> i64 {
		match self {
			Self::ParseError => -32700,
			Self::InvalidRequest => -32600,
			Self::MethodNotFound => -32601,
			Self::InvalidParams => -32602,
			Self::InternalError => -32603,
			Self::ApplicationError => -32500,
			Self::AuthenticationError => -32501,
			Self::Other(code) => code,
		}
	}

	/// HTTP status for a reply carrying this code. Unknown codes map to 500.
	pub const fn http_status(self) -> u16 {
		match self {
			Self::ParseError | Self::InvalidRequest | Self::InvalidParams => 400,
			Self::MethodNotFound => 404,
			Self::AuthenticationError => 401,
			Self::InternalError | Self::ApplicationError | Self::Other(_) => 500,
		}
	}

	/// Message used when the failure supplies none.
	pub const fn default_message(self) -> &'static str {
		match self {
			Self::ParseError => "Parse error: data is not valid JSON",
			Self::InvalidRequest => "JSON data is not a valid request",
			Self::MethodNotFound => "Method not found",
			Self::InvalidParams => "Invalid params",
			Self::InternalError => "Internal error",
			Self::AuthenticationError => "Authentication failed",
			Self::ApplicationError | Self::Other(_) => "Error",
		}
	}
}

impl From<i64> for ErrorCode {
	fn from(code: i64) -> Self {
		match code {
			-32700 => Self::ParseError,
			-32600 => Self::InvalidRequest,
			-32601 => Self::MethodNotFound,
			-32602 => Self::InvalidParams,
			-32603 => Self::InternalError,
			-32500 => Self::ApplicationError,
			-32501 => Self::AuthenticationError,
			other => Self::Other(other),
		}
	}
}

impl From<ErrorCode> for i64 {
	fn from(code: ErrorCode) -> Self {
		code.code()
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.code())
	}
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct RpcError {
	/// Numeric code.
	pub code: ErrorCode,
	/// Human readable message.
	pub message: String,
	/// Optional diagnostic detail. Omitted from the wire when empty.
	#[serde(default, skip_serializing_if = "is_empty")]
	pub data: Option<Map<String, Value>>,
}

fn is_empty(data: &Option<Map<String, Value>>) -> bool {
	data.as_ref().is_none_or(Map::is_empty)
}

impl RpcError {
	/// Creates an error with an explicit message. An empty message falls back
	/// to the code's default.
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		let message = message.into();
		Self {
			code,
			message: if message.is_empty() {
				code.default_message().to_owned()
			} else {
				message
			},
			data: None,
		}
	}

	/// Creates an error carrying the code's default message.
	pub fn from_code(code: ErrorCode) -> Self {
		Self::new(code, code.default_message())
	}

	/// Adds one `data` entry.
	#[must_use]
	pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.data
			.get_or_insert_with(Map::new)
			.insert(key.into(), value.into());
		self
	}

	/// Attaches a diagnostic trace as `data.traceback`, one entry per line.
	#[must_use]
	pub fn with_traceback(self, trace: &str) -> Self {
		let lines: Vec<Value> = trace.lines().map(|l| Value::from(l.to_owned())).collect();
		if lines.is_empty() {
			return self;
		}
		self.with_data("traceback", lines)
	}

	/// Lines of `data.traceback`, if present.
	pub fn traceback(&self) -> Option<Vec<&str>> {
		let lines = self.data.as_ref()?.get("traceback")?.as_array()?;
		Some(lines.iter().filter_map(Value::as_str).collect())
	}

	/// HTTP status for a reply carrying this error.
	pub fn http_status(&self) -> u16 {
		self.code.http_status()
	}
}
