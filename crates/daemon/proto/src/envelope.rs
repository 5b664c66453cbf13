//! Request and response envelopes.
//!
//! `params` arrives in one of three shapes:
//! * an array, whose leading object (if any) holds the named arguments
//! * an object, whose `__args` entry holds the positional arguments
//! * absent or `null`, meaning no arguments

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{ErrorCode, RpcError};
use crate::token::{TokenError, canonical_message};

/// Request field carrying the call token.
pub const TOKEN_FIELD: &str = "hmac";

/// Key of the positional arguments when `params` is an object.
pub const ARGS_KEY: &str = "__args";

/// Protocol version tag on every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// Why a request body could not be decoded.
#[derive(Debug, Error)]
pub enum RequestError {
	/// Body is not JSON.
	#[error("{0}")]
	Parse(#[from] serde_json::Error),
	/// Body is JSON but not an object.
	#[error("request must be a JSON object")]
	NotAnObject,
	/// `method` is absent or not a string.
	#[error("request method must be a string")]
	InvalidMethod,
	/// `params` has an unsupported shape.
	#[error("params must be an array, an object, or null")]
	InvalidParams,
	/// `params.__args` is not an array.
	#[error("params.__args must be an array")]
	InvalidArgs,
	/// The token field is not a string.
	#[error("hmac must be a string")]
	InvalidToken,
}

impl From<RequestError> for RpcError {
	fn from(err: RequestError) -> Self {
		match err {
			RequestError::Parse(_) => RpcError::from_code(ErrorCode::ParseError),
			other => RpcError::new(ErrorCode::InvalidRequest, other.to_string()),
		}
	}
}

/// One decoded inbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
	/// Procedure name.
	pub method: String,
	/// Positional arguments in order.
	pub positional: Vec<Value>,
	/// Named arguments.
	pub named: Map<String, Value>,
	/// Call token, if supplied.
	pub token: Option<String>,
	/// Correlation id, echoed back verbatim.
	pub id: Value,
	unsigned: Map<String, Value>,
}

impl RequestEnvelope {
	/// Decodes a request body.
	///
	/// # Errors
	///
	/// Returns [`RequestError::Parse`] for malformed JSON and another
	/// [`RequestError`] for a body of the wrong shape.
	pub fn decode(body: &[u8]) -> Result<Self, RequestError> {
		match serde_json::from_slice::<Value>(body)? {
			Value::Object(map) => Self::from_object(map),
			_ => Err(RequestError::NotAnObject),
		}
	}

	/// Decodes an already parsed request object.
	///
	/// # Errors
	///
	/// Returns a [`RequestError`] for a request of the wrong shape.
	pub fn from_object(mut unsigned: Map<String, Value>) -> Result<Self, RequestError> {
		let token = match unsigned.remove(TOKEN_FIELD) {
			None | Some(Value::Null) => None,
			Some(Value::String(token)) => Some(token),
			Some(_) => return Err(RequestError::InvalidToken),
		};
		let method = match unsigned.get("method") {
			Some(Value::String(method)) => method.clone(),
			_ => return Err(RequestError::InvalidMethod),
		};
		let id = unsigned.get("id").cloned().unwrap_or(Value::Null);
		let (positional, named) = split_params(unsigned.get("params"))?;

		Ok(Self {
			method,
			positional,
			named,
			token,
			id,
			unsigned,
		})
	}

	/// Canonical bytes the call token is computed over.
	///
	/// # Errors
	///
	/// Returns [`TokenError`] if the request cannot be canonicalized.
	pub fn canonical_message(&self) -> Result<Vec<u8>, TokenError> {
		canonical_message(&self.unsigned)
	}
}

fn split_params(params: Option<&Value>) -> Result<(Vec<Value>, Map<String, Value>), RequestError> {
	match params {
		None | Some(Value::Null) => Ok((Vec::new(), Map::new())),
		Some(Value::Array(items)) => match items.split_first() {
			Some((Value::Object(named), rest)) => Ok((rest.to_vec(), named.clone())),
			_ => Ok((items.clone(), Map::new())),
		},
		Some(Value::Object(map)) => {
			let mut named = map.clone();
			let positional = match named.remove(ARGS_KEY) {
				None | Some(Value::Null) => Vec::new(),
				Some(Value::Array(items)) => items,
				Some(_) => return Err(RequestError::InvalidArgs),
			};
			Ok((positional, named))
		}
		Some(_) => Err(RequestError::InvalidParams),
	}
}

/// Encodes arguments as a `params` array.
///
/// Named arguments travel as a leading object. It is emitted whenever the
/// call has named arguments, or when the first positional value is itself an
/// object and would otherwise be read back as named arguments.
pub fn encode_params(positional: Vec<Value>, named: Map<String, Value>) -> Value {
	let needs_leading = !named.is_empty() || matches!(positional.first(), Some(Value::Object(_)));
	if !needs_leading {
		return Value::Array(positional);
	}
	let mut items = Vec::with_capacity(positional.len() + 1);
	items.push(Value::Object(named));
	items.extend(positional);
	Value::Array(items)
}

/// Either side of a completed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
	/// The procedure's return value.
	Result(Value),
	/// The failure.
	Error(RpcError),
}

/// A response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
	/// Always [`JSONRPC_VERSION`].
	pub jsonrpc: String,
	/// Result or error.
	#[serde(flatten)]
	pub outcome: Outcome,
	/// Correlation id of the request.
	#[serde(default)]
	pub id: Value,
}

impl ResponseEnvelope {
	/// Successful response.
	pub fn result(id: Value, result: Value) -> Self {
		Self {
			jsonrpc: JSONRPC_VERSION.to_owned(),
			outcome: Outcome::Result(result),
			id,
		}
	}

	/// Failed response.
	pub fn error(id: Value, error: RpcError) -> Self {
		Self {
			jsonrpc: JSONRPC_VERSION.to_owned(),
			outcome: Outcome::Error(error),
			id,
		}
	}

	/// HTTP status for this response.
	pub fn http_status(&self) -> u16 {
		match &self.outcome {
			Outcome::Result(_) => 200,
			Outcome::Error(err) => err.http_status(),
		}
	}

	/// Renders the body: pretty-printed, keys sorted, trailing newline.
	///
	/// # Errors
	///
	/// Returns an error if the result holds a value JSON cannot represent.
	pub fn render(&self) -> Result<Vec<u8>, serde_json::Error> {
		let sorted = serde_json::to_value(self)?;
		let mut body = serde_json::to_vec_pretty(&sorted)?;
		body.push(b'\n');
		Ok(body)
	}

	/// Parses a rendered body.
	///
	/// # Errors
	///
	/// Returns an error if `body` is not a response envelope.
	pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
		serde_json::from_slice(body)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn decode(value: Value) -> Result<RequestEnvelope, RequestError> {
		RequestEnvelope::decode(&serde_json::to_vec(&value).unwrap())
	}

	#[test]
	fn leading_object_is_named() {
		let req = decode(json!({"method": "f", "params": [{"two": null}, 1], "id": 7})).unwrap();
		assert_eq!(req.method, "f");
		assert_eq!(req.positional, vec![json!(1)]);
		assert_eq!(Value::Object(req.named), json!({"two": null}));
		assert_eq!(req.id, json!(7));
	}

	#[test]
	fn empty_leading_object_means_no_arguments() {
		let req = decode(json!({"method": "f", "params": [{}]})).unwrap();
		assert!(req.positional.is_empty());
		assert!(req.named.is_empty());
		assert_eq!(req.id, Value::Null);
	}

	#[test]
	fn object_params_carry_positional_under_reserved_key() {
		let req = decode(json!({"method": "f", "params": {"__args": [1, 2], "x": 3}})).unwrap();
		assert_eq!(req.positional, vec![json!(1), json!(2)]);
		assert_eq!(Value::Object(req.named), json!({"x": 3}));
	}

	#[test]
	fn token_is_excluded_from_canonical_message() {
		let req = decode(json!({"method": "f", "params": [], "hmac": "abc"})).unwrap();
		assert_eq!(req.token.as_deref(), Some("abc"));
		assert_eq!(
			req.canonical_message().unwrap(),
			br#"{"method":"f","params":[]}"#.to_vec()
		);
	}

	#[test]
	fn malformed_bodies() {
		let err = RpcError::from(RequestEnvelope::decode(b"{nope").unwrap_err());
		assert_eq!(err.code, ErrorCode::ParseError);

		for body in [json!([1]), json!({"params": []}), json!({"method": "f", "params": 3})] {
			let err = RpcError::from(decode(body).unwrap_err());
			assert_eq!(err.code, ErrorCode::InvalidRequest);
		}
	}

	#[test]
	fn encode_params_keeps_object_arguments_positional() {
		assert_eq!(encode_params(vec![json!(1)], Map::new()), json!([1]));
		assert_eq!(encode_params(vec![json!({"a": 1})], Map::new()), json!([{}, {"a": 1}]));

		let mut named = Map::new();
		named.insert("k".into(), json!("v"));
		assert_eq!(encode_params(vec![json!(1)], named), json!([{"k": "v"}, 1]));
	}

	#[test]
	fn render_sorts_keys() {
		let body = ResponseEnvelope::result(json!(1), json!({"b": 1, "a": 2}))
			.render()
			.unwrap();
		let text = String::from_utf8(body).unwrap();
		assert_eq!(
			text,
			"{\n  \"id\": 1,\n  \"jsonrpc\": \"2.0\",\n  \"result\": {\n    \"a\": 2,\n    \"b\": 1\n  }\n}\n"
		);
	}

	#[test]
	fn error_response_roundtrip() {
		let resp = ResponseEnvelope::error(
			json!("x"),
			RpcError::from_code(ErrorCode::AuthenticationError),
		);
		assert_eq!(resp.http_status(), 401);
		let parsed = ResponseEnvelope::parse(&resp.render().unwrap()).unwrap();
		assert_eq!(parsed, resp);
	}
}
