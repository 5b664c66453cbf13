//! HTTP client for the daemon API.

use ctrld_proto::{
	ErrorCode, Outcome, ResponseEnvelope, RpcError, TokenError, canonical_message, compute_token,
	encode_params, envelope::TOKEN_FIELD, headers,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Failures talking to the daemon.
#[derive(Debug, Error)]
pub enum ClientError {
	/// Nothing is listening at the API address.
	#[error("could not connect to {url}: {source}")]
	Connect {
		/// API address.
		url: String,
		/// Underlying error.
		source: reqwest::Error,
	},
	/// The daemon rejected the call token.
	#[error("{0}")]
	Unauthorized(RpcError),
	/// The daemon answered with an error.
	#[error("{0}")]
	Rpc(RpcError),
	/// Transport failure after connecting.
	#[error("request failed: {0}")]
	Http(#[from] reqwest::Error),
	/// The reply is not a response envelope.
	#[error("malformed response (HTTP {status}): {error}")]
	Malformed {
		/// HTTP status of the reply.
		status: u16,
		/// Parse error.
		error: serde_json::Error,
	},
	/// The request could not be signed.
	#[error("signing request: {0}")]
	Sign(#[from] TokenError),
	/// The daemon kept answering with handshakes.
	#[error("daemon did not accept the session")]
	Handshake,
}

/// A client session with the daemon.
///
/// Handshakes happen on demand: a reply carrying the acknowledgment body
/// means the session was new, and the call is sent again signed with the
/// secret it handed out.
#[derive(Debug)]
pub struct ApiClient {
	http: reqwest::Client,
	url: String,
	session: Option<String>,
	secret: Option<String>,
	next_id: u64,
}

impl ApiClient {
	/// Creates a client for the API at `url`.
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			http: reqwest::Client::new(),
			url: url.into(),
			session: None,
			secret: None,
			next_id: 1,
		}
	}

	/// Calls `method` and returns its result.
	///
	/// # Errors
	///
	/// Returns [`ClientError`] when the daemon is unreachable, rejects the
	/// call or answers with an error.
	pub async fn call(
		&mut self,
		method: &str,
		positional: &[Value],
		named: &Map<String, Value>,
	) -> Result<Value, ClientError> {
		for _ in 0..2 {
			let id = self.next_id;
			self.next_id += 1;
			let request = build_request(
				method,
				encode_params(positional.to_vec(), named.clone()),
				id,
				self.secret.as_deref(),
			)?;

			let mut builder = self.http.post(&self.url).json(&request);
			if let Some(session) = &self.session {
				builder = builder.header(headers::SESSION, session);
			}
			let response = builder.send().await.map_err(|source| {
				if source.is_connect() {
					ClientError::Connect {
						url: self.url.clone(),
						source,
					}
				} else {
					ClientError::Http(source)
				}
			})?;

			self.adopt(&response);
			let status = response.status().as_u16();
			let body = response.bytes().await?;
			if body.as_ref() == headers::HANDSHAKE_ACK.as_bytes() {
				tracing::debug!(session = ?self.session, "handshake complete");
				continue;
			}

			let envelope = ResponseEnvelope::parse(&body)
				.map_err(|error| ClientError::Malformed { status, error })?;
			return match envelope.outcome {
				Outcome::Result(value) => Ok(value),
				Outcome::Error(err) if err.code == ErrorCode::AuthenticationError => {
					Err(ClientError::Unauthorized(err))
				}
				Outcome::Error(err) => Err(ClientError::Rpc(err)),
			};
		}
		Err(ClientError::Handshake)
	}

	fn adopt(&mut self, response: &reqwest::Response) {
		let header = |name: &str| {
			response
				.headers()
				.get(name)
				.and_then(|v| v.to_str().ok())
				.map(str::to_owned)
		};
		if let Some(session) = header(headers::SESSION) {
			self.session = Some(session);
		}
		if let Some(secret) = header(headers::SECRET) {
			self.secret = Some(secret);
		}
	}
}

/// Builds a request body, signed when a secret is known.
fn build_request(
	method: &str,
	params: Value,
	id: u64,
	secret: Option<&str>,
) -> Result<Value, TokenError> {
	let mut request = Map::new();
	request.insert("jsonrpc".into(), Value::from(ctrld_proto::envelope::JSONRPC_VERSION));
	request.insert("method".into(), Value::from(method));
	request.insert("params".into(), params);
	request.insert("id".into(), Value::from(id));
	if let Some(secret) = secret {
		let token = compute_token(secret, &canonical_message(&request)?)?;
		request.insert(TOKEN_FIELD.into(), Value::from(token));
	}
	Ok(Value::Object(request))
}

#[cfg(test)]
mod tests {
	use ctrld_proto::{RequestEnvelope, verify_token};
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn unsigned_without_secret() {
		let request = build_request("status", json!([]), 1, None).unwrap();
		assert_eq!(
			request,
			json!({"jsonrpc": "2.0", "method": "status", "params": [], "id": 1})
		);
	}

	#[test]
	fn signature_verifies_on_the_daemon_side() {
		let params = encode_params(vec![json!(1)], Map::from_iter([("two".into(), json!(2))]));
		let request = build_request("f", params, 9, Some("00ff")).unwrap();

		let decoded = RequestEnvelope::decode(&serde_json::to_vec(&request).unwrap()).unwrap();
		assert_eq!(decoded.positional, vec![json!(1)]);
		assert_eq!(decoded.named.get("two"), Some(&json!(2)));
		let token = decoded.token.clone().unwrap();
		let message = decoded.canonical_message().unwrap();
		assert!(verify_token("00ff", &message, &token));
		assert!(!verify_token("00fe", &message, &token));
	}
}
