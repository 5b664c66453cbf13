//! Request canonicalization and keyed-hash tokens.
//!
//! A token is `hex(HMAC-SHA256(secret, canonical))` where `canonical` is the
//! RFC 8785 serialization of the request object without its token field and
//! `secret` is the session secret exactly as transmitted in the secret header.

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Failures while producing a token.
#[derive(Debug, Error)]
pub enum TokenError {
	/// The request object could not be canonicalized.
	#[error("failed to canonicalize request: {0}")]
	Canonicalize(#[from] serde_json::Error),
	/// The secret cannot key the MAC.
	#[error("invalid session secret: {0}")]
	InvalidSecret(String),
}

/// Canonical bytes of an unsigned request object.
///
/// # Errors
///
/// Returns [`TokenError::Canonicalize`] if the object holds values RFC 8785
/// cannot represent.
pub fn canonical_message(unsigned: &Map<String, Value>) -> Result<Vec<u8>, TokenError> {
	Ok(serde_jcs::to_vec(unsigned)?)
}

/// Computes the token for `message` under `secret`.
///
/// # Errors
///
/// Returns [`TokenError::InvalidSecret`] if the MAC rejects the key.
pub fn compute_token(secret: &str, message: &[u8]) -> Result<String, TokenError> {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
		.map_err(|err| TokenError::InvalidSecret(err.to_string()))?;
	mac.update(message);
	Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `supplied` against the token for `message` under `secret`.
///
/// The comparison runs in constant time. A token that is not valid hex never
/// verifies.
pub fn verify_token(secret: &str, message: &[u8], supplied: &str) -> bool {
	let Ok(expected) = compute_token(secret, message) else {
		return false;
	};
	let (Ok(expected), Ok(actual)) = (hex::decode(expected), hex::decode(supplied)) else {
		return false;
	};
	if expected.len() != actual.len() {
		return false;
	}
	expected.ct_eq(actual.as_slice()).into()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn request() -> Map<String, Value> {
		match json!({"method": "stop", "params": [], "id": 1, "jsonrpc": "2.0"}) {
			Value::Object(map) => map,
			_ => unreachable!(),
		}
	}

	#[test]
	fn canonical_form_sorts_keys_without_whitespace() {
		let bytes = canonical_message(&request()).unwrap();
		assert_eq!(
			String::from_utf8(bytes).unwrap(),
			r#"{"id":1,"jsonrpc":"2.0","method":"stop","params":[]}"#
		);
	}

	#[test]
	fn token_roundtrip_verifies() {
		let msg = canonical_message(&request()).unwrap();
		let token = compute_token("s3cret", &msg).unwrap();
		assert!(verify_token("s3cret", &msg, &token));
		assert!(!verify_token("other", &msg, &token));
	}

	#[test]
	fn tampered_message_never_verifies() {
		let msg = canonical_message(&request()).unwrap();
		let token = compute_token("s3cret", &msg).unwrap();
		for i in 0..msg.len() {
			let mut tampered = msg.clone();
			tampered[i] ^= 0x01;
			assert!(!verify_token("s3cret", &tampered, &token), "byte {i} flipped");
		}
	}

	#[test]
	fn malformed_token_is_rejected() {
		let msg = canonical_message(&request()).unwrap();
		assert!(!verify_token("s3cret", &msg, "not hex"));
		assert!(!verify_token("s3cret", &msg, "abcd"));
	}
}
