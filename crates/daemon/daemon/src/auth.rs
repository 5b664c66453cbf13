//! Call token verification.

use std::sync::Arc;

use ctrld_proto::verify_token;
use thiserror::Error;

use crate::core::{SessionId, SessionStore};

/// Why a call failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
	/// The request carried no token.
	#[error("no authentication token supplied")]
	MissingToken,
	/// The token does not match the session's current secret.
	#[error("invalid authentication token")]
	InvalidToken,
	/// The session does not exist or has expired.
	#[error("unknown or expired session")]
	UnknownSession,
}

/// Verifies call tokens against the session table.
#[derive(Debug, Clone)]
pub struct Authenticator {
	sessions: Arc<SessionStore>,
}

impl Authenticator {
	/// Creates an authenticator reading from `sessions`.
	pub fn new(sessions: Arc<SessionStore>) -> Self {
		Self { sessions }
	}

	/// Checks `supplied` against the keyed hash of `canonical_message` under
	/// the session's current secret.
	///
	/// # Errors
	///
	/// Returns [`AuthError::MissingToken`] without a token,
	/// [`AuthError::UnknownSession`] for a dead session and
	/// [`AuthError::InvalidToken`] on mismatch.
	pub fn verify(
		&self,
		session: &SessionId,
		canonical_message: &[u8],
		supplied: Option<&str>,
	) -> Result<(), AuthError> {
		let supplied = supplied.ok_or(AuthError::MissingToken)?;
		let secret = self
			.sessions
			.secret(session)
			.ok_or(AuthError::UnknownSession)?;
		if verify_token(secret.as_str(), canonical_message, supplied) {
			Ok(())
		} else {
			Err(AuthError::InvalidToken)
		}
	}
}

#[cfg(test)]
mod tests {
	use ctrld_proto::compute_token;

	use super::*;

	#[test]
	fn verifies_current_secret_only() {
		let sessions = SessionStore::new();
		let auth = Authenticator::new(sessions.clone());
		let id = SessionId::generate();
		assert!(sessions.create_or_touch(&id));

		let secret = sessions.secret(&id).unwrap();
		let token = compute_token(secret.as_str(), b"payload").unwrap();
		assert_eq!(auth.verify(&id, b"payload", Some(&token)), Ok(()));
		assert_eq!(auth.verify(&id, b"payload", None), Err(AuthError::MissingToken));
		assert_eq!(
			auth.verify(&id, b"paylaod", Some(&token)),
			Err(AuthError::InvalidToken)
		);

		sessions.rotate(&id).unwrap();
		assert_eq!(
			auth.verify(&id, b"payload", Some(&token)),
			Err(AuthError::InvalidToken)
		);
	}

	#[test]
	fn unknown_session_is_rejected() {
		let auth = Authenticator::new(SessionStore::new());
		assert_eq!(
			auth.verify(&SessionId::generate(), b"x", Some("00")),
			Err(AuthError::UnknownSession)
		);
	}
}
