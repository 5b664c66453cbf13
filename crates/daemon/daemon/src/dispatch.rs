//! Request lifecycle.
//!
//! One inbound call moves through handshake, authentication, resolution,
//! binding, execution and rendering. Any stage may end the call with an
//! error response; binding and lookup failures never reach the procedure.
//!
//! # Cancellation
//!
//! When the client disconnects before rendering, the running procedure is
//! aborted and no reply is sent. Disconnect-class procedure errors
//! (connection closed, cancelled, background work) are only swallowed once
//! the disconnect token has fired; with the client still connected they are
//! rendered as internal errors like any other failure.
//!
//! The session secret rotates as soon as the token verifies, before the
//! procedure runs. A call dropped after that point never delivers the new
//! secret, so the client's copy is stale and every later signed call on the
//! session fails authentication. Such a client must start a new session;
//! retries keep touching the old one, so it does not expire on its own while
//! the client keeps retrying.

use std::sync::Arc;

use ctrld_proto::{ErrorCode, RequestEnvelope, ResponseEnvelope, RpcError};
use ctrld_rpc::{BindingError, BoundArgs, bind};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::auth::{AuthError, Authenticator};
use crate::core::{
	CallSerializer, MethodRegistry, Procedure, RegistryError, SessionId, SessionSecret, SessionStore,
};
use crate::procedure::{CallContext, ProcedureError};

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
	/// Require session handshakes and call tokens.
	pub use_auth: bool,
	/// Attach diagnostic traces to application and internal errors.
	pub include_traceback: bool,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			use_auth: false,
			include_traceback: true,
		}
	}
}

/// One call as received from the transport.
#[derive(Debug)]
pub struct InboundCall {
	/// Session named by the client, or a fresh one.
	pub session: SessionId,
	/// Raw request body.
	pub body: Vec<u8>,
	/// Fires when the client connection goes away.
	pub disconnect: CancellationToken,
}

/// What the transport should send back.
#[derive(Debug)]
pub enum Reply {
	/// New session: acknowledge and hand out the first secret.
	Handshake {
		/// Secret for the first authenticated call.
		secret: SessionSecret,
	},
	/// A rendered response.
	Response {
		/// Result or error.
		envelope: ResponseEnvelope,
		/// Secret for the next call, when this call was authenticated.
		next_secret: Option<SessionSecret>,
	},
	/// The client left; nothing is sent.
	Dropped,
}

impl Reply {
	/// HTTP status of the reply.
	pub fn http_status(&self) -> u16 {
		match self {
			Self::Handshake { .. } => 200,
			Self::Response { envelope, .. } => envelope.http_status(),
			Self::Dropped => 204,
		}
	}
}

/// Drives inbound calls against the registry.
#[derive(Debug)]
pub struct Dispatcher {
	registry: Arc<MethodRegistry>,
	sessions: Arc<SessionStore>,
	authenticator: Authenticator,
	serializer: CallSerializer,
	config: DispatchConfig,
}

impl Dispatcher {
	/// Creates a dispatcher owning the serializer lock table.
	pub fn new(
		registry: Arc<MethodRegistry>,
		sessions: Arc<SessionStore>,
		config: DispatchConfig,
	) -> Arc<Self> {
		Arc::new(Self {
			authenticator: Authenticator::new(sessions.clone()),
			registry,
			sessions,
			serializer: CallSerializer::new(),
			config,
		})
	}

	/// The registry calls are resolved from.
	pub fn registry(&self) -> &Arc<MethodRegistry> {
		&self.registry
	}

	/// The session table.
	pub fn sessions(&self) -> &Arc<SessionStore> {
		&self.sessions
	}

	/// Runs one call to completion.
	pub async fn dispatch(&self, call: InboundCall) -> Reply {
		let InboundCall {
			session,
			body,
			disconnect,
		} = call;

		if self.config.use_auth && self.sessions.create_or_touch(&session) {
			if let Some(secret) = self.sessions.secret(&session) {
				return Reply::Handshake { secret };
			}
			return self.fail(Value::Null, RpcError::from_code(ErrorCode::InternalError), None);
		}

		let request = match RequestEnvelope::decode(&body) {
			Ok(request) => request,
			Err(err) => {
				tracing::warn!(error = %err, "rejected malformed request");
				return self.fail(Value::Null, err.into(), None);
			}
		};
		let id = request.id.clone();

		let mut next_secret = None;
		let requires_auth = self.config.use_auth
			&& self
				.registry
				.get(&request.method)
				.is_some_and(Procedure::is_auth_required);
		if requires_auth {
			if let Err(err) = self.authenticate(&session, &request) {
				tracing::warn!(
					method = %request.method,
					session = %session,
					error = %err,
					"authentication failed"
				);
				let message = format!("{}: {err}", ErrorCode::AuthenticationError.default_message());
				return self.fail(id, RpcError::new(ErrorCode::AuthenticationError, message), None);
			}
			next_secret = self.sessions.rotate(&session);
		}

		let procedure = match self.registry.resolve(&request.method) {
			Ok(procedure) => procedure.clone(),
			Err(err) => {
				let code = match err {
					RegistryError::NotReady(_) => ErrorCode::InvalidRequest,
					_ => ErrorCode::MethodNotFound,
				};
				tracing::warn!(method = %request.method, error = %err, "unresolved method");
				return self.fail(id, RpcError::new(code, err.to_string()), next_secret);
			}
		};

		let args = match bind(
			procedure.signature(),
			request.positional,
			request.named,
			false,
		) {
			Ok(args) => args,
			Err(err) => {
				tracing::warn!(method = %procedure.name(), error = %err, "invalid params");
				return self.fail(id, invalid_params(&procedure, &err), next_secret);
			}
		};

		let ctx = CallContext::new(
			self.config.use_auth.then_some(session),
			self.registry.clone(),
			self.sessions.clone(),
			disconnect.clone(),
		);

		match self.execute(&procedure, ctx, args, &disconnect).await {
			Ok(result) => Reply::Response {
				envelope: ResponseEnvelope::result(id, result),
				next_secret,
			},
			Err(err) if err.is_disconnect() && disconnect.is_cancelled() => {
				tracing::info!(method = %procedure.name(), reason = %err, "dropped response for departed client");
				Reply::Dropped
			}
			Err(err) => {
				let rpc = self.classify(err);
				tracing::debug!(method = %procedure.name(), code = %rpc.code, "procedure failed");
				self.fail(id, rpc, next_secret)
			}
		}
	}

	fn authenticate(&self, session: &SessionId, request: &RequestEnvelope) -> Result<(), AuthError> {
		let message = request
			.canonical_message()
			.map_err(|_| AuthError::InvalidToken)?;
		self.authenticator
			.verify(session, &message, request.token.as_deref())
	}

	async fn execute(
		&self,
		procedure: &Procedure,
		ctx: CallContext,
		args: BoundArgs,
		disconnect: &CancellationToken,
	) -> Result<Value, ProcedureError> {
		let started = Instant::now();
		let run = async {
			let task = AbortOnDropHandle::new(tokio::spawn(procedure.invoke(ctx, args)));
			match task.await {
				Ok(result) => result,
				Err(err) if err.is_panic() => Err(ProcedureError::Panicked(panic_message(err.into_panic()))),
				Err(_) => Err(ProcedureError::Cancelled),
			}
		};

		let outcome = tokio::select! {
			biased;
			_ = disconnect.cancelled() => {
				tracing::info!(method = %procedure.name(), "cancelling dropped request");
				Err(ProcedureError::Cancelled)
			}
			outcome = async {
				if procedure.is_serialized() {
					self.serializer.run(procedure.name(), run).await
				} else {
					run.await
				}
			} => outcome,
		};

		tracing::debug!(
			method = %procedure.name(),
			elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
			ok = outcome.is_ok(),
			"call finished"
		);
		outcome
	}

	fn classify(&self, err: ProcedureError) -> RpcError {
		match err {
			ProcedureError::Rpc(rpc) => rpc,
			ProcedureError::Application(err) => {
				let rpc = RpcError::new(ErrorCode::ApplicationError, err.to_string());
				if self.config.include_traceback {
					rpc.with_traceback(&format!("{err:?}"))
				} else {
					rpc
				}
			}
			ProcedureError::Panicked(message) => {
				tracing::error!(panic = %message, "procedure panicked");
				let rpc = RpcError::from_code(ErrorCode::InternalError);
				if self.config.include_traceback {
					rpc.with_traceback(&message)
				} else {
					rpc
				}
			}
			other => RpcError::new(ErrorCode::InternalError, other.to_string()),
		}
	}

	fn fail(&self, id: Value, error: RpcError, next_secret: Option<SessionSecret>) -> Reply {
		Reply::Response {
			envelope: ResponseEnvelope::error(id, error),
			next_secret,
		}
	}
}

fn invalid_params(procedure: &Procedure, err: &BindingError) -> RpcError {
	RpcError::new(
		ErrorCode::InvalidParams,
		format!("{}: {}: {err}", procedure.name(), err.kind()),
	)
	.with_data("kind", err.kind().as_str())
	.with_data("signature", procedure.signature().describe())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_owned()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"procedure panicked".to_owned()
	}
}
