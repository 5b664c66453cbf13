//! Registered procedures and the context they run with.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ctrld_proto::RpcError;
use ctrld_rpc::{BoundArgs, ProcedureSignature};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::{MethodRegistry, SessionId, SessionStore};

/// Result of one procedure call.
pub type ProcedureResult = Result<Value, ProcedureError>;

/// Boxed future returned by a procedure handler.
pub type ProcedureFuture = Pin<Box<dyn Future<Output = ProcedureResult> + Send>>;

type Handler = Arc<dyn Fn(CallContext, BoundArgs) -> ProcedureFuture + Send + Sync>;

/// Ways a procedure call can fail.
#[derive(Debug, Error)]
pub enum ProcedureError {
	/// Failure carrying its own code, rendered as is.
	#[error(transparent)]
	Rpc(#[from] RpcError),
	/// Ordinary failure, rendered as an application error.
	#[error(transparent)]
	Application(#[from] anyhow::Error),
	/// The procedure panicked.
	#[error("procedure panicked: {0}")]
	Panicked(String),
	/// The client connection was already closed.
	#[error("connection closed")]
	ConnectionClosed,
	/// The call was cancelled.
	#[error("call cancelled")]
	Cancelled,
	/// Background work tied to the call had not finished.
	#[error("background work still running: {0}")]
	BackgroundWork(String),
}

impl ProcedureError {
	/// Application error from a message.
	pub fn application(message: impl fmt::Display) -> Self {
		Self::Application(anyhow::anyhow!("{message}"))
	}

	/// Returns `true` for failures caused by the client going away. Once the
	/// client has disconnected these are logged and never rendered.
	pub fn is_disconnect(&self) -> bool {
		matches!(
			self,
			Self::ConnectionClosed | Self::Cancelled | Self::BackgroundWork(_)
		)
	}
}

/// What a procedure can see of the daemon while it runs.
#[derive(Clone)]
pub struct CallContext {
	session: Option<SessionId>,
	registry: Arc<MethodRegistry>,
	sessions: Arc<SessionStore>,
	cancellation: CancellationToken,
}

impl CallContext {
	pub(crate) fn new(
		session: Option<SessionId>,
		registry: Arc<MethodRegistry>,
		sessions: Arc<SessionStore>,
		cancellation: CancellationToken,
	) -> Self {
		Self {
			session,
			registry,
			sessions,
			cancellation,
		}
	}

	/// Session of the caller, when authentication is enabled.
	pub fn session(&self) -> Option<SessionId> {
		self.session
	}

	/// The registry the call was resolved from.
	pub fn registry(&self) -> &MethodRegistry {
		&self.registry
	}

	/// The daemon's session table.
	pub fn sessions(&self) -> &SessionStore {
		&self.sessions
	}

	/// Fires when the client disconnects. Long-running procedures may watch
	/// it to stop early.
	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancellation
	}
}

/// A named procedure with its signature and dispatch flags.
#[derive(Clone)]
pub struct Procedure {
	name: String,
	signature: ProcedureSignature,
	handler: Handler,
	auth_required: bool,
	serialized: bool,
	available_during_startup: bool,
	help: Option<String>,
}

impl fmt::Debug for Procedure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Procedure")
			.field("name", &self.name)
			.field("signature", &self.signature.describe())
			.field("auth_required", &self.auth_required)
			.field("serialized", &self.serialized)
			.field("available_during_startup", &self.available_during_startup)
			.finish_non_exhaustive()
	}
}

impl Procedure {
	/// Creates a procedure with all flags off.
	pub fn new<F, Fut>(name: impl Into<String>, signature: ProcedureSignature, handler: F) -> Self
	where
		F: Fn(CallContext, BoundArgs) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ProcedureResult> + Send + 'static,
	{
		Self {
			name: name.into(),
			signature,
			handler: Arc::new(move |ctx: CallContext, args: BoundArgs| -> ProcedureFuture {
				Box::pin(handler(ctx, args))
			}),
			auth_required: false,
			serialized: false,
			available_during_startup: false,
			help: None,
		}
	}

	/// Requires a valid call token when authentication is enabled.
	#[must_use]
	pub fn requires_auth(mut self) -> Self {
		self.auth_required = true;
		self
	}

	/// Runs at most one call of this procedure at a time.
	#[must_use]
	pub fn serialized(mut self) -> Self {
		self.serialized = true;
		self
	}

	/// Makes the procedure callable before startup completes.
	#[must_use]
	pub fn available_during_startup(mut self) -> Self {
		self.available_during_startup = true;
		self
	}

	/// Sets the help text shown by `help`.
	#[must_use]
	pub fn with_help(mut self, help: impl Into<String>) -> Self {
		self.help = Some(help.into());
		self
	}

	/// Registered name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Declared parameters.
	pub fn signature(&self) -> &ProcedureSignature {
		&self.signature
	}

	/// Help text, if any.
	pub fn help(&self) -> Option<&str> {
		self.help.as_deref()
	}

	/// Whether calls need a valid token.
	pub fn is_auth_required(&self) -> bool {
		self.auth_required
	}

	/// Whether calls are serialized.
	pub fn is_serialized(&self) -> bool {
		self.serialized
	}

	/// Whether the procedure resolves before startup completes.
	pub fn is_available_during_startup(&self) -> bool {
		self.available_during_startup
	}

	pub(crate) fn invoke(&self, ctx: CallContext, args: BoundArgs) -> ProcedureFuture {
		(self.handler)(ctx, args)
	}
}
