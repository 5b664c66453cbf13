//! Procedures every daemon registers.

use ctrld_rpc::ProcedureSignature;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::core::RegistryBuilder;
use crate::procedure::{Procedure, ProcedureError};

/// Usage text returned by `help` without arguments.
pub const USAGE: &str = "\
ctrld-daemon exposes its procedures as JSON-RPC over HTTP.

Send `POST /` with a body of the form
    {\"method\": NAME, \"params\": [{NAMED...}, POSITIONAL...], \"id\": ID}
Call `commands` for the list of procedures and `help` with a `command`
argument for details on one of them.";

/// Adds the built-in procedures to `builder`.
///
/// `stop` cancels `shutdown`.
pub fn register(builder: RegistryBuilder, shutdown: CancellationToken) -> RegistryBuilder {
	builder
		.register(status())
		.register(commands())
		.register(help())
		.register(version())
		.register(logout())
		.register(stop(shutdown))
}

fn status() -> Procedure {
	Procedure::new("status", ProcedureSignature::default(), |ctx, _args| async move {
		let started = ctx.registry().is_started();
		let (code, message) = if started {
			("started", "Daemon is running")
		} else {
			("initializing", "Daemon is in the process of starting")
		};
		Ok(json!({
			"is_running": started,
			"startup_status": {"code": code, "message": message},
			"session_count": ctx.sessions().len(),
		}))
	})
	.available_during_startup()
	.with_help("Report whether the daemon has finished starting.")
}

fn commands() -> Procedure {
	Procedure::new("commands", ProcedureSignature::default(), |ctx, _args| async move {
		Ok(json!(ctx.registry().names()))
	})
	.with_help("List the names of all registered procedures.")
}

fn help() -> Procedure {
	let signature = ProcedureSignature::builder()
		.optional("command", Value::Null)
		.build()
		.unwrap_or_default();
	Procedure::new("help", signature, |ctx, args| async move {
		let Some(name) = args.get(0).and_then(Value::as_str) else {
			return Ok(Value::from(USAGE));
		};
		let Some(procedure) = ctx.registry().get(name) else {
			return Err(ProcedureError::application(format!("Invalid command name: {name}")));
		};
		Ok(json!({
			"name": procedure.name(),
			"help": procedure.help().unwrap_or_default(),
			"signature": procedure.signature(),
			"auth_required": procedure.is_auth_required(),
			"serialized": procedure.is_serialized(),
		}))
	})
	.available_during_startup()
	.with_help("Show usage, or details for one procedure.")
}

fn version() -> Procedure {
	Procedure::new("version", ProcedureSignature::default(), |_ctx, _args| async move {
		Ok(json!({
			"name": env!("CARGO_PKG_NAME"),
			"version": env!("CARGO_PKG_VERSION"),
		}))
	})
	.with_help("Report the daemon version.")
}

fn logout() -> Procedure {
	Procedure::new("logout", ProcedureSignature::default(), |ctx, _args| async move {
		let ended = ctx
			.session()
			.is_some_and(|session| ctx.sessions().logout(&session));
		Ok(Value::Bool(ended))
	})
	.requires_auth()
	.with_help("End the calling session.")
}

fn stop(shutdown: CancellationToken) -> Procedure {
	Procedure::new("stop", ProcedureSignature::default(), move |_ctx, _args| {
		let shutdown = shutdown.clone();
		async move {
			tracing::info!("shutdown requested");
			shutdown.cancel();
			Ok(Value::from("Shutting down"))
		}
	})
	.requires_auth()
	.serialized()
	.with_help("Stop the daemon.")
}
