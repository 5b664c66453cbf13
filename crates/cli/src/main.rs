//! ctrld command line front-end.
//!
//! Calls daemon procedures by name. Arguments are bound to the procedure's
//! signature locally, so mistakes are reported before the call is made.

mod args;
mod client;
mod output;

use std::process::ExitCode;

use clap::Parser;
use ctrld_proto::paths::default_api_url;
use ctrld_rpc::{ProcedureSignature, bind};
use serde_json::{Map, Value};

use crate::client::{ApiClient, ClientError};

/// CLI command line arguments.
#[derive(Parser, Debug)]
#[command(name = "ctrld")]
#[command(about = "Call procedures on a running ctrld daemon")]
struct Cli {
	/// Daemon API address
	#[arg(long, value_name = "URL")]
	url: Option<String>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	/// Procedure to call
	command: Option<String>,

	/// Arguments: positional values, then key=value pairs
	#[arg(trailing_var_arg = true, allow_hyphen_values = true)]
	args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let mut client = ApiClient::new(cli.url.unwrap_or_else(default_api_url));

	let status = match client.call("status", &[], &Map::new()).await {
		Ok(status) => status,
		Err(ClientError::Connect { url, source }) => {
			tracing::debug!(%url, error = %source, "status check failed");
			output::print_error("Could not connect to daemon. Are you sure it's running?", None);
			return Ok(ExitCode::FAILURE);
		}
		Err(ClientError::Unauthorized(_)) => {
			output::print_error("Daemon requires authentication, but none was provided.", None);
			return Ok(ExitCode::FAILURE);
		}
		Err(err) => return Err(err.into()),
	};
	if status.get("is_running") != Some(&Value::Bool(true)) {
		let message = status
			.pointer("/startup_status/message")
			.and_then(Value::as_str)
			.unwrap_or("Daemon is still starting");
		println!("{message}");
		return Ok(ExitCode::FAILURE);
	}

	let Some(command) = cli.command else {
		return usage(&mut client).await;
	};
	if command == "help" && cli.args.is_empty() {
		return usage(&mut client).await;
	}
	if command == "help" {
		return describe(&mut client, &cli.args[0]).await;
	}

	let commands = client.call("commands", &[], &Map::new()).await?;
	let known = commands
		.as_array()
		.is_some_and(|names| names.iter().any(|name| name.as_str() == Some(command.as_str())));
	if !known {
		output::print_error(&format!("\"{command}\" is not a valid command."), None);
		return Ok(ExitCode::FAILURE);
	}

	let (positional, named) = match args::split_args(&cli.args) {
		Ok(split) => split,
		Err(err) => {
			output::print_error(&err.to_string(), None);
			return Ok(ExitCode::FAILURE);
		}
	};

	let details = client
		.call("help", &[Value::from(command.as_str())], &Map::new())
		.await?;
	let signature: ProcedureSignature = serde_json::from_value(
		details.get("signature").cloned().unwrap_or(Value::Null),
	)?;
	let bound = match bind(&signature, positional, named, true) {
		Ok(bound) => bound,
		Err(err) => {
			output::print_error(&format!("{command}: {err}"), None);
			return Ok(ExitCode::FAILURE);
		}
	};

	match client.call(&command, &bound.positional, &bound.named).await {
		Ok(result) => {
			output::print_result(&result)?;
			Ok(ExitCode::SUCCESS)
		}
		Err(ClientError::Rpc(err) | ClientError::Unauthorized(err)) => {
			output::print_rpc_error(&err);
			Ok(ExitCode::FAILURE)
		}
		Err(err) => Err(err.into()),
	}
}

async fn usage(client: &mut ApiClient) -> anyhow::Result<ExitCode> {
	let text = client.call("help", &[], &Map::new()).await?;
	output::print_result(&text)?;

	let commands = client.call("commands", &[], &Map::new()).await?;
	let names: Vec<&str> = commands
		.as_array()
		.map(|names| names.iter().filter_map(Value::as_str).collect())
		.unwrap_or_default();
	println!("\nCommands:");
	for line in output::wrap(&names, output::terminal_width(), 4) {
		println!("{line}");
	}
	Ok(ExitCode::SUCCESS)
}

async fn describe(client: &mut ApiClient, command: &str) -> anyhow::Result<ExitCode> {
	match client.call("help", &[Value::from(command)], &Map::new()).await {
		Ok(details) => {
			let help = details.get("help").and_then(Value::as_str).unwrap_or_default();
			let signature: ProcedureSignature = serde_json::from_value(
				details.get("signature").cloned().unwrap_or(Value::Null),
			)?;
			println!("{command} {}", signature.describe());
			if !help.is_empty() {
				println!("\n{help}");
			}
			Ok(ExitCode::SUCCESS)
		}
		Err(ClientError::Rpc(err)) => {
			output::print_rpc_error(&err);
			Ok(ExitCode::FAILURE)
		}
		Err(err) => Err(err.into()),
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("ctrld=debug,warn")
		} else {
			EnvFilter::new("warn")
		}
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
