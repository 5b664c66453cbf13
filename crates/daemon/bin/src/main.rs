//! ctrld daemon binary.
//!
//! The daemon serves the built-in procedures (and any registered by the
//! host) as JSON-RPC over HTTP until interrupted or asked to `stop`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ctrld_daemon::config::{DaemonConfig, default_config_path};
use ctrld_daemon::core::{MethodRegistry, SessionStore};
use ctrld_daemon::{DispatchService, Dispatcher, builtins, http};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Daemon command line arguments.
#[derive(Parser, Debug)]
#[command(name = "ctrld-daemon")]
#[command(about = "Authenticated JSON-RPC control daemon")]
struct Args {
	/// Configuration file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Interface to listen on
	#[arg(long)]
	host: Option<String>,

	/// Port to listen on
	#[arg(short, long)]
	port: Option<u16>,

	/// Require session handshakes and signed calls
	#[arg(long)]
	use_auth: bool,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	/// Log to stderr (the default)
	#[arg(long, conflicts_with = "quiet")]
	log_to_console: bool,

	/// Disable console logging
	#[arg(short, long)]
	quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose, args.quiet && !args.log_to_console);

	info!("starting ctrld-daemon");

	let config_path = args.config.clone().unwrap_or_else(default_config_path);
	let mut config = DaemonConfig::load_or_default(&config_path)?;
	if let Some(host) = args.host {
		config.host = host;
	}
	if let Some(port) = args.port {
		config.port = port;
	}
	config.use_auth |= args.use_auth;

	let shutdown = CancellationToken::new();

	let registry = builtins::register(MethodRegistry::builder(), shutdown.clone())
		.build()
		.context("building procedure registry")?;
	let registry = Arc::new(registry);
	let sessions = SessionStore::new_with_config(config.session_config());
	let dispatcher = Dispatcher::new(registry.clone(), sessions.clone(), config.dispatch_config());

	let addr = config.bind_addr();
	let listener = TcpListener::bind(&addr)
		.await
		.with_context(|| format!("binding API listener on {addr}"))?;
	info!(%addr, use_auth = config.use_auth, "API listener bound");

	let router = http::router(DispatchService::new(dispatcher), config.http_config());
	let server = tokio::spawn(http::serve(listener, router, shutdown.clone()));
	let sweeper = sessions.spawn_sweeper(config.sweep_interval(), shutdown.clone());

	registry.mark_started();

	tokio::select! {
		result = tokio::signal::ctrl_c() => {
			result.context("waiting for Ctrl-C")?;
			info!("interrupted");
		}
		_ = shutdown.cancelled() => {}
	}
	shutdown.cancel();

	server.await.context("API server task failed")??;
	sweeper.await.context("session sweeper task failed")?;
	info!("ctrld-daemon stopped");

	Ok(())
}

fn setup_tracing(verbose: bool, quiet: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("ctrld_daemon=trace,debug")
			} else {
				EnvFilter::new("ctrld_daemon=debug,info")
			}
		})
	};

	if let Some(log_dir) = std::env::var("CTRLD_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let pid = std::process::id();
		let log_path = log_dir.join(format!("ctrld-daemon.{pid}.log"));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry()
				.with(filter())
				.with(file_layer)
				.init();

			tracing::info!(path = ?log_path, "daemon tracing initialized");
			return;
		}
	}

	if quiet {
		return;
	}

	tracing_subscriber::registry()
		.with(filter())
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();
}
