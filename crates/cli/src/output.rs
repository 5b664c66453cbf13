//! Terminal output.

use std::io::{self, Write};

use crossterm::style::Stylize;
use ctrld_proto::RpcError;
use serde_json::Value;

const FALLBACK_WIDTH: usize = 80;

/// Prints a procedure result: strings raw, everything else as pretty JSON.
pub fn print_result(value: &Value) -> io::Result<()> {
	let mut stdout = io::stdout().lock();
	match value {
		Value::String(text) => writeln!(stdout, "{text}"),
		other => {
			let text = serde_json::to_string_pretty(other).map_err(io::Error::other)?;
			writeln!(stdout, "{text}")
		}
	}
}

/// Prints `ERROR: message` followed by the traceback, if any.
pub fn print_error(message: &str, traceback: Option<Vec<&str>>) {
	let mut stderr = io::stderr().lock();
	let _ = writeln!(stderr, "{} {message}", "ERROR:".red().bold());
	for line in traceback.into_iter().flatten() {
		let _ = writeln!(stderr, "{line}");
	}
}

/// Prints an error returned by the daemon.
pub fn print_rpc_error(err: &RpcError) {
	print_error(&err.message, err.traceback());
}

/// Current terminal width, or 80 columns when not attached to a terminal.
pub fn terminal_width() -> usize {
	crossterm::terminal::size()
		.map(|(cols, _)| usize::from(cols))
		.ok()
		.filter(|&cols| cols > 0)
		.unwrap_or(FALLBACK_WIDTH)
}

/// Lays out `words` in as many space-separated lines as `width` requires,
/// each indented by `indent` spaces.
pub fn wrap(words: &[&str], width: usize, indent: usize) -> Vec<String> {
	let mut lines = Vec::new();
	let mut line = String::new();
	for word in words {
		if !line.is_empty() && indent + line.len() + 1 + word.len() > width {
			lines.push(format!("{:indent$}{line}", ""));
			line.clear();
		}
		if !line.is_empty() {
			line.push(' ');
		}
		line.push_str(word);
	}
	if !line.is_empty() {
		lines.push(format!("{:indent$}{line}", ""));
	}
	lines
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn wraps_at_width() {
		let words = ["commands", "help", "logout", "status", "stop", "version"];
		assert_eq!(
			wrap(&words, 24, 2),
			vec!["  commands help logout", "  status stop version"]
		);
	}

	#[test]
	fn overlong_word_gets_its_own_line() {
		assert_eq!(wrap(&["a", "abcdefghij", "b"], 6, 0), vec!["a", "abcdefghij", "b"]);
	}

	#[test]
	fn nothing_to_wrap() {
		assert!(wrap(&[], 80, 4).is_empty());
	}
}
