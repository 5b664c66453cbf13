//! Command line argument splitting.

use serde_json::{Map, Value};
use thiserror::Error;

/// Arguments that cannot be turned into a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
	/// A bare value followed a `key=value` argument.
	#[error("positional argument \"{0}\" follows a named argument")]
	PositionalAfterNamed(String),
	/// A `key=value` argument with an empty key.
	#[error("named argument \"{0}\" has no name")]
	EmptyName(String),
}

/// Splits words into positional and named arguments.
///
/// Words before the first `key=value` are positional; the rest must all be
/// named. A leading `--` on a key is ignored. Values stay strings; typing
/// them is left to binding with string coercion enabled.
///
/// # Errors
///
/// Returns [`ArgsError`] for a bare word after a named one or an empty key.
pub fn split_args<S: AsRef<str>>(words: &[S]) -> Result<(Vec<Value>, Map<String, Value>), ArgsError> {
	let mut positional = Vec::new();
	let mut named = Map::new();
	for word in words.iter().map(AsRef::as_ref) {
		match split_named(word) {
			Some(("", _)) => return Err(ArgsError::EmptyName(word.to_owned())),
			Some((key, value)) => {
				named.insert(key.to_owned(), Value::from(value));
			}
			None if !named.is_empty() => {
				return Err(ArgsError::PositionalAfterNamed(word.to_owned()));
			}
			None => positional.push(Value::from(word)),
		}
	}
	Ok((positional, named))
}

fn split_named(word: &str) -> Option<(&str, &str)> {
	let (key, value) = word.split_once('=')?;
	let key = key.strip_prefix("--").unwrap_or(key);
	// URLs with query strings stay positional.
	if key.contains(['/', ':']) {
		return None;
	}
	Some((key, value))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use ctrld_rpc::{ProcedureSignature, bind};
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	#[rstest]
	#[case(&[], json!([]), json!({}))]
	#[case(&["1", "foo", "true"], json!(["1", "foo", "true"]), json!({}))]
	#[case(&["1", "two=2", "--three=none"], json!(["1"]), json!({"two": "2", "three": "none"}))]
	#[case(&["a=0.5", "b=0.3.8"], json!([]), json!({"a": "0.5", "b": "0.3.8"}))]
	#[case(&["https://example.com/?q=1"], json!(["https://example.com/?q=1"]), json!({}))]
	#[case(&["x=a=b"], json!([]), json!({"x": "a=b"}))]
	fn splits_words(#[case] words: &[&str], #[case] positional: Value, #[case] named: Value) {
		let (p, n) = split_args(words).unwrap();
		assert_eq!(Value::Array(p), positional);
		assert_eq!(Value::Object(n), named);
	}

	#[test]
	fn binding_types_the_split_words() {
		let signature = ProcedureSignature::builder()
			.required("one")
			.optional("two", Value::Null)
			.optional("three", "three")
			.build()
			.unwrap();
		let (positional, named) = split_args(&["1", "two=0.5", "three=None"]).unwrap();
		let bound = bind(&signature, positional, named, true).unwrap();
		assert_eq!(bound.positional, vec![json!(1), json!(0.5), Value::Null]);
	}

	#[test]
	fn bare_word_after_named_is_rejected() {
		assert_eq!(
			split_args(&["a=1", "2"]),
			Err(ArgsError::PositionalAfterNamed("2".into()))
		);
	}

	#[test]
	fn empty_key_is_rejected() {
		assert_eq!(split_args(&["=1"]), Err(ArgsError::EmptyName("=1".into())));
	}
}
