//! Best-effort typing of string arguments.

use serde_json::{Number, Value};

/// Coerces a string value to the JSON type it most likely denotes.
///
/// Non-string values are returned unchanged.
pub fn coerce(value: Value) -> Value {
	match value {
		Value::String(raw) => guess_value(&raw),
		other => other,
	}
}

/// Guesses the JSON value a raw command line word stands for.
///
/// `true`/`false` (any case) become booleans and `none`/`null` (any case)
/// become null. A word containing a decimal point is parsed as a float and
/// anything else as an integer. Words that fail to parse stay strings.
pub fn guess_value(raw: &str) -> Value {
	if raw.eq_ignore_ascii_case("true") {
		return Value::Bool(true);
	}
	if raw.eq_ignore_ascii_case("false") {
		return Value::Bool(false);
	}
	if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("null") {
		return Value::Null;
	}

	if raw.contains('.') {
		return raw
			.parse::<f64>()
			.ok()
			.and_then(Number::from_f64)
			.map_or_else(|| Value::String(raw.to_owned()), Value::Number);
	}

	if let Ok(n) = raw.parse::<i64>() {
		return Value::from(n);
	}
	if let Ok(n) = raw.parse::<u64>() {
		return Value::from(n);
	}
	Value::String(raw.to_owned())
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	#[rstest]
	#[case("0.3.8", json!("0.3.8"))]
	#[case("0.3", json!(0.3))]
	#[case("3", json!(3))]
	#[case("-12", json!(-12))]
	#[case("VdNmakxFORPSyfCprAD/eDDPk5TY9QYtSA==", json!("VdNmakxFORPSyfCprAD/eDDPk5TY9QYtSA=="))]
	#[case("TRUE", json!(true))]
	#[case("true", json!(true))]
	#[case("True", json!(true))]
	#[case("FALSE", json!(false))]
	#[case("false", json!(false))]
	#[case("False", json!(false))]
	#[case("None", Value::Null)]
	#[case("null", Value::Null)]
	#[case("nan", json!("nan"))]
	#[case("inf.", json!("inf."))]
	#[case("18446744073709551615", json!(18446744073709551615u64))]
	#[case("https://example.com/a.b", json!("https://example.com/a.b"))]
	fn guesses(#[case] raw: &str, #[case] expected: Value) {
		assert_eq!(guess_value(raw), expected);
	}

	#[test]
	fn leaves_non_strings_alone() {
		assert_eq!(coerce(json!(["1"])), json!(["1"]));
		assert_eq!(coerce(json!({"a": "true"})), json!({"a": "true"}));
		assert_eq!(coerce(json!(1.5)), json!(1.5));
	}
}
