//! Argument binding.
//!
//! Binding walks the declared parameters in order. Each parameter is taken
//! from the named arguments if present, otherwise from the next unconsumed
//! positional value, otherwise from its default. Whatever is left over goes to
//! the collectors, or fails the call.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::coerce::coerce;
use crate::signature::ProcedureSignature;

/// Arguments after binding, ready to hand to a procedure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
	/// One value per declared parameter, followed by collected extras.
	pub positional: Vec<Value>,
	/// Named values absorbed by the named collector.
	pub named: Map<String, Value>,
}

impl BoundArgs {
	/// Returns the bound value of the declared parameter at `index`.
	pub fn get(&self, index: usize) -> Option<&Value> {
		self.positional.get(index)
	}
}

/// Why a call could not be bound to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
	/// A parameter received both a positional and a named value.
	#[error("argument \"{0}\" was given both positionally and by name")]
	DuplicateArgument(String),
	/// More positional values than declared parameters, and no collector.
	#[error("too many positional arguments: expected at most {expected}, got {given}")]
	TooManyPositionalArguments {
		/// Number of declared parameters.
		expected: usize,
		/// Number of positional values supplied.
		given: usize,
	},
	/// Named values that match no parameter, and no collector.
	#[error("unexpected named arguments: {}", .0.join(", "))]
	UnexpectedNamedArgument(Vec<String>),
	/// Parameters without a default that received no value.
	#[error("missing required arguments: {}", .0.join(", "))]
	MissingRequiredArgument(Vec<String>),
}

/// Discriminant of a [`BindingError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingErrorKind {
	/// See [`BindingError::DuplicateArgument`].
	DuplicateArgument,
	/// See [`BindingError::TooManyPositionalArguments`].
	TooManyPositionalArguments,
	/// See [`BindingError::UnexpectedNamedArgument`].
	UnexpectedNamedArgument,
	/// See [`BindingError::MissingRequiredArgument`].
	MissingRequiredArgument,
}

impl BindingError {
	/// Returns the error kind.
	pub fn kind(&self) -> BindingErrorKind {
		match self {
			Self::DuplicateArgument(_) => BindingErrorKind::DuplicateArgument,
			Self::TooManyPositionalArguments { .. } => BindingErrorKind::TooManyPositionalArguments,
			Self::UnexpectedNamedArgument(_) => BindingErrorKind::UnexpectedNamedArgument,
			Self::MissingRequiredArgument(_) => BindingErrorKind::MissingRequiredArgument,
		}
	}
}

impl BindingErrorKind {
	/// Kind name as reported to clients.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::DuplicateArgument => "DuplicateArgument",
			Self::TooManyPositionalArguments => "TooManyPositionalArguments",
			Self::UnexpectedNamedArgument => "UnexpectedNamedArgument",
			Self::MissingRequiredArgument => "MissingRequiredArgument",
		}
	}
}

impl fmt::Display for BindingErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Binds caller-supplied arguments to `signature`.
///
/// With `coerce_strings` set, every string the caller supplied is passed
/// through [`coerce`] first. Defaults are declared values and are never
/// coerced.
///
/// A named value for a parameter that still has positional values queued
/// ahead of it is a [`BindingError::DuplicateArgument`], unless the
/// signature collects positional values: then the queued values belong to
/// the collector.
///
/// # Errors
///
/// Returns the first [`BindingError`] in walk order: missing or duplicate
/// parameters, then excess positional values, then unmatched named values.
pub fn bind(
	signature: &ProcedureSignature,
	positional: Vec<Value>,
	mut named: Map<String, Value>,
	coerce_strings: bool,
) -> Result<BoundArgs, BindingError> {
	let positional: Vec<Value> = if coerce_strings {
		for value in named.values_mut() {
			*value = coerce(std::mem::take(value));
		}
		positional.into_iter().map(coerce).collect()
	} else {
		positional
	};

	let given = positional.len();
	let collects_positional = signature.positional_collector().is_some();
	let mut stream = positional.into_iter().peekable();
	let mut bound = Vec::with_capacity(signature.params().len());
	let mut missing = Vec::new();

	for param in signature.params() {
		if let Some(value) = named.remove(param.name()) {
			if !collects_positional && stream.peek().is_some() {
				return Err(BindingError::DuplicateArgument(param.name().to_owned()));
			}
			bound.push(value);
		} else if let Some(value) = stream.next() {
			bound.push(value);
		} else if let Some(default) = param.default() {
			bound.push(default.clone());
		} else {
			missing.push(param.name().to_owned());
		}
	}

	if !missing.is_empty() {
		return Err(BindingError::MissingRequiredArgument(missing));
	}

	let extra: Vec<Value> = stream.collect();
	match signature.positional_collector() {
		Some(collector) => {
			bound.extend(extra);
			match named.remove(collector) {
				Some(Value::Array(items)) => bound.extend(items),
				Some(item) => bound.push(item),
				None => {}
			}
		}
		None if !extra.is_empty() => {
			return Err(BindingError::TooManyPositionalArguments {
				expected: signature.params().len(),
				given,
			});
		}
		None => {}
	}

	match signature.named_collector() {
		Some(collector) => {
			if let Some(Value::Object(_)) = named.get(collector)
				&& let Some(Value::Object(entries)) = named.remove(collector)
			{
				for (key, value) in entries {
					named.entry(key).or_insert(value);
				}
			}
			Ok(BoundArgs {
				positional: bound,
				named,
			})
		}
		None if !named.is_empty() => Err(BindingError::UnexpectedNamedArgument(
			named.keys().cloned().collect(),
		)),
		None => Ok(BoundArgs {
			positional: bound,
			named: Map::new(),
		}),
	}
}
